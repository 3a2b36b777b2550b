//! Gateway request handlers.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;

use axum::extract::rejection::JsonRejection;
use axum::extract::State;
use axum::http::StatusCode;
use axum::Json;
use dave_crypto::verify_record_signature;
use dave_engine::wire::{
    decode_b64, encode_b64, ListRequest, ListResponse, RecordEntry, StatusResponse, WorkRequest,
    WorkResponse,
};
use dave_engine::Engine;
use dave_types::{Challenge, PublicKey, Record, Timestamp};
use dave_work::{validate_record, CancelFlag, WorkPool};
use tracing::{debug, Instrument};

use crate::RpcError;

/// Limits on a single `/work` search.
pub const DEFAULT_MAX_DIFFICULTY: u8 = 32;
pub const DEFAULT_WORK_TIMEOUT: Duration = Duration::from_secs(60);

/// Shared by every handler.
pub struct ApiState {
    pub engine: Arc<dyn Engine>,
    pub pool: Arc<WorkPool>,
    /// Minimum difficulty a submitted record must carry.
    pub min_difficulty: u8,
    /// How long `/put` waits for the engine to send the record.
    pub ack_timeout: Duration,
    /// Highest difficulty `/work` will search for.
    pub max_difficulty: u8,
    /// A `/work` search still running after this is cancelled.
    pub work_timeout: Duration,
    puts_handled: AtomicU64,
}

impl ApiState {
    pub fn new(engine: Arc<dyn Engine>, pool: Arc<WorkPool>) -> Self {
        Self {
            engine,
            pool,
            min_difficulty: 0,
            ack_timeout: Duration::from_secs(10),
            max_difficulty: DEFAULT_MAX_DIFFICULTY,
            work_timeout: DEFAULT_WORK_TIMEOUT,
            puts_handled: AtomicU64::new(0),
        }
    }

    pub fn with_max_difficulty(mut self, difficulty: u8) -> Self {
        self.max_difficulty = difficulty;
        self
    }

    pub fn with_work_timeout(mut self, timeout: Duration) -> Self {
        self.work_timeout = timeout;
        self
    }

    pub fn with_min_difficulty(mut self, difficulty: u8) -> Self {
        self.min_difficulty = difficulty;
        self
    }

    pub fn with_ack_timeout(mut self, timeout: Duration) -> Self {
        self.ack_timeout = timeout;
        self
    }

    /// Records accepted through `/put` since start.
    pub fn puts_handled(&self) -> u64 {
        self.puts_handled.load(Ordering::Relaxed)
    }
}

pub type SharedState = Arc<ApiState>;

fn body<T>(payload: Result<Json<T>, JsonRejection>) -> Result<T, RpcError> {
    payload
        .map(|Json(value)| value)
        .map_err(|rejection| RpcError::BadRequest(rejection.body_text()))
}

// ── Status ───────────────────────────────────────────────────────────────

pub async fn status(State(state): State<SharedState>) -> Result<Json<StatusResponse>, RpcError> {
    let peers = state.engine.peer_count().await?;
    let dats = state.engine.record_count().await?;
    Ok(Json(StatusResponse { peers, dats }))
}

// ── Work ─────────────────────────────────────────────────────────────────

/// Solve a challenge on every core and return the salt and work.
pub async fn work(
    State(state): State<SharedState>,
    payload: Result<Json<WorkRequest>, JsonRejection>,
) -> Result<Json<WorkResponse>, RpcError> {
    let request = body(payload)?;
    let challenge = Challenge::for_entry(
        &request.key,
        request.val.as_bytes(),
        Timestamp::from_millis(request.time),
    );
    let difficulty = request.difficulty;
    if difficulty > state.max_difficulty {
        return Err(RpcError::BadRequest(format!(
            "difficulty {difficulty} is above the limit of {}",
            state.max_difficulty
        )));
    }

    let cancel = CancelFlag::new();
    let _guard = CancelOnDrop(cancel.clone());
    let pool = state.pool.clone();
    let search = tokio::task::spawn_blocking(move || pool.race(&challenge, difficulty, &cancel))
        .instrument(tracing::debug_span!("solve", key = %request.key, difficulty));
    let solution = tokio::time::timeout(state.work_timeout, search)
        .await
        .map_err(|_| RpcError::WorkTimeout(state.work_timeout))?
        .map_err(|e| RpcError::Server(e.to_string()))??;

    debug!(key = %request.key, work = %solution.work, "work served");
    Ok(Json(WorkResponse {
        salt: encode_b64(solution.salt.as_bytes()),
        work: encode_b64(solution.work.as_bytes()),
    }))
}

/// Stops a search whose client went away.
struct CancelOnDrop(CancelFlag);

impl Drop for CancelOnDrop {
    fn drop(&mut self) {
        self.0.cancel();
    }
}

// ── Put ──────────────────────────────────────────────────────────────────

/// Verify a solved, signed record and hand it to the engine.
pub async fn put(
    State(state): State<SharedState>,
    payload: Result<Json<RecordEntry>, JsonRejection>,
) -> Result<StatusCode, RpcError> {
    let record = Record::try_from(body(payload)?)?;
    if !validate_record(&record, state.min_difficulty) {
        return Err(RpcError::BadRequest(format!(
            "work does not match the record or is below difficulty {}",
            state.min_difficulty
        )));
    }
    if !verify_record_signature(&record) {
        return Err(RpcError::BadRequest("invalid signature".into()));
    }

    let key = record.key.clone();
    let ack = state.engine.put(record)?;
    tokio::time::timeout(state.ack_timeout, ack)
        .await
        .map_err(|_| RpcError::AckTimeout)?
        .map_err(|_| RpcError::Server("engine dropped the acknowledgement".into()))??;

    state.puts_handled.fetch_add(1, Ordering::Relaxed);
    debug!(%key, "record accepted");
    Ok(StatusCode::OK)
}

// ── List ─────────────────────────────────────────────────────────────────

pub async fn list(
    State(state): State<SharedState>,
    payload: Result<Json<ListRequest>, JsonRejection>,
) -> Result<Json<ListResponse>, RpcError> {
    let request = body(payload)?;
    let owner = PublicKey::from_slice(&decode_b64("pubKey", &request.pub_key)?)
        .map_err(|e| RpcError::BadRequest(e.to_string()))?;
    let records = state.engine.list(&owner, &request.key_prefix).await?;
    let results = records
        .iter()
        .map(RecordEntry::try_from)
        .collect::<Result<Vec<_>, _>>()?;
    Ok(Json(ListResponse {
        count: results.len(),
        results,
    }))
}
