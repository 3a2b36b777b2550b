//! Nullable engine: scripted peers, controllable acknowledgements.

use std::collections::BTreeMap;
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::Duration;

use dave_engine::{Engine, EngineError, EngineFuture, PutAck};
use dave_types::{PublicKey, Record};
use futures_util::FutureExt;
use tokio::sync::oneshot;
use tokio::time::Instant;

/// What happens to a record after `put` accepts it.
#[derive(Clone, Debug)]
pub enum AckBehaviour {
    /// Acknowledge after the given delay (zero acknowledges at once).
    After(Duration),
    /// Never acknowledge. The ack channel stays open forever.
    Never,
    /// Refuse the record up front with this error.
    Refuse(EngineError),
    /// Accept the record but report this error on the ack channel.
    FailAck(EngineError),
}

/// A record handed to the engine, and when.
#[derive(Clone, Debug)]
pub struct SubmittedRecord {
    pub record: Record,
    pub at: Instant,
}

struct State {
    schedule: Vec<(Duration, usize)>,
    ack: AckBehaviour,
    submitted: Vec<SubmittedRecord>,
    records: BTreeMap<(PublicKey, String), Record>,
    withheld: Vec<oneshot::Sender<Result<(), EngineError>>>,
    peer_queries: usize,
    killed: bool,
}

/// A test engine.
///
/// The peer count follows a schedule of `(offset, peers)` steps measured
/// from construction on the tokio clock, so paused-time tests can drive it
/// with `tokio::time::advance`.
#[derive(Clone)]
pub struct NullEngine {
    started: Instant,
    state: Arc<Mutex<State>>,
}

impl NullEngine {
    /// An engine that always reports `peers` peers and acks at once.
    pub fn with_peers(peers: usize) -> Self {
        Self::with_peer_schedule(vec![(Duration::ZERO, peers)])
    }

    /// An engine whose peer count changes over time. Steps must be sorted by
    /// offset. Before the first step the count is 0.
    pub fn with_peer_schedule(schedule: Vec<(Duration, usize)>) -> Self {
        Self {
            started: Instant::now(),
            state: Arc::new(Mutex::new(State {
                schedule,
                ack: AckBehaviour::After(Duration::ZERO),
                submitted: Vec::new(),
                records: BTreeMap::new(),
                withheld: Vec::new(),
                peer_queries: 0,
                killed: false,
            })),
        }
    }

    pub fn with_ack(self, ack: AckBehaviour) -> Self {
        self.lock().ack = ack;
        self
    }

    pub fn set_ack(&self, ack: AckBehaviour) {
        self.lock().ack = ack;
    }

    /// Every record passed to `put`, in order, including refused ones.
    pub fn submitted(&self) -> Vec<SubmittedRecord> {
        self.lock().submitted.clone()
    }

    /// Keys of every submitted record, in order.
    pub fn submitted_keys(&self) -> Vec<String> {
        self.lock()
            .submitted
            .iter()
            .map(|s| s.record.key.clone())
            .collect()
    }

    /// How many times the peer count was read.
    pub fn peer_queries(&self) -> usize {
        self.lock().peer_queries
    }

    pub fn is_killed(&self) -> bool {
        self.lock().killed
    }

    fn lock(&self) -> MutexGuard<'_, State> {
        self.state.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    fn peers_at(schedule: &[(Duration, usize)], elapsed: Duration) -> usize {
        schedule
            .iter()
            .take_while(|(offset, _)| *offset <= elapsed)
            .last()
            .map_or(0, |(_, peers)| *peers)
    }
}

impl Engine for NullEngine {
    fn put(&self, record: Record) -> Result<PutAck, EngineError> {
        let mut state = self.lock();
        state.submitted.push(SubmittedRecord {
            record: record.clone(),
            at: Instant::now(),
        });
        if state.killed {
            return Err(EngineError::Killed);
        }

        let (tx, rx) = oneshot::channel();
        match state.ack.clone() {
            AckBehaviour::Refuse(err) => return Err(err),
            AckBehaviour::FailAck(err) => {
                let _ = tx.send(Err(err));
            }
            AckBehaviour::Never => state.withheld.push(tx),
            AckBehaviour::After(delay) if delay.is_zero() => {
                let _ = tx.send(Ok(()));
            }
            AckBehaviour::After(delay) => {
                tokio::spawn(async move {
                    tokio::time::sleep(delay).await;
                    let _ = tx.send(Ok(()));
                });
            }
        }
        state
            .records
            .insert((record.public_key.clone(), record.key.clone()), record);
        Ok(rx)
    }

    fn peer_count(&self) -> EngineFuture<'_, usize> {
        let elapsed = self.started.elapsed();
        let mut state = self.lock();
        state.peer_queries += 1;
        let peers = Self::peers_at(&state.schedule, elapsed);
        async move { Ok(peers) }.boxed()
    }

    fn get<'a>(&'a self, public_key: &'a PublicKey, key: &'a str) -> EngineFuture<'a, Option<Record>> {
        let found = self
            .lock()
            .records
            .get(&(public_key.clone(), key.to_string()))
            .cloned();
        async move { Ok(found) }.boxed()
    }

    fn list<'a>(
        &'a self,
        public_key: &'a PublicKey,
        key_prefix: &'a str,
    ) -> EngineFuture<'a, Vec<Record>> {
        let found = self
            .lock()
            .records
            .iter()
            .filter(|((owner, key), _)| owner == public_key && key.starts_with(key_prefix))
            .map(|(_, record)| record.clone())
            .collect();
        async move { Ok(found) }.boxed()
    }

    fn record_count(&self) -> EngineFuture<'_, usize> {
        let count = self.lock().records.len();
        async move { Ok(count) }.boxed()
    }

    fn kill(&self) -> EngineFuture<'_, ()> {
        self.lock().killed = true;
        async move { Ok(()) }.boxed()
    }
}
