//! Batch orchestrator: wait for peers, solve, sign and submit `ntest` records.
//!
//! Each iteration runs the phases in order:
//!
//! ```text
//! Idle -> AwaitPeers -> ComputeWork -> Sign -> Submit -> (next iteration) -> Done
//! ```
//!
//! Iteration `i + 1` builds its challenge only after the engine acknowledged
//! iteration `i`. Any error aborts the batch; records already acknowledged
//! stay submitted.

use std::sync::Arc;
use std::time::Duration;

use dave_crypto::sign_work;
use dave_engine::Engine;
use dave_types::{batch_key, Challenge, KeyPair, Record, Salt, Solution, Timestamp, Work};
use dave_work::{CancelFlag, DispatchMode, WorkPool};
use tokio::time::Instant;
use tracing::{debug, info, Instrument};

use crate::batch_event::{BatchEvent, EventBus, Phase};
use crate::peer_gate::{PeerGate, DEFAULT_PEER_POLL_INTERVAL};
use crate::progress::ProgressReporter;
use crate::tracing_spans::{batch_span, iteration_span};
use crate::{BatchError, OrchestratorError, ShutdownController};

/// Knobs for one batch run.
#[derive(Clone, Debug)]
pub struct OrchestratorConfig {
    /// Required leading zero bits.
    pub difficulty: u8,
    /// Peers the engine must report before each submission.
    pub min_peers: usize,
    /// Number of records to submit (`key`, `key_1`, ...). At least 1.
    pub ntest: usize,
    /// Record time is set this far before "now".
    pub time_margin: Duration,
    pub peer_poll_interval: Duration,
    pub peer_timeout: Option<Duration>,
    pub work_timeout: Option<Duration>,
    pub ack_timeout: Option<Duration>,
    /// Pause after the last acknowledgement before the batch returns.
    pub settle_delay: Duration,
    /// Pause between iterations.
    pub iteration_delay: Duration,
    /// `None` derives the mode from `ntest`.
    pub mode: Option<DispatchMode>,
    /// Print the "working for" ticker on stdout while searching.
    pub progress: bool,
}

impl Default for OrchestratorConfig {
    fn default() -> Self {
        Self {
            difficulty: 16,
            min_peers: 0,
            ntest: 1,
            time_margin: Duration::from_millis(100),
            peer_poll_interval: DEFAULT_PEER_POLL_INTERVAL,
            peer_timeout: None,
            work_timeout: None,
            ack_timeout: None,
            settle_delay: Duration::from_millis(50),
            iteration_delay: Duration::ZERO,
            mode: None,
            progress: false,
        }
    }
}

impl OrchestratorConfig {
    pub fn dispatch_mode(&self) -> DispatchMode {
        self.mode
            .unwrap_or_else(|| DispatchMode::for_batch(self.ntest))
    }
}

/// One acknowledged record.
#[derive(Clone, Debug)]
pub struct IterationReport {
    pub key: String,
    pub time: Timestamp,
    pub salt: Salt,
    pub work: Work,
    /// Time spent searching.
    pub solve_time: Duration,
    /// Time from the start of the iteration to the acknowledgement.
    pub elapsed: Duration,
}

/// Outcome of a successful batch.
#[derive(Clone, Debug)]
pub struct BatchReport {
    pub mode: DispatchMode,
    pub iterations: Vec<IterationReport>,
    pub elapsed: Duration,
}

pub struct Orchestrator {
    engine: Arc<dyn Engine>,
    pool: Arc<WorkPool>,
    keys: Arc<KeyPair>,
    config: OrchestratorConfig,
    events: EventBus,
    shutdown: Option<ShutdownController>,
}

impl Orchestrator {
    pub fn new(
        engine: Arc<dyn Engine>,
        pool: Arc<WorkPool>,
        keys: Arc<KeyPair>,
        config: OrchestratorConfig,
    ) -> Self {
        Self {
            engine,
            pool,
            keys,
            config,
            events: EventBus::new(),
            shutdown: None,
        }
    }

    /// Abort the running batch when `shutdown` fires.
    pub fn with_shutdown(mut self, shutdown: ShutdownController) -> Self {
        self.shutdown = Some(shutdown);
        self
    }

    pub fn config(&self) -> &OrchestratorConfig {
        &self.config
    }

    pub fn subscribe(&mut self, listener: Box<dyn Fn(&BatchEvent) + Send + Sync>) {
        self.events.subscribe(listener);
    }

    /// Submit `ntest` records for `key` and `value`.
    pub async fn run(&self, key: &str, value: &[u8]) -> Result<BatchReport, BatchError> {
        let span = batch_span(key, self.config.ntest.max(1), self.config.difficulty);
        self.run_batch(key, value).instrument(span).await
    }

    async fn run_batch(&self, key: &str, value: &[u8]) -> Result<BatchReport, BatchError> {
        let ntest = self.config.ntest.max(1);
        let mode = self.config.dispatch_mode();
        let started = Instant::now();
        let mut iterations = Vec::with_capacity(ntest);

        for i in 0..ntest {
            let record_key = batch_key(key, i);
            self.enter(i, Phase::Idle);
            let step = self
                .iteration(i, &record_key, value, mode)
                .instrument(iteration_span(i, &record_key));
            let outcome = tokio::select! {
                biased;
                _ = self.cancelled() => Err(OrchestratorError::Cancelled),
                outcome = step => outcome,
            };
            match outcome {
                Ok(report) => iterations.push(report),
                Err(cause) => {
                    info!(iteration = i, error = %cause, "batch aborted");
                    return Err(BatchError {
                        iteration: i,
                        submitted: iterations.len(),
                        cause,
                    });
                }
            }

            if i + 1 < ntest && !self.config.iteration_delay.is_zero() {
                tokio::time::sleep(self.config.iteration_delay).await;
            }
        }

        tokio::time::sleep(self.config.settle_delay).await;
        self.enter(ntest - 1, Phase::Done);
        let elapsed = started.elapsed();
        info!(
            records = iterations.len(),
            elapsed_ms = elapsed.as_millis() as u64,
            "batch done"
        );
        Ok(BatchReport {
            mode,
            iterations,
            elapsed,
        })
    }

    async fn iteration(
        &self,
        i: usize,
        key: &str,
        value: &[u8],
        mode: DispatchMode,
    ) -> Result<IterationReport, OrchestratorError> {
        let started = Instant::now();

        self.enter(i, Phase::AwaitPeers);
        let gate = PeerGate::new(self.engine.clone(), self.config.min_peers)
            .with_poll_interval(self.config.peer_poll_interval);
        let peers = match self.config.peer_timeout {
            Some(timeout) => gate.wait_for(timeout).await?,
            None => gate.wait().await?,
        };
        self.events.emit(&BatchEvent::PeersReady {
            iteration: i,
            peers,
            waited: started.elapsed(),
        });

        self.enter(i, Phase::ComputeWork);
        let time = Timestamp::now().saturating_sub(self.config.time_margin);
        let challenge = Challenge::for_entry(key, value, time);
        self.events.emit(&BatchEvent::ChallengeBuilt {
            iteration: i,
            key: key.to_string(),
            time,
        });
        let solve_started = Instant::now();
        let progress = self
            .config
            .progress
            .then(|| ProgressReporter::start(std::io::stdout()));
        let solved = self.solve(challenge, mode).await;
        if let Some(progress) = progress {
            progress.finish().await;
        }
        let solution = solved?;
        let solve_time = solve_started.elapsed();
        debug!(work = %solution.work, zeros = solution.work.leading_zero_bits(), "solved");
        self.events.emit(&BatchEvent::Solved {
            iteration: i,
            key: key.to_string(),
            work: solution.work,
            elapsed: solve_time,
        });

        self.enter(i, Phase::Sign);
        let record = Record {
            key: key.to_string(),
            value: value.to_vec(),
            time,
            salt: solution.salt,
            work: solution.work,
            public_key: self.keys.public.clone(),
            signature: sign_work(&solution.work, &self.keys.private),
        };

        self.enter(i, Phase::Submit);
        let ack = self.engine.put(record).map_err(OrchestratorError::Submit)?;
        let acked = match self.config.ack_timeout {
            Some(timeout) => tokio::time::timeout(timeout, ack)
                .await
                .map_err(|_| OrchestratorError::AckTimeout(timeout))?,
            None => ack.await,
        };
        acked
            .map_err(|_| OrchestratorError::AckDropped)?
            .map_err(OrchestratorError::Ack)?;
        self.events.emit(&BatchEvent::Acked {
            iteration: i,
            key: key.to_string(),
        });
        debug!("record acknowledged");

        Ok(IterationReport {
            key: key.to_string(),
            time,
            salt: solution.salt,
            work: solution.work,
            solve_time,
            elapsed: started.elapsed(),
        })
    }

    async fn solve(&self, challenge: Challenge, mode: DispatchMode) -> Result<Solution, OrchestratorError> {
        match self.config.work_timeout {
            Some(timeout) => tokio::time::timeout(timeout, self.search(challenge, mode))
                .await
                .map_err(|_| OrchestratorError::WorkTimeout(timeout))?,
            None => self.search(challenge, mode).await,
        }
    }

    async fn search(&self, challenge: Challenge, mode: DispatchMode) -> Result<Solution, OrchestratorError> {
        let difficulty = self.config.difficulty;
        match mode {
            DispatchMode::Queued => {
                let pending = self.pool.submit(challenge, difficulty).await?;
                Ok(pending.await?)
            }
            DispatchMode::Raced => {
                let cancel = CancelFlag::new();
                let _guard = CancelOnDrop(cancel.clone());
                let pool = self.pool.clone();
                let solution =
                    tokio::task::spawn_blocking(move || pool.race(&challenge, difficulty, &cancel))
                        .await
                        .map_err(|e| OrchestratorError::Join(e.to_string()))??;
                Ok(solution)
            }
        }
    }

    fn enter(&self, iteration: usize, phase: Phase) {
        debug!(iteration, %phase, "phase");
        self.events.emit(&BatchEvent::PhaseEntered { iteration, phase });
    }

    async fn cancelled(&self) {
        match &self.shutdown {
            Some(shutdown) => shutdown.cancelled().await,
            None => std::future::pending().await,
        }
    }
}

/// Stops a raced search whose waiter went away.
struct CancelOnDrop(CancelFlag);

impl Drop for CancelOnDrop {
    fn drop(&mut self) {
        self.0.cancel();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Mutex;

    use dave_crypto::keypair_from_seed;
    use dave_engine::EngineError;
    use dave_nullables::{AckBehaviour, NullEngine};
    use dave_work::validate_record;

    fn orchestrator(engine: &NullEngine, config: OrchestratorConfig) -> Orchestrator {
        Orchestrator::new(
            Arc::new(engine.clone()),
            Arc::new(WorkPool::with_widths(2, 2).unwrap()),
            Arc::new(keypair_from_seed(&[5u8; 32])),
            config,
        )
    }

    fn quick(ntest: usize) -> OrchestratorConfig {
        OrchestratorConfig {
            difficulty: 4,
            ntest,
            settle_delay: Duration::ZERO,
            ..OrchestratorConfig::default()
        }
    }

    #[test]
    fn dispatch_mode_follows_batch_size() {
        assert_eq!(quick(1).dispatch_mode(), DispatchMode::Raced);
        assert_eq!(quick(5).dispatch_mode(), DispatchMode::Queued);
        let forced = OrchestratorConfig {
            mode: Some(DispatchMode::Queued),
            ..quick(1)
        };
        assert_eq!(forced.dispatch_mode(), DispatchMode::Queued);
    }

    #[tokio::test]
    async fn single_record_is_valid_and_signed() {
        let engine = NullEngine::with_peers(0);
        let report = orchestrator(&engine, quick(1)).run("greeting", b"hello").await.unwrap();

        assert_eq!(report.mode, DispatchMode::Raced);
        let submitted = engine.submitted();
        assert_eq!(submitted.len(), 1);
        let record = &submitted[0].record;
        assert_eq!(record.key, "greeting");
        assert!(validate_record(record, 4));
        assert!(dave_crypto::verify_record_signature(record));
        assert_eq!(report.iterations[0].work, record.work);
    }

    #[tokio::test]
    async fn queued_batch_uses_batch_keys() {
        let engine = NullEngine::with_peers(0);
        let report = orchestrator(&engine, quick(4)).run("k", b"v").await.unwrap();
        assert_eq!(report.mode, DispatchMode::Queued);
        assert_eq!(engine.submitted_keys(), vec!["k", "k_1", "k_2", "k_3"]);
        assert!(engine
            .submitted()
            .iter()
            .all(|s| validate_record(&s.record, 4)));
    }

    #[tokio::test]
    async fn refused_record_aborts_with_iteration() {
        let engine = NullEngine::with_peers(0)
            .with_ack(AckBehaviour::Refuse(EngineError::InvalidSignature));
        let err = orchestrator(&engine, quick(3)).run("k", b"v").await.unwrap_err();
        assert_eq!(err.iteration, 0);
        assert_eq!(err.submitted, 0);
        assert!(matches!(err.cause, OrchestratorError::Submit(EngineError::InvalidSignature)));
        assert_eq!(engine.submitted_keys(), vec!["k"]);
    }

    #[tokio::test]
    async fn failed_send_is_reported() {
        let engine = NullEngine::with_peers(0)
            .with_ack(AckBehaviour::FailAck(EngineError::Transport("no route".into())));
        let err = orchestrator(&engine, quick(1)).run("k", b"v").await.unwrap_err();
        assert!(matches!(err.cause, OrchestratorError::Ack(EngineError::Transport(_))));
    }

    #[tokio::test]
    async fn missing_ack_times_out() {
        let engine = NullEngine::with_peers(0).with_ack(AckBehaviour::Never);
        let config = OrchestratorConfig {
            ack_timeout: Some(Duration::from_millis(50)),
            ..quick(2)
        };
        let err = orchestrator(&engine, config).run("k", b"v").await.unwrap_err();
        assert!(matches!(err.cause, OrchestratorError::AckTimeout(_)));
        assert_eq!(err.iteration, 0);
        assert_eq!(engine.submitted_keys(), vec!["k"]);
    }

    #[tokio::test]
    async fn missing_peers_time_out_before_any_work() {
        let engine = NullEngine::with_peers(0);
        let config = OrchestratorConfig {
            min_peers: 2,
            peer_timeout: Some(Duration::from_millis(100)),
            peer_poll_interval: Duration::from_millis(10),
            ..quick(1)
        };
        let err = orchestrator(&engine, config).run("k", b"v").await.unwrap_err();
        assert!(matches!(err.cause, OrchestratorError::Gate(_)));
        assert!(engine.submitted().is_empty());
    }

    #[tokio::test]
    async fn unreachable_difficulty_times_out() {
        let engine = NullEngine::with_peers(0);
        let config = OrchestratorConfig {
            difficulty: 255,
            work_timeout: Some(Duration::from_millis(100)),
            ..quick(1)
        };
        let err = orchestrator(&engine, config).run("k", b"v").await.unwrap_err();
        assert!(matches!(err.cause, OrchestratorError::WorkTimeout(_)));
    }

    #[tokio::test]
    async fn shutdown_cancels_a_running_search() {
        let engine = NullEngine::with_peers(0);
        let shutdown = ShutdownController::new();
        let config = OrchestratorConfig {
            difficulty: 255,
            ..quick(1)
        };
        let orchestrator = orchestrator(&engine, config).with_shutdown(shutdown.clone());
        let trigger = tokio::spawn(async move {
            tokio::time::sleep(Duration::from_millis(50)).await;
            shutdown.shutdown();
        });
        let err = orchestrator.run("k", b"v").await.unwrap_err();
        assert!(matches!(err.cause, OrchestratorError::Cancelled));
        trigger.await.unwrap();
    }

    #[tokio::test]
    async fn phases_run_in_order() {
        let engine = NullEngine::with_peers(0);
        let mut orchestrator = orchestrator(&engine, quick(1));
        let phases = Arc::new(Mutex::new(Vec::new()));
        let sink = phases.clone();
        orchestrator.subscribe(Box::new(move |event| {
            if let BatchEvent::PhaseEntered { phase, .. } = event {
                sink.lock().unwrap().push(*phase);
            }
        }));
        orchestrator.run("k", b"v").await.unwrap();
        assert_eq!(
            *phases.lock().unwrap(),
            vec![
                Phase::Idle,
                Phase::AwaitPeers,
                Phase::ComputeWork,
                Phase::Sign,
                Phase::Submit,
                Phase::Done
            ]
        );
    }
}
