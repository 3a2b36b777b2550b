//! Blocks a submission until the engine reports enough peers.

use std::sync::Arc;
use std::time::Duration;

use dave_engine::Engine;
use tokio::time::Instant;
use tracing::{debug, trace};

use crate::GateError;

/// How often the peer count is polled by default.
pub const DEFAULT_PEER_POLL_INTERVAL: Duration = Duration::from_millis(200);

/// Polls [`Engine::peer_count`] until it reaches `min_peers`.
pub struct PeerGate {
    engine: Arc<dyn Engine>,
    min_peers: usize,
    poll_interval: Duration,
}

impl PeerGate {
    pub fn new(engine: Arc<dyn Engine>, min_peers: usize) -> Self {
        Self {
            engine,
            min_peers,
            poll_interval: DEFAULT_PEER_POLL_INTERVAL,
        }
    }

    pub fn with_poll_interval(mut self, interval: Duration) -> Self {
        self.poll_interval = interval;
        self
    }

    pub fn min_peers(&self) -> usize {
        self.min_peers
    }

    /// Wait without a bound. Returns the peer count that opened the gate.
    ///
    /// A threshold of 0 returns after one query.
    pub async fn wait(&self) -> Result<usize, GateError> {
        let started = Instant::now();
        loop {
            let peers = self.engine.peer_count().await?;
            if peers >= self.min_peers {
                debug!(
                    peers,
                    required = self.min_peers,
                    waited_ms = started.elapsed().as_millis() as u64,
                    "peer gate open"
                );
                return Ok(peers);
            }
            trace!(peers, required = self.min_peers, "waiting for peers");
            tokio::time::sleep(self.poll_interval).await;
        }
    }

    /// Wait at most `timeout`.
    pub async fn wait_for(&self, timeout: Duration) -> Result<usize, GateError> {
        tokio::time::timeout(timeout, self.wait())
            .await
            .map_err(|_| GateError::Timeout {
                required: self.min_peers,
                waited: timeout,
            })?
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use dave_engine::EngineError;
    use dave_nullables::NullEngine;

    #[tokio::test(start_paused = true)]
    async fn opens_when_peers_arrive() {
        let engine = NullEngine::with_peer_schedule(vec![
            (Duration::ZERO, 0),
            (Duration::from_millis(300), 2),
            (Duration::from_millis(700), 3),
        ]);
        let gate = PeerGate::new(Arc::new(engine.clone()), 3);
        let started = Instant::now();

        assert_eq!(gate.wait().await.unwrap(), 3);
        assert!(started.elapsed() >= Duration::from_millis(700));
        // Polls at 0, 200, ..., 800.
        assert_eq!(engine.peer_queries(), 5);
    }

    #[tokio::test(start_paused = true)]
    async fn zero_threshold_opens_immediately() {
        let engine = NullEngine::with_peers(0);
        let gate = PeerGate::new(Arc::new(engine.clone()), 0);
        let started = Instant::now();
        assert_eq!(gate.wait().await.unwrap(), 0);
        assert_eq!(started.elapsed(), Duration::ZERO);
        assert_eq!(engine.peer_queries(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn bounded_wait_times_out() {
        let gate = PeerGate::new(Arc::new(NullEngine::with_peers(1)), 2);
        let err = gate.wait_for(Duration::from_secs(1)).await.unwrap_err();
        assert_eq!(
            err,
            GateError::Timeout {
                required: 2,
                waited: Duration::from_secs(1)
            }
        );
    }

    #[tokio::test(start_paused = true)]
    async fn custom_poll_interval_is_used() {
        let engine = NullEngine::with_peer_schedule(vec![(Duration::from_millis(50), 1)]);
        let gate = PeerGate::new(Arc::new(engine.clone()), 1)
            .with_poll_interval(Duration::from_millis(20));
        gate.wait().await.unwrap();
        // Polls at 0, 20, 40, 60.
        assert_eq!(engine.peer_queries(), 4);
    }

    #[tokio::test]
    async fn engine_errors_surface() {
        struct Broken;
        impl Engine for Broken {
            fn put(&self, _: dave_types::Record) -> Result<dave_engine::PutAck, EngineError> {
                Err(EngineError::Killed)
            }
            fn peer_count(&self) -> dave_engine::EngineFuture<'_, usize> {
                Box::pin(async { Err(EngineError::Transport("down".into())) })
            }
            fn get<'a>(
                &'a self,
                _: &'a dave_types::PublicKey,
                _: &'a str,
            ) -> dave_engine::EngineFuture<'a, Option<dave_types::Record>> {
                Box::pin(async { Ok(None) })
            }
            fn list<'a>(
                &'a self,
                _: &'a dave_types::PublicKey,
                _: &'a str,
            ) -> dave_engine::EngineFuture<'a, Vec<dave_types::Record>> {
                Box::pin(async { Ok(Vec::new()) })
            }
            fn record_count(&self) -> dave_engine::EngineFuture<'_, usize> {
                Box::pin(async { Ok(0) })
            }
            fn kill(&self) -> dave_engine::EngineFuture<'_, ()> {
                Box::pin(async { Ok(()) })
            }
        }

        let gate = PeerGate::new(Arc::new(Broken), 1);
        assert!(matches!(gate.wait().await, Err(GateError::Engine(_))));
    }
}
