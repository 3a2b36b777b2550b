//! Edge liveness: the peer count of a serving node.
//!
//! Every probe round sends `GET /status` to each configured edge gateway.
//! The number of edges that answer becomes the local engine's peer count.

use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use dave_engine::{Engine, LocalEngine, RemoteEngine};
use futures_util::future::join_all;
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;
use tracing::{debug, warn, Instrument};

use crate::tracing_spans::edge_probe_span;
use crate::ShutdownController;

/// Timeout for a single edge probe.
const PROBE_TIMEOUT: Duration = Duration::from_secs(3);

/// Ask every edge for its status once; returns how many answered.
pub async fn probe_edges(edges: &[SocketAddr]) -> usize {
    let probes = edges.iter().map(|addr| async move {
        let client = match RemoteEngine::new(format!("http://{addr}")) {
            Ok(client) => client,
            Err(e) => {
                warn!(%addr, error = %e, "cannot build edge client");
                return false;
            }
        };
        match tokio::time::timeout(PROBE_TIMEOUT, client.record_count()).await {
            Ok(Ok(_)) => true,
            Ok(Err(e)) => {
                debug!(%addr, error = %e, "edge unreachable");
                false
            }
            Err(_) => {
                debug!(%addr, "edge probe timed out");
                false
            }
        }
    });
    join_all(probes).await.into_iter().filter(|alive| *alive).count()
}

/// Keep `engine`'s peer count in step with the reachable edges until shutdown.
pub fn spawn_edge_monitor(
    engine: Arc<LocalEngine>,
    edges: Vec<SocketAddr>,
    interval: Duration,
    shutdown: ShutdownController,
) -> JoinHandle<()> {
    tokio::spawn(async move {
        if edges.is_empty() {
            return;
        }
        let mut ticker = tokio::time::interval(interval);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
        loop {
            tokio::select! {
                _ = shutdown.cancelled() => break,
                _ = ticker.tick() => {
                    let alive = probe_edges(&edges)
                        .instrument(edge_probe_span(edges.len()))
                        .await;
                    engine.set_peer_count(alive);
                    debug!(alive, total = edges.len(), "edges probed");
                }
            }
        }
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use dave_rpc::{ApiState, RpcServer};
    use dave_work::WorkPool;

    #[tokio::test]
    async fn no_edges_means_no_peers() {
        assert_eq!(probe_edges(&[]).await, 0);
    }

    #[tokio::test]
    async fn closed_port_is_not_a_peer() {
        // Bind then drop to get a port nothing listens on.
        let listener = std::net::TcpListener::bind("127.0.0.1:0").unwrap();
        let addr = listener.local_addr().unwrap();
        drop(listener);
        assert_eq!(probe_edges(&[addr]).await, 0);
    }

    #[tokio::test]
    async fn monitor_stops_on_shutdown() {
        let engine = Arc::new(LocalEngine::default());
        let shutdown = ShutdownController::new();
        let listener = std::net::TcpListener::bind("127.0.0.1:0").unwrap();
        let addr = listener.local_addr().unwrap();
        drop(listener);

        let handle = spawn_edge_monitor(
            engine.clone(),
            vec![addr],
            Duration::from_millis(10),
            shutdown.clone(),
        );
        tokio::time::sleep(Duration::from_millis(50)).await;
        shutdown.shutdown();
        handle.await.unwrap();
        assert_eq!(engine.peer_count().await.unwrap(), 0);
    }

    async fn serve_edge() -> SocketAddr {
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        let state = ApiState::new(
            Arc::new(LocalEngine::default()),
            Arc::new(WorkPool::with_widths(1, 1).unwrap()),
        );
        let server = RpcServer::new(addr, Arc::new(state));
        tokio::spawn(async move { server.serve(listener, std::future::pending::<()>()).await });
        addr
    }

    #[tokio::test]
    async fn live_gateway_is_a_peer() {
        let addr = serve_edge().await;
        assert_eq!(probe_edges(&[addr]).await, 1);
    }

    #[tokio::test]
    async fn monitor_counts_a_live_gateway() {
        let addr = serve_edge().await;
        let engine = Arc::new(LocalEngine::default());
        let shutdown = ShutdownController::new();
        assert_eq!(engine.peer_count().await.unwrap(), 0);

        let handle = spawn_edge_monitor(
            engine.clone(),
            vec![addr],
            Duration::from_millis(50),
            shutdown.clone(),
        );
        tokio::time::timeout(Duration::from_secs(5), async {
            while engine.peer_count().await.unwrap() != 1 {
                tokio::time::sleep(Duration::from_millis(10)).await;
            }
        })
        .await
        .expect("monitor never saw the live edge");

        shutdown.shutdown();
        handle.await.unwrap();
        assert_eq!(engine.peer_count().await.unwrap(), 1);
    }
}
