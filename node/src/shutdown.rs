//! Graceful shutdown controller.
//!
//! Listens for SIGINT/SIGTERM and broadcasts a shutdown signal to every
//! subsystem via a `tokio::sync::broadcast` channel: the gateway, the edge
//! monitor and any running batch.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use tokio::signal;
use tokio::sync::broadcast;

/// Coordinates graceful shutdown across the node's tasks.
///
/// Subsystems call [`subscribe`](Self::subscribe) to get a receiver, or await
/// [`cancelled`](Self::cancelled), alongside their main loop. When shutdown
/// is triggered (either by OS signal or programmatically), every receiver is
/// notified. Clones share the same signal.
#[derive(Clone)]
pub struct ShutdownController {
    tx: broadcast::Sender<()>,
    triggered: Arc<AtomicBool>,
}

impl ShutdownController {
    pub fn new() -> Self {
        let (tx, _) = broadcast::channel(1);
        Self {
            tx,
            triggered: Arc::new(AtomicBool::new(false)),
        }
    }

    /// Get a receiver that will be notified on shutdown.
    pub fn subscribe(&self) -> broadcast::Receiver<()> {
        self.tx.subscribe()
    }

    /// Trigger shutdown programmatically.
    pub fn shutdown(&self) {
        self.triggered.store(true, Ordering::SeqCst);
        let _ = self.tx.send(());
    }

    pub fn is_triggered(&self) -> bool {
        self.triggered.load(Ordering::SeqCst)
    }

    /// Resolves once shutdown has been triggered, including before the call.
    pub async fn cancelled(&self) {
        let mut rx = self.tx.subscribe();
        if self.is_triggered() {
            return;
        }
        let _ = rx.recv().await;
    }

    /// Wait for SIGTERM or SIGINT, then trigger shutdown.
    pub async fn wait_for_signal(&self) {
        let ctrl_c = signal::ctrl_c();

        #[cfg(unix)]
        let terminate = async {
            match signal::unix::signal(signal::unix::SignalKind::terminate()) {
                Ok(mut sigterm) => {
                    sigterm.recv().await;
                }
                Err(e) => {
                    tracing::warn!(error = %e, "cannot install SIGTERM handler");
                    std::future::pending::<()>().await;
                }
            }
        };

        #[cfg(not(unix))]
        let terminate = std::future::pending::<()>();

        tokio::select! {
            _ = ctrl_c => { tracing::info!("received SIGINT, shutting down"); }
            _ = terminate => { tracing::info!("received SIGTERM, shutting down"); }
        }

        self.shutdown();
    }
}

impl Default for ShutdownController {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn programmatic_shutdown_notifies_subscribers() {
        let controller = ShutdownController::new();
        let mut rx = controller.subscribe();
        controller.shutdown();
        assert!(rx.recv().await.is_ok());
    }

    #[tokio::test]
    async fn multiple_subscribers_all_notified() {
        let controller = ShutdownController::new();
        let mut rx1 = controller.subscribe();
        let mut rx2 = controller.clone().subscribe();
        controller.shutdown();
        assert!(rx1.recv().await.is_ok());
        assert!(rx2.recv().await.is_ok());
    }

    #[tokio::test]
    async fn cancelled_resolves_after_earlier_shutdown() {
        let controller = ShutdownController::new();
        controller.shutdown();
        controller.cancelled().await;
        assert!(controller.is_triggered());
    }

    #[tokio::test]
    async fn cancelled_waits_for_shutdown() {
        let controller = ShutdownController::new();
        let waiter = {
            let controller = controller.clone();
            tokio::spawn(async move { controller.cancelled().await })
        };
        tokio::task::yield_now().await;
        assert!(!waiter.is_finished());
        controller.shutdown();
        waiter.await.unwrap();
    }
}
