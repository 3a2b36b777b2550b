//! Axum-based gateway server.

use std::future::Future;
use std::net::SocketAddr;

use axum::routing::{get, post};
use axum::Router;
use tokio::net::TcpListener;
use tower_http::cors::{Any, CorsLayer};
use tracing::{info, warn};

use crate::error::RpcError;
use crate::handlers::{self, SharedState};
use crate::ws::ws_handler;

/// Fallback used when the configured address cannot be bound.
const FALLBACK_ADDR: &str = "127.0.0.1:0";

/// Every gateway route, with permissive CORS.
pub fn build_router(state: SharedState) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    Router::new()
        .route("/", get(handlers::status))
        .route("/status", get(handlers::status))
        .route("/work", post(handlers::work))
        .route("/put", post(handlers::put))
        .route("/list", post(handlers::list))
        .route("/ws", get(ws_handler))
        .layer(cors)
        .with_state(state)
}

pub struct RpcServer {
    pub listen_addr: SocketAddr,
    pub state: SharedState,
}

impl RpcServer {
    pub fn new(listen_addr: SocketAddr, state: SharedState) -> Self {
        Self { listen_addr, state }
    }

    /// Bind the configured address, falling back to an ephemeral loopback
    /// port if that fails.
    pub async fn bind(&self) -> Result<TcpListener, RpcError> {
        match TcpListener::bind(self.listen_addr).await {
            Ok(listener) => Ok(listener),
            Err(e) => {
                warn!(addr = %self.listen_addr, error = %e, "cannot bind gateway address, falling back");
                TcpListener::bind(FALLBACK_ADDR)
                    .await
                    .map_err(|e| RpcError::Server(e.to_string()))
            }
        }
    }

    /// Serve on `listener` until `shutdown` resolves.
    pub async fn serve<F>(&self, listener: TcpListener, shutdown: F) -> Result<(), RpcError>
    where
        F: Future<Output = ()> + Send + 'static,
    {
        let addr = listener
            .local_addr()
            .map_err(|e| RpcError::Server(e.to_string()))?;
        info!(%addr, "gateway listening");
        axum::serve(listener, build_router(self.state.clone()))
            .with_graceful_shutdown(shutdown)
            .await
            .map_err(|e| RpcError::Server(e.to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;

    use dave_nullables::NullEngine;
    use dave_work::WorkPool;

    use crate::ApiState;

    fn state() -> SharedState {
        Arc::new(ApiState::new(
            Arc::new(NullEngine::with_peers(0)),
            Arc::new(WorkPool::with_widths(1, 1).unwrap()),
        ))
    }

    #[tokio::test]
    async fn taken_address_falls_back_to_loopback() {
        let taken = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let server = RpcServer::new(taken.local_addr().unwrap(), state());
        let listener = server.bind().await.unwrap();
        let addr = listener.local_addr().unwrap();
        assert!(addr.ip().is_loopback());
        assert_ne!(addr, taken.local_addr().unwrap());
    }

    #[tokio::test]
    async fn serve_stops_on_shutdown() {
        let server = RpcServer::new("127.0.0.1:0".parse().unwrap(), state());
        let listener = server.bind().await.unwrap();
        server.serve(listener, async {}).await.unwrap();
    }
}
