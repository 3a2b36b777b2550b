//! Gateway error types.

use std::time::Duration;

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use dave_engine::EngineError;
use dave_work::WorkError;
use serde_json::json;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum RpcError {
    #[error("invalid request: {0}")]
    BadRequest(String),

    #[error(transparent)]
    Engine(#[from] EngineError),

    #[error("work generation error: {0}")]
    Work(#[from] WorkError),

    #[error("engine did not acknowledge in time")]
    AckTimeout,

    #[error("no solution within {0:?}")]
    WorkTimeout(Duration),

    #[error("server error: {0}")]
    Server(String),
}

impl RpcError {
    pub fn status(&self) -> StatusCode {
        match self {
            RpcError::BadRequest(_) => StatusCode::BAD_REQUEST,
            RpcError::Engine(e) => match e {
                EngineError::InvalidWork { .. }
                | EngineError::InvalidSignature
                | EngineError::FromTheFuture { .. }
                | EngineError::Expired { .. }
                | EngineError::Decode { .. }
                | EngineError::NonTextValue { .. } => StatusCode::BAD_REQUEST,
                EngineError::Stale(_) => StatusCode::CONFLICT,
                EngineError::Full { .. } => StatusCode::INSUFFICIENT_STORAGE,
                EngineError::Killed => StatusCode::SERVICE_UNAVAILABLE,
                EngineError::Transport(_) | EngineError::Rejected { .. } => StatusCode::BAD_GATEWAY,
            },
            RpcError::AckTimeout | RpcError::WorkTimeout(_) => StatusCode::GATEWAY_TIMEOUT,
            RpcError::Work(_) | RpcError::Server(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl IntoResponse for RpcError {
    fn into_response(self) -> Response {
        let status = self.status();
        let body = Json(json!({
            "error": self.to_string()
        }));
        (status, body).into_response()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn decode_failures_are_client_errors() {
        let err = RpcError::from(EngineError::Decode {
            field: "sig",
            reason: "bad".into(),
        });
        assert_eq!(err.status(), StatusCode::BAD_REQUEST);
        assert_eq!(RpcError::BadRequest("x".into()).status(), StatusCode::BAD_REQUEST);
    }

    #[test]
    fn engine_state_maps_to_server_side_codes() {
        assert_eq!(RpcError::from(EngineError::Stale("k".into())).status(), StatusCode::CONFLICT);
        assert_eq!(
            RpcError::from(EngineError::Full { capacity: 1 }).status(),
            StatusCode::INSUFFICIENT_STORAGE
        );
        assert_eq!(RpcError::AckTimeout.status(), StatusCode::GATEWAY_TIMEOUT);
        assert_eq!(
            RpcError::WorkTimeout(Duration::from_secs(1)).status(),
            StatusCode::GATEWAY_TIMEOUT
        );
    }
}
