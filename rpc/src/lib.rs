//! HTTP gateway for a dave node.
//!
//! Provides endpoints for:
//! - Node status (peer and record counts)
//! - Proof-of-work on demand (`/work`)
//! - Record submission (`/put`) and listing (`/list`)
//! - A websocket echo (`/ws`)

pub mod error;
pub mod handlers;
pub mod server;
pub mod ws;

pub use error::RpcError;
pub use handlers::ApiState;
pub use server::{build_router, RpcServer};
