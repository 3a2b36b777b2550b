//! Nullable infrastructure for deterministic testing.
//!
//! The engine is the one external dependency of the submission core. This
//! crate provides a test-friendly implementation that:
//! - Reports a scripted peer count over (tokio) time
//! - Acknowledges, delays, withholds or refuses submitted records on demand
//! - Logs every submission with the instant it arrived
//! - Never touches the network
//!
//! Usage: hand a `NullEngine` to the orchestrator or the gateway in tests.

pub mod engine;

pub use engine::{AckBehaviour, NullEngine, SubmittedRecord};
