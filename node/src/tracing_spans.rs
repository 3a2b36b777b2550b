//! Pre-built [`tracing::Span`] constructors for common dave operations.
//!
//! Using consistent span names and field sets across the codebase makes it
//! easy to filter and correlate log lines from one batch.

use tracing::{info_span, Span};

/// Span covering a whole batch run.
pub fn batch_span(key: &str, ntest: usize, difficulty: u8) -> Span {
    info_span!("batch", key = %key, ntest, difficulty)
}

/// Span covering one iteration (one record) of a batch.
pub fn iteration_span(iteration: usize, key: &str) -> Span {
    info_span!("iteration", i = iteration, key = %key)
}

/// Span covering one round of edge liveness probes.
pub fn edge_probe_span(edges: usize) -> Span {
    info_span!("edge_probe", edges)
}
