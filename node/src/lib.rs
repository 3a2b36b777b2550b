//! dave node: everything between the CLI and the worker pool.
//!
//! The node is the coordinator that:
//! - Waits for the engine to report enough peers
//! - Builds challenges and dispatches them to the worker pool
//! - Signs solved records and submits them, awaiting each acknowledgement
//! - Shows progress while a search runs
//! - Loads configuration, initialises logging and handles shutdown

pub mod batch_event;
pub mod config;
pub mod edge_monitor;
pub mod error;
pub mod logging;
pub mod orchestrator;
pub mod peer_gate;
pub mod progress;
pub mod shutdown;
pub mod tracing_spans;

pub use batch_event::{BatchEvent, EventBus, Phase};
pub use config::{resolve_addr, ConfigOverrides, NodeConfig, ResolvedAddrs};
pub use edge_monitor::{probe_edges, spawn_edge_monitor};
pub use error::{BatchError, ConfigError, GateError, OrchestratorError};
pub use logging::{init_logging, LogFormat};
pub use orchestrator::{BatchReport, IterationReport, Orchestrator, OrchestratorConfig};
pub use peer_gate::{PeerGate, DEFAULT_PEER_POLL_INTERVAL};
pub use progress::{ProgressHandle, ProgressReporter};
pub use shutdown::ShutdownController;
