use std::path::PathBuf;
use std::time::Duration;

use dave_engine::EngineError;
use dave_work::WorkError;
use thiserror::Error;

/// Problems with the node configuration. All of them are fatal at startup.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read config file {path}: {source}")]
    Read {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("malformed config: {0}")]
    Parse(#[from] toml::de::Error),

    #[error("cannot resolve address {addr:?}: {reason}")]
    Resolve { addr: String, reason: String },

    #[error("unknown log format {0:?}, expected \"human\" or \"json\"")]
    LogFormat(String),
}

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum GateError {
    #[error("fewer than {required} peers after {waited:?}")]
    Timeout { required: usize, waited: Duration },

    #[error("peer count unavailable: {0}")]
    Engine(#[from] EngineError),
}

/// Why a single iteration of a batch stopped.
#[derive(Debug, Error)]
pub enum OrchestratorError {
    #[error(transparent)]
    Gate(#[from] GateError),

    #[error("work search failed: {0}")]
    Work(#[from] WorkError),

    #[error("no solution within {0:?}")]
    WorkTimeout(Duration),

    #[error("engine refused the record: {0}")]
    Submit(#[source] EngineError),

    #[error("engine failed to send the record: {0}")]
    Ack(#[source] EngineError),

    #[error("no acknowledgement within {0:?}")]
    AckTimeout(Duration),

    #[error("engine dropped the acknowledgement")]
    AckDropped,

    #[error("cancelled by shutdown")]
    Cancelled,

    #[error("search task failed: {0}")]
    Join(String),
}

/// A batch stopped part way. Records submitted before `iteration` stay
/// submitted.
#[derive(Debug, Error)]
#[error("iteration {iteration} failed after {submitted} acknowledged records: {cause}")]
pub struct BatchError {
    pub iteration: usize,
    pub submitted: usize,
    #[source]
    pub cause: OrchestratorError,
}
