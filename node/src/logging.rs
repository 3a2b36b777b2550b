//! Structured logging initialisation for the dave binary.
//!
//! Two output formats are supported:
//! - [`LogFormat::Human`]: coloured, human-readable lines (development).
//! - [`LogFormat::Json`]: newline-delimited JSON (log aggregation).
//!
//! The filter level can be overridden at runtime via the `RUST_LOG`
//! environment variable.  When `RUST_LOG` is not set, the caller-supplied
//! `level` string is used (e.g. `"info"`, `"warn,dave_node=debug"`).
//!
//! Logs go to stderr so stdout stays free for command output.

use std::str::FromStr;

use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use crate::ConfigError;

/// Selects the output format for structured logs.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LogFormat {
    /// Pretty-printed, coloured output for local development.
    Human,
    /// Newline-delimited JSON for log aggregation pipelines.
    Json,
}

impl FromStr for LogFormat {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "human" => Ok(Self::Human),
            "json" => Ok(Self::Json),
            _ => Err(ConfigError::LogFormat(s.to_string())),
        }
    }
}

/// Initialise the global tracing subscriber.
///
/// A second call in the same process is ignored.
pub fn init_logging(format: LogFormat, level: &str) {
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level));

    let _ = match format {
        LogFormat::Human => tracing_subscriber::registry()
            .with(filter)
            .with(
                fmt::layer()
                    .with_writer(std::io::stderr)
                    .with_target(true)
                    .with_thread_names(true),
            )
            .try_init(),
        LogFormat::Json => tracing_subscriber::registry()
            .with(filter)
            .with(
                fmt::layer()
                    .json()
                    .with_writer(std::io::stderr)
                    .with_target(true)
                    .with_thread_names(true),
            )
            .try_init(),
    };
}
