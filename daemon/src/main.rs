//! dave: proof-of-work record issuance from the command line.

mod commands;

use std::path::PathBuf;
use std::process::ExitCode;

use clap::Parser;
use dave_node::{init_logging, ConfigOverrides, NodeConfig};

#[derive(Parser)]
#[command(name = "dave", about = "Proof-of-work record issuance", version)]
struct Cli {
    /// Path to a TOML configuration file. If provided, file settings
    /// are used as the base; CLI flags and env vars override them.
    #[arg(long, env = "DAVE_CONFIG", global = true)]
    config: Option<PathBuf>,

    /// Ed25519 key file used to sign records.
    #[arg(short = 'k', long, env = "DAVE_KEY_FILE", global = true)]
    key_file: Option<PathBuf>,

    /// Gateway the record commands talk to.
    #[arg(long, default_value = "http://127.0.0.1:8080", env = "DAVE_GATEWAY", global = true)]
    gateway: String,

    /// Address `serve` listens on.
    #[arg(short = 'l', long, env = "DAVE_LISTEN", global = true)]
    listen: Option<String>,

    /// Edge gateways whose liveness makes up the peer count of `serve`
    /// (comma-separated: "10.0.0.1:8080,:8081").
    #[arg(short = 'e', long = "edge", env = "DAVE_EDGES", value_delimiter = ',', global = true)]
    edges: Vec<String>,

    /// Record capacity of the local store (`serve`).
    #[arg(long, env = "DAVE_CAPACITY", global = true)]
    capacity: Option<usize>,

    /// Maximum record age accepted by the local store, in seconds (`serve`).
    #[arg(long, env = "DAVE_TTL_SECS", global = true)]
    ttl_secs: Option<u64>,

    /// Log level: "trace", "debug", "info", "warn", "error".
    #[arg(long, env = "DAVE_LOG_LEVEL", global = true)]
    log_level: Option<String>,

    /// Log format: "human" or "json".
    #[arg(long, env = "DAVE_LOG_FORMAT", global = true)]
    log_format: Option<String>,

    #[command(flatten)]
    batch: commands::BatchArgs,

    /// Subcommand.
    #[command(subcommand)]
    command: commands::Command,
}

impl Cli {
    fn overrides(&self) -> ConfigOverrides {
        ConfigOverrides {
            key_filename: self.key_file.clone(),
            http_listen_addr: self.listen.clone(),
            edges: self.edges.clone(),
            edge_probe_secs: None,
            capacity: self.capacity,
            ttl_secs: self.ttl_secs,
            log_level: self.log_level.clone(),
            log_format: self.log_format.clone(),
        }
    }

    fn load_config(&self) -> anyhow::Result<NodeConfig> {
        let mut config = match &self.config {
            Some(path) => NodeConfig::from_toml_file(path)?,
            None => NodeConfig::default(),
        };
        config.merge(self.overrides());
        Ok(config)
    }
}

#[tokio::main]
async fn main() -> ExitCode {
    let cli = match Cli::try_parse() {
        Ok(cli) => cli,
        Err(e) => {
            let code = if e.use_stderr() { 1 } else { 0 };
            let _ = e.print();
            return ExitCode::from(code);
        }
    };

    let config = match cli.load_config() {
        Ok(config) => config,
        Err(e) => return fail(&e),
    };
    match config.log_format() {
        Ok(format) => init_logging(format, &config.log_level),
        Err(e) => return fail(&e.into()),
    }
    if let Some(path) = &cli.config {
        tracing::info!("Loaded config from {}", path.display());
    }

    match commands::run(cli.command, &cli.batch, &cli.gateway, config).await {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => fail(&e),
    }
}

/// Print the error chain and pick the exit code: 2 for file I/O, 1 otherwise.
fn fail(error: &anyhow::Error) -> ExitCode {
    eprintln!("error: {}", describe(error));
    ExitCode::from(exit_code(error))
}

/// The error chain on one line, skipping causes already quoted by their parent.
fn describe(error: &anyhow::Error) -> String {
    let mut message = error.to_string();
    for cause in error.chain().skip(1) {
        let text = cause.to_string();
        if !message.contains(&text) {
            message.push_str(": ");
            message.push_str(&text);
        }
    }
    message
}

fn exit_code(error: &anyhow::Error) -> u8 {
    if error.chain().any(|cause| cause.is::<std::io::Error>()) {
        2
    } else {
        1
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use anyhow::Context;

    #[test]
    fn file_errors_exit_with_two() {
        let err = std::fs::read("/nonexistent/dave/file")
            .context("reading value file")
            .unwrap_err();
        assert_eq!(exit_code(&err), 2);
    }

    #[test]
    fn chain_is_not_repeated() {
        let err: anyhow::Error = dave_crypto::read_key_file("/nonexistent/key.dave")
            .err()
            .unwrap()
            .into();
        let err = err.context("loading keys");
        let text = describe(&err);
        assert!(text.starts_with("loading keys: failed to read key file /nonexistent/key.dave"));
        assert_eq!(text.matches("No such file").count(), 1);
    }

    #[test]
    fn other_errors_exit_with_one() {
        assert_eq!(exit_code(&anyhow::anyhow!("record not found")), 1);
    }

    #[test]
    fn key_file_read_failure_is_a_file_error() {
        let err: anyhow::Error = dave_crypto::read_key_file("/nonexistent/key.dave")
            .err()
            .unwrap()
            .into();
        assert_eq!(exit_code(&err), 2);
    }

    #[test]
    fn flags_override_file_config() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("dave.toml");
        std::fs::write(&path, "key_filename = \"file.key\"\nedges = [\":9000\"]\n").unwrap();

        let cli = Cli::try_parse_from([
            "dave",
            "--config",
            path.to_str().unwrap(),
            "-e",
            ":9001",
            "-k",
            "flag.key",
            "version",
        ])
        .unwrap();
        let config = cli.load_config().unwrap();
        assert_eq!(config.key_filename, PathBuf::from("flag.key"));
        assert_eq!(config.edges, vec![":9000", ":9001"]);
    }

    #[test]
    fn missing_subcommand_argument_is_a_usage_error() {
        let err = Cli::try_parse_from(["dave", "put", "only-key"]).err().unwrap();
        assert!(err.use_stderr());
    }
}
