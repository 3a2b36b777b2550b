//! Node configuration with TOML file support.

use std::net::{IpAddr, SocketAddr, ToSocketAddrs};
use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::logging::LogFormat;
use crate::ConfigError;

/// Configuration for a dave node.
///
/// Loaded from a TOML file via [`NodeConfig::from_toml_file`], then
/// overlaid with command-line values through [`NodeConfig::merge`].
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct NodeConfig {
    /// Ed25519 key file used to sign records.
    #[serde(default = "default_key_filename")]
    pub key_filename: PathBuf,

    /// Address the HTTP gateway listens on.
    #[serde(default = "default_http_listen_addr")]
    pub http_listen_addr: String,

    /// Peer gateways, `host:port`. `:port` means this machine.
    #[serde(default)]
    pub edges: Vec<String>,

    /// Seconds between liveness probes of each edge.
    #[serde(default = "default_edge_probe_secs")]
    pub edge_probe_secs: u64,

    /// Maximum number of records the local engine holds.
    #[serde(default = "default_capacity")]
    pub capacity: usize,

    /// Records older than this are refused by the local engine.
    #[serde(default = "default_ttl_secs")]
    pub ttl_secs: u64,

    /// Log level filter: "trace", "debug", "info", "warn", "error".
    #[serde(default = "default_log_level")]
    pub log_level: String,

    /// Log format: "human" or "json".
    #[serde(default = "default_log_format")]
    pub log_format: String,
}

// ── Serde default helpers ──────────────────────────────────────────────

fn default_key_filename() -> PathBuf {
    PathBuf::from("key.dave")
}

fn default_http_listen_addr() -> String {
    "127.0.0.1:8080".to_string()
}

fn default_edge_probe_secs() -> u64 {
    5
}

fn default_capacity() -> usize {
    100_000
}

fn default_ttl_secs() -> u64 {
    365 * 24 * 60 * 60
}

fn default_log_level() -> String {
    "info".to_string()
}

fn default_log_format() -> String {
    "human".to_string()
}

/// Values given on the command line. `None` and empty fields leave the
/// file configuration untouched.
#[derive(Clone, Debug, Default)]
pub struct ConfigOverrides {
    pub key_filename: Option<PathBuf>,
    pub http_listen_addr: Option<String>,
    pub edges: Vec<String>,
    pub edge_probe_secs: Option<u64>,
    pub capacity: Option<usize>,
    pub ttl_secs: Option<u64>,
    pub log_level: Option<String>,
    pub log_format: Option<String>,
}

/// Addresses resolved from a [`NodeConfig`].
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ResolvedAddrs {
    pub http_listen_addr: SocketAddr,
    pub edges: Vec<SocketAddr>,
}

// ── Impl ───────────────────────────────────────────────────────────────

impl NodeConfig {
    /// Load configuration from a TOML file.
    pub fn from_toml_file(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        let content = std::fs::read_to_string(path).map_err(|source| ConfigError::Read {
            path: path.to_path_buf(),
            source,
        })?;
        Self::from_toml_str(&content)
    }

    /// Parse configuration from a TOML string.
    pub fn from_toml_str(s: &str) -> Result<Self, ConfigError> {
        Ok(toml::from_str(s)?)
    }

    /// Serialize to a TOML string.
    pub fn to_toml_string(&self) -> String {
        toml::to_string_pretty(self).unwrap_or_default()
    }

    /// Overlay command-line values. Given values replace file values; edges
    /// are appended.
    pub fn merge(&mut self, overrides: ConfigOverrides) {
        fn set<T>(dst: &mut T, src: Option<T>) {
            if let Some(value) = src {
                *dst = value;
            }
        }

        set(&mut self.key_filename, overrides.key_filename);
        set(
            &mut self.http_listen_addr,
            overrides.http_listen_addr.filter(|a| !a.is_empty()),
        );
        set(&mut self.edge_probe_secs, overrides.edge_probe_secs);
        set(&mut self.capacity, overrides.capacity);
        set(&mut self.ttl_secs, overrides.ttl_secs);
        set(
            &mut self.log_level,
            overrides.log_level.filter(|l| !l.is_empty()),
        );
        set(
            &mut self.log_format,
            overrides.log_format.filter(|f| !f.is_empty()),
        );
        self.edges
            .extend(overrides.edges.into_iter().filter(|e| !e.is_empty()));
    }

    pub fn ttl(&self) -> Duration {
        Duration::from_secs(self.ttl_secs)
    }

    pub fn edge_probe_interval(&self) -> Duration {
        Duration::from_secs(self.edge_probe_secs.max(1))
    }

    pub fn log_format(&self) -> Result<LogFormat, ConfigError> {
        self.log_format.parse()
    }

    /// Resolve the listen address and every edge.
    pub fn resolve(&self) -> Result<ResolvedAddrs, ConfigError> {
        Ok(ResolvedAddrs {
            http_listen_addr: resolve_addr(&self.http_listen_addr)?,
            edges: self
                .edges
                .iter()
                .map(|e| resolve_addr(e))
                .collect::<Result<_, _>>()?,
        })
    }
}

impl Default for NodeConfig {
    fn default() -> Self {
        Self {
            key_filename: default_key_filename(),
            http_listen_addr: default_http_listen_addr(),
            edges: Vec::new(),
            edge_probe_secs: default_edge_probe_secs(),
            capacity: default_capacity(),
            ttl_secs: default_ttl_secs(),
            log_level: default_log_level(),
            log_format: default_log_format(),
        }
    }
}

/// Parse `ip:port`, `hostname:port` or `:port`.
///
/// `:port` is this machine (`[::1]`). When a hostname resolves to several
/// addresses the first IPv4 one wins.
pub fn resolve_addr(addr: &str) -> Result<SocketAddr, ConfigError> {
    let unresolved = |reason: String| ConfigError::Resolve {
        addr: addr.to_string(),
        reason,
    };

    let addr = addr.trim();
    if let Some(port) = addr.strip_prefix(':') {
        let port: u16 = port.parse().map_err(|_| unresolved("bad port".into()))?;
        return Ok(SocketAddr::new(IpAddr::from([0u16, 0, 0, 0, 0, 0, 0, 1]), port));
    }
    if let Ok(parsed) = addr.parse::<SocketAddr>() {
        return Ok(parsed);
    }

    let candidates: Vec<SocketAddr> = addr
        .to_socket_addrs()
        .map_err(|e| unresolved(e.to_string()))?
        .collect();
    candidates
        .iter()
        .find(|a| a.is_ipv4())
        .or_else(|| candidates.first())
        .copied()
        .ok_or_else(|| unresolved("no addresses found".into()))
}
