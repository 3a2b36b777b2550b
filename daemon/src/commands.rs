//! Subcommands of the `dave` binary.

use std::io::Write;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::{Duration, Instant};

use anyhow::{anyhow, bail, Context};
use clap::{Args, Subcommand, ValueEnum};
use dave_crypto::{generate_keypair, read_key_file, write_key_file};
use dave_engine::{Engine, LocalEngine, LocalEngineConfig, RemoteEngine};
use dave_node::{
    spawn_edge_monitor, BatchEvent, NodeConfig, Orchestrator, OrchestratorConfig,
    ShutdownController,
};
use dave_rpc::handlers::DEFAULT_MAX_DIFFICULTY;
use dave_rpc::{ApiState, RpcServer};
use dave_types::{PublicKey, Record};
use dave_utils::{format_count, format_duration, format_size};
use dave_work::{DispatchMode, WorkPool};
use tokio::task::JoinHandle;
use tracing::info;

/// Options shared by the record commands and `serve`.
#[derive(Args, Debug)]
pub struct BatchArgs {
    /// Required leading zero bits of each record's work.
    #[arg(short = 'd', long, default_value_t = 16, env = "DAVE_DIFFICULTY", global = true)]
    pub difficulty: u8,

    /// Peers the engine must report before each submission.
    #[arg(long, default_value_t = 0, env = "DAVE_NPEER", global = true)]
    pub npeer: usize,

    /// Submit N records, keyed KEY, KEY_1, KEY_2, ...
    #[arg(long, default_value_t = 1, global = true)]
    pub ntest: usize,

    /// Seconds to wait for peers before giving up (0 waits forever).
    #[arg(long, default_value_t = 30, global = true)]
    pub peer_timeout: u64,

    /// Seconds a single search may run. 0 searches until solved, or keeps
    /// the gateway's own limit under `serve`.
    #[arg(long, default_value_t = 0, global = true)]
    pub work_timeout: u64,

    /// Seconds to wait for the engine to confirm a submission (0 waits forever).
    #[arg(long, default_value_t = 10, global = true)]
    pub ack_timeout: u64,

    /// Pause between records of a batch, in milliseconds.
    #[arg(long, default_value_t = 0, global = true)]
    pub epoch_ms: u64,

    /// Worker dispatch. Defaults to raced for one record, queued for batches.
    #[arg(long, value_enum, global = true)]
    pub mode: Option<ModeArg>,

    /// Lowest difficulty `serve` accepts.
    #[arg(long, default_value_t = 0, global = true)]
    pub min_difficulty: u8,

    /// Highest difficulty `serve` solves for through `/work`.
    #[arg(long, default_value_t = DEFAULT_MAX_DIFFICULTY, global = true)]
    pub max_difficulty: u8,

    /// Do not print the "working for" line.
    #[arg(short = 'q', long, global = true)]
    pub quiet: bool,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, ValueEnum)]
pub enum ModeArg {
    Queued,
    Raced,
}

impl From<ModeArg> for DispatchMode {
    fn from(mode: ModeArg) -> Self {
        match mode {
            ModeArg::Queued => DispatchMode::Queued,
            ModeArg::Raced => DispatchMode::Raced,
        }
    }
}

impl BatchArgs {
    pub fn orchestrator_config(&self) -> OrchestratorConfig {
        let seconds = |s: u64| (s > 0).then(|| Duration::from_secs(s));
        OrchestratorConfig {
            difficulty: self.difficulty,
            min_peers: self.npeer,
            ntest: self.ntest.max(1),
            peer_timeout: seconds(self.peer_timeout),
            work_timeout: seconds(self.work_timeout),
            ack_timeout: seconds(self.ack_timeout),
            iteration_delay: Duration::from_millis(self.epoch_ms),
            mode: self.mode.map(Into::into),
            progress: !self.quiet,
            ..OrchestratorConfig::default()
        }
    }

    /// Gateway state for `serve`. Zero timeouts keep the gateway defaults.
    pub fn api_state(&self, engine: Arc<dyn Engine>, pool: Arc<WorkPool>) -> ApiState {
        let mut state = ApiState::new(engine, pool)
            .with_min_difficulty(self.min_difficulty)
            .with_max_difficulty(self.max_difficulty);
        if self.ack_timeout > 0 {
            state = state.with_ack_timeout(Duration::from_secs(self.ack_timeout));
        }
        if self.work_timeout > 0 {
            state = state.with_work_timeout(Duration::from_secs(self.work_timeout));
        }
        state
    }
}

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Generate a key file.
    Keygen {
        /// Where to write it. Defaults to the configured key file.
        filename: Option<PathBuf>,
        /// Replace an existing file.
        #[arg(long)]
        force: bool,
    },
    /// Solve, sign and submit a record.
    Put { key: String, val: String },
    /// Like `put`, reading the value from FILE.
    Setf { key: String, file: PathBuf },
    /// Print the value stored under KEY.
    Get {
        key: String,
        /// Owner's public key in hex. Defaults to the key file's.
        #[arg(long)]
        owner: Option<String>,
        /// Also print how long the lookup took.
        #[arg(short = 's', long)]
        stat: bool,
    },
    /// List records whose key starts with PREFIX.
    List {
        #[arg(default_value = "")]
        prefix: String,
        #[arg(long)]
        owner: Option<String>,
    },
    /// Run the gateway over an in-memory store.
    Serve,
    /// Print version information.
    Version,
}

pub async fn run(
    command: Command,
    batch: &BatchArgs,
    gateway: &str,
    config: NodeConfig,
) -> anyhow::Result<()> {
    match command {
        Command::Keygen { filename, force } => {
            keygen(&filename.unwrap_or(config.key_filename), force)
        }
        Command::Put { key, val } => put(batch, gateway, &config, &key, val.into_bytes()).await,
        Command::Setf { key, file } => {
            let value = std::fs::read(&file)
                .with_context(|| format!("error reading file {}", file.display()))?;
            put(batch, gateway, &config, &key, value).await
        }
        Command::Get { key, owner, stat } => get(gateway, &config, &key, owner, stat).await,
        Command::List { prefix, owner } => list(gateway, &config, &prefix, owner).await,
        Command::Serve => serve(batch, config).await,
        Command::Version => {
            println!("dave {}", env!("CARGO_PKG_VERSION"));
            Ok(())
        }
    }
}

fn keygen(path: &Path, force: bool) -> anyhow::Result<()> {
    if path.exists() && !force {
        bail!("{} already exists, pass --force to replace it", path.display());
    }
    let keypair = generate_keypair()?;
    write_key_file(path, &keypair)?;
    println!("wrote {}", path.display());
    println!("public key: {}", hex::encode(keypair.public.as_bytes()));
    Ok(())
}

async fn put(
    batch: &BatchArgs,
    gateway: &str,
    config: &NodeConfig,
    key: &str,
    value: Vec<u8>,
) -> anyhow::Result<()> {
    if std::str::from_utf8(&value).is_err() {
        bail!("value of {key:?} is not UTF-8 text, which the gateway cannot carry");
    }
    let keys = Arc::new(read_key_file(&config.key_filename)?);
    let engine: Arc<dyn Engine> = Arc::new(RemoteEngine::new(gateway)?);
    let pool = Arc::new(WorkPool::new()?);
    let shutdown = ShutdownController::new();

    let mut orchestrator = Orchestrator::new(engine, pool.clone(), keys, batch.orchestrator_config())
        .with_shutdown(shutdown.clone());
    orchestrator.subscribe(Box::new(print_event));

    let cores = match orchestrator.config().dispatch_mode() {
        DispatchMode::Queued => pool.size(),
        DispatchMode::Raced => pool.race_width(),
    };
    println!("hashing with {cores} cores");

    let signals = spawn_signal_listener(&shutdown);
    let result = orchestrator.run(key, &value).await;
    signals.abort();

    let report = result?;
    println!(
        "sent {} in {}",
        plural(report.iterations.len(), "record"),
        format_duration(report.elapsed)
    );
    Ok(())
}

fn print_event(event: &BatchEvent) {
    match event {
        BatchEvent::PeersReady { peers, waited, .. } if !waited.is_zero() => {
            println!("{} ready after {}", plural(*peers, "peer"), format_duration(*waited));
        }
        BatchEvent::Solved {
            key, work, elapsed, ..
        } => {
            println!(
                "{key}\nWork: {work} ({} leading zero bits, {})",
                work.leading_zero_bits(),
                format_duration(*elapsed)
            );
        }
        BatchEvent::Acked { key, .. } => println!("sent {key}"),
        _ => {}
    }
}

fn plural(n: usize, noun: &str) -> String {
    if n == 1 {
        format!("1 {noun}")
    } else {
        format!("{n} {noun}s")
    }
}

/// Owner given as hex, else the public key of the configured key file.
fn owner_key(owner: Option<String>, config: &NodeConfig) -> anyhow::Result<PublicKey> {
    match owner {
        Some(hex_key) => {
            let bytes = hex::decode(hex_key.trim()).context("owner is not valid hex")?;
            Ok(PublicKey::from_slice(&bytes)?)
        }
        None => Ok(read_key_file(&config.key_filename)?.public),
    }
}

async fn get(
    gateway: &str,
    config: &NodeConfig,
    key: &str,
    owner: Option<String>,
    stat: bool,
) -> anyhow::Result<()> {
    let owner = owner_key(owner, config)?;
    let engine = RemoteEngine::new(gateway)?;
    let started = Instant::now();
    let record = engine
        .get(&owner, key)
        .await?
        .ok_or_else(|| anyhow!("record not found: {key}"))?;
    println!("{}", String::from_utf8_lossy(&record.value));
    if stat {
        println!("t: {}", format_duration(started.elapsed()));
    }
    Ok(())
}

async fn list(
    gateway: &str,
    config: &NodeConfig,
    prefix: &str,
    owner: Option<String>,
) -> anyhow::Result<()> {
    let owner = owner_key(owner, config)?;
    let engine = RemoteEngine::new(gateway)?;
    let records = engine.list(&owner, prefix).await?;
    for record in &records {
        println!("{}", listing_line(record));
    }
    println!("{}", plural(records.len(), "record"));
    Ok(())
}

/// One `list` output line: key, time, size and value, tab separated.
fn listing_line(record: &Record) -> String {
    format!(
        "{}\t{}\t{}\t{}",
        record.key,
        record.time,
        format_size(record.value.len()),
        String::from_utf8_lossy(&record.value)
    )
}

async fn serve(batch: &BatchArgs, config: NodeConfig) -> anyhow::Result<()> {
    let addrs = config.resolve()?;
    let engine = Arc::new(LocalEngine::new(LocalEngineConfig {
        capacity: config.capacity,
        ttl: config.ttl(),
        min_difficulty: batch.min_difficulty,
        ..LocalEngineConfig::default()
    }));
    let pool = Arc::new(WorkPool::new()?);
    let state = Arc::new(batch.api_state(engine.clone(), pool));

    let shutdown = ShutdownController::new();
    let server = RpcServer::new(addrs.http_listen_addr, state.clone());
    let listener = server.bind().await?;
    info!(edges = addrs.edges.len(), capacity = config.capacity, "serving records");

    let monitor = spawn_edge_monitor(
        engine.clone(),
        addrs.edges,
        config.edge_probe_interval(),
        shutdown.clone(),
    );
    let status_line = spawn_status_line(state.clone(), shutdown.clone());
    let signals = spawn_signal_listener(&shutdown);

    let stop = shutdown.clone();
    let served = server
        .serve(listener, async move { stop.cancelled().await })
        .await;

    shutdown.shutdown();
    signals.abort();
    let _ = monitor.await;
    let _ = status_line.await;
    engine.kill().await?;
    println!();
    served?;
    Ok(())
}

/// Prints "handled N dats in T" once per second until shutdown.
fn spawn_status_line(state: Arc<ApiState>, shutdown: ShutdownController) -> JoinHandle<()> {
    tokio::spawn(async move {
        let started = Instant::now();
        let mut ticker = tokio::time::interval(Duration::from_secs(1));
        loop {
            tokio::select! {
                _ = shutdown.cancelled() => break,
                _ = ticker.tick() => print_status(state.puts_handled(), started.elapsed()),
            }
        }
    })
}

fn print_status(handled: u64, elapsed: Duration) {
    let mut out = std::io::stdout().lock();
    let _ = write!(
        out,
        "\rhandled {} dats in {}\x1b[0K",
        format_count(handled),
        format_duration(elapsed)
    );
    let _ = out.flush();
}

fn spawn_signal_listener(shutdown: &ShutdownController) -> JoinHandle<()> {
    let shutdown = shutdown.clone();
    tokio::spawn(async move { shutdown.wait_for_signal().await })
}
