//! In-process engine: verifies and stores records in memory.
//!
//! There is no network behind it, so every accepted record is acknowledged
//! immediately and the peer count is whatever the owner sets.

use std::collections::BTreeMap;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::RwLock;
use std::time::Duration;

use dave_crypto::verify_record_signature;
use dave_types::{PublicKey, Record, Timestamp};
use dave_work::validate_record;
use futures_util::FutureExt;
use tokio::sync::oneshot;
use tracing::debug;

use crate::{Engine, EngineError, EngineFuture, PutAck};

/// Acceptance rules for the local store.
#[derive(Clone, Debug)]
pub struct LocalEngineConfig {
    /// Maximum number of records held.
    pub capacity: usize,
    /// Records older than this are refused.
    pub ttl: Duration,
    /// Minimum leading zero bits a record's work must carry.
    pub min_difficulty: u8,
    /// How far in the future a record time may be.
    pub max_clock_skew: Duration,
}

impl Default for LocalEngineConfig {
    fn default() -> Self {
        Self {
            capacity: 100_000,
            ttl: Duration::from_secs(365 * 24 * 60 * 60),
            min_difficulty: 0,
            max_clock_skew: Duration::from_secs(1),
        }
    }
}

type RecordKey = (PublicKey, String);

pub struct LocalEngine {
    config: LocalEngineConfig,
    records: RwLock<BTreeMap<RecordKey, Record>>,
    peers: AtomicUsize,
    killed: AtomicBool,
}

impl LocalEngine {
    pub fn new(config: LocalEngineConfig) -> Self {
        Self {
            config,
            records: RwLock::new(BTreeMap::new()),
            peers: AtomicUsize::new(0),
            killed: AtomicBool::new(false),
        }
    }

    pub fn config(&self) -> &LocalEngineConfig {
        &self.config
    }

    /// Override the reported peer count.
    pub fn set_peer_count(&self, peers: usize) {
        self.peers.store(peers, Ordering::Relaxed);
    }

    /// Check a record against the acceptance rules without storing it.
    pub fn verify(&self, record: &Record, now: Timestamp) -> Result<(), EngineError> {
        if !validate_record(record, self.config.min_difficulty) {
            return Err(EngineError::InvalidWork {
                required: self.config.min_difficulty,
            });
        }
        if !verify_record_signature(record) {
            return Err(EngineError::InvalidSignature);
        }
        if record.time > now.saturating_add(self.config.max_clock_skew) {
            return Err(EngineError::FromTheFuture {
                skew: now.elapsed_since(record.time),
            });
        }
        if record.time.elapsed_since(now) > self.config.ttl {
            return Err(EngineError::Expired {
                ttl: self.config.ttl,
            });
        }
        Ok(())
    }

    fn store(&self, record: Record) -> Result<(), EngineError> {
        let mut records = self
            .records
            .write()
            .map_err(|_| EngineError::Transport("record map poisoned".into()))?;
        let slot = (record.public_key.clone(), record.key.clone());
        match records.get(&slot) {
            Some(existing) if existing.time >= record.time => {
                return Err(EngineError::Stale(record.key));
            }
            None if records.len() >= self.config.capacity => {
                return Err(EngineError::Full {
                    capacity: self.config.capacity,
                });
            }
            _ => {}
        }
        debug!(key = %record.key, work = %record.work, "record stored");
        records.insert(slot, record);
        Ok(())
    }

    fn read<T>(&self, f: impl FnOnce(&BTreeMap<RecordKey, Record>) -> T) -> Result<T, EngineError> {
        let records = self
            .records
            .read()
            .map_err(|_| EngineError::Transport("record map poisoned".into()))?;
        Ok(f(&records))
    }
}

impl Default for LocalEngine {
    fn default() -> Self {
        Self::new(LocalEngineConfig::default())
    }
}

impl Engine for LocalEngine {
    fn put(&self, record: Record) -> Result<PutAck, EngineError> {
        if self.killed.load(Ordering::Relaxed) {
            return Err(EngineError::Killed);
        }
        self.verify(&record, Timestamp::now())?;
        self.store(record)?;
        let (tx, rx) = oneshot::channel();
        let _ = tx.send(Ok(()));
        Ok(rx)
    }

    fn peer_count(&self) -> EngineFuture<'_, usize> {
        let peers = self.peers.load(Ordering::Relaxed);
        async move { Ok(peers) }.boxed()
    }

    fn get<'a>(&'a self, public_key: &'a PublicKey, key: &'a str) -> EngineFuture<'a, Option<Record>> {
        let found = self.read(|records| records.get(&(public_key.clone(), key.to_string())).cloned());
        async move { found }.boxed()
    }

    fn list<'a>(
        &'a self,
        public_key: &'a PublicKey,
        key_prefix: &'a str,
    ) -> EngineFuture<'a, Vec<Record>> {
        let found = self.read(|records| {
            records
                .iter()
                .filter(|((owner, key), _)| owner == public_key && key.starts_with(key_prefix))
                .map(|(_, record)| record.clone())
                .collect()
        });
        async move { found }.boxed()
    }

    fn record_count(&self) -> EngineFuture<'_, usize> {
        let count = self.read(|records| records.len());
        async move { count }.boxed()
    }

    fn kill(&self) -> EngineFuture<'_, ()> {
        self.killed.store(true, Ordering::Relaxed);
        async move { Ok(()) }.boxed()
    }
}
