//! The storage/network engine records are submitted to.
//!
//! The orchestrator and the gateway only ever talk to the [`Engine`] trait.
//! Two implementations live here:
//!
//! - [`LocalEngine`]: an in-process store that verifies work and signatures
//!   and keeps records in memory. Backs `dave serve`.
//! - [`RemoteEngine`]: forwards to a running gateway over HTTP. Used by the
//!   CLI so `put`/`get`/`list` reach a serving node.
//!
//! The JSON shapes both sides of the gateway agree on are in [`wire`].

pub mod error;
pub mod local;
pub mod remote;
pub mod wire;

use dave_types::{PublicKey, Record};
use futures_util::future::BoxFuture;
use tokio::sync::oneshot;

pub use error::EngineError;
pub use local::{LocalEngine, LocalEngineConfig};
pub use remote::RemoteEngine;

/// Future returned by the asynchronous engine calls.
pub type EngineFuture<'a, T> = BoxFuture<'a, Result<T, EngineError>>;

/// Resolves once a submitted record has been sent, or with the reason it was not.
pub type PutAck = oneshot::Receiver<Result<(), EngineError>>;

/// Contract between the submission core and whatever stores and spreads records.
pub trait Engine: Send + Sync {
    /// Hand a record over for sending. Returns without waiting for the send;
    /// the returned channel reports completion. Records rejected up front
    /// (bad work, bad signature, shut down) fail here.
    fn put(&self, record: Record) -> Result<PutAck, EngineError>;

    /// Number of peers currently considered active.
    fn peer_count(&self) -> EngineFuture<'_, usize>;

    /// Look up the record `key` owned by `public_key`.
    fn get<'a>(&'a self, public_key: &'a PublicKey, key: &'a str) -> EngineFuture<'a, Option<Record>>;

    /// Records owned by `public_key` whose key starts with `key_prefix`, sorted by key.
    fn list<'a>(
        &'a self,
        public_key: &'a PublicKey,
        key_prefix: &'a str,
    ) -> EngineFuture<'a, Vec<Record>>;

    /// Number of records held.
    fn record_count(&self) -> EngineFuture<'_, usize>;

    /// Stop accepting records.
    fn kill(&self) -> EngineFuture<'_, ()>;
}
