//! Proof-of-work for dave records.
//!
//! A record is accepted only if `blake2b(salt || blake2b(input || time))`
//! starts with at least `difficulty` zero bits. Finding the salt is a CPU
//! search with no upper bound on its duration; checking it is two hashes.
//!
//! The [`WorkPool`] runs searches on dedicated threads in one of two modes:
//! queued (one worker per challenge, for throughput) or raced (every core on
//! the same challenge, first answer wins, for latency).

pub mod cancel;
pub mod error;
pub mod generator;
pub mod pool;
pub mod validator;

pub use cancel::CancelFlag;
pub use error::WorkError;
pub use generator::{search, search_range, work_load, BATCH_SIZE};
pub use pool::{available_cores, default_pool_size, DispatchMode, PendingSolution, WorkPool};
pub use validator::{compute_work, meets_difficulty, validate_record, validate_work};
