//! Fundamental types for dave.
//!
//! This crate defines the types shared across every other crate in the workspace:
//! the work-stamped [`Record`], the PoW [`Challenge`] and [`Solution`], key
//! material and millisecond timestamps.

pub mod error;
pub mod hash;
pub mod keys;
pub mod record;
pub mod time;

pub use error::TypesError;
pub use hash::{Salt, Work};
pub use keys::{KeyPair, PrivateKey, PublicKey, Signature};
pub use record::{batch_key, Challenge, Record, Solution};
pub use time::Timestamp;
