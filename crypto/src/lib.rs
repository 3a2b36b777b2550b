//! Cryptographic primitives for dave.
//!
//! - **Ed25519** for signing record work and verifying owners
//! - **Blake2b-256** for the proof-of-work digest
//! - Key files in the standard 64-byte Ed25519 layout (`seed || public`)

pub mod error;
pub mod hash;
pub mod keyfile;
pub mod keys;
pub mod sign;

pub use error::CryptoError;
pub use hash::{blake2b_256, blake2b_256_multi};
pub use keyfile::{read_key_file, write_key_file, KEY_FILE_LEN};
pub use keys::{generate_keypair, keypair_from_private, keypair_from_seed, public_from_private};
pub use sign::{sign_message, sign_work, verify_record_signature, verify_signature};
