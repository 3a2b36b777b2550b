//! Proof-of-work digest and salt types.

use serde::{Deserialize, Serialize};
use std::fmt;

use crate::TypesError;

/// A 32-byte work digest, the proof attached to a [`crate::Record`].
#[derive(Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct Work([u8; 32]);

impl Work {
    pub const ZERO: Self = Self([0u8; 32]);

    pub fn new(bytes: [u8; 32]) -> Self {
        Self(bytes)
    }

    pub fn from_slice(bytes: &[u8]) -> Result<Self, TypesError> {
        fixed::<32>("work", bytes).map(Self)
    }

    pub fn as_bytes(&self) -> &[u8; 32] {
        &self.0
    }

    /// Number of leading zero bits, counted from the first byte.
    pub fn leading_zero_bits(&self) -> u32 {
        let mut count = 0;
        for byte in self.0 {
            if byte == 0 {
                count += 8;
            } else {
                count += byte.leading_zeros();
                break;
            }
        }
        count
    }
}

/// A 32-byte salt: the nonce discovered by the work search.
#[derive(Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Salt([u8; 32]);

impl Salt {
    pub fn new(bytes: [u8; 32]) -> Self {
        Self(bytes)
    }

    /// The salt tried as candidate `n` by the search: `n` little-endian in
    /// the first eight bytes, zeros after.
    pub fn from_counter(n: u64) -> Self {
        let mut bytes = [0u8; 32];
        bytes[..8].copy_from_slice(&n.to_le_bytes());
        Self(bytes)
    }

    pub fn from_slice(bytes: &[u8]) -> Result<Self, TypesError> {
        fixed::<32>("salt", bytes).map(Self)
    }

    pub fn as_bytes(&self) -> &[u8; 32] {
        &self.0
    }
}

pub(crate) fn fixed<const N: usize>(what: &'static str, bytes: &[u8]) -> Result<[u8; N], TypesError> {
    bytes.try_into().map_err(|_| TypesError::InvalidLength {
        what,
        expected: N,
        actual: bytes.len(),
    })
}

impl fmt::Debug for Work {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Work({}\u{2026})", hex::encode(&self.0[..4]))
    }
}

impl fmt::Display for Work {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", hex::encode(&self.0))
    }
}

impl fmt::Debug for Salt {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Salt({}\u{2026})", hex::encode(&self.0[..4]))
    }
}

impl fmt::Display for Salt {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", hex::encode(&self.0))
    }
}

// Inline hex encoding to keep this crate free of encoding dependencies.
mod hex {
    pub fn encode(bytes: &[u8]) -> String {
        bytes.iter().map(|b| format!("{:02x}", b)).collect()
    }
}
