//! Records and the proof-of-work challenge they are stamped with.

use serde::{Deserialize, Serialize};

use crate::{PublicKey, Salt, Signature, Timestamp, Work};

/// The signed, work-stamped key/value unit submitted to the store.
///
/// `work` must equal the digest of `(key, value, time, salt)` and carry at
/// least the network's difficulty in leading zero bits. `signature` covers
/// the `work` bytes, binding the proof to the owner's identity.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Record {
    pub key: String,
    pub value: Vec<u8>,
    pub time: Timestamp,
    pub salt: Salt,
    pub work: Work,
    pub public_key: PublicKey,
    pub signature: Signature,
}

impl Record {
    /// The bytes the work search runs over for this record's key and value.
    pub fn challenge(&self) -> Challenge {
        Challenge::for_entry(&self.key, &self.value, self.time)
    }
}

/// The material a work search runs over: input bytes plus the record time.
///
/// Created once per record and consumed by exactly one search.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Challenge {
    pub input: Vec<u8>,
    pub time: Timestamp,
}

impl Challenge {
    pub fn new(input: Vec<u8>, time: Timestamp) -> Self {
        Self { input, time }
    }

    /// Build the challenge for a key/value entry.
    ///
    /// The key is length-prefixed (`u32` little-endian) so that no two
    /// distinct `(key, value)` pairs share an input.
    pub fn for_entry(key: &str, value: &[u8], time: Timestamp) -> Self {
        let mut input = Vec::with_capacity(4 + key.len() + value.len());
        input.extend_from_slice(&(key.len() as u32).to_le_bytes());
        input.extend_from_slice(key.as_bytes());
        input.extend_from_slice(value);
        Self { input, time }
    }
}

/// A solved challenge: the qualifying salt and the resulting work digest.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Solution {
    pub work: Work,
    pub salt: Salt,
}

/// Key used for iteration `index` of a batch over `base`.
///
/// Iteration 0 keeps the base key; later iterations append `_<index>`.
pub fn batch_key(base: &str, index: usize) -> String {
    if index == 0 {
        base.to_string()
    } else {
        format!("{base}_{index}")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn batch_keys_are_suffixed_after_the_first() {
        let keys: Vec<_> = (0..4).map(|i| batch_key("k", i)).collect();
        assert_eq!(keys, vec!["k", "k_1", "k_2", "k_3"]);
    }

    #[test]
    fn entry_input_is_length_prefixed() {
        let a = Challenge::for_entry("ab", b"c", Timestamp::EPOCH);
        let b = Challenge::for_entry("a", b"bc", Timestamp::EPOCH);
        assert_ne!(a.input, b.input);
        assert_eq!(&a.input[..4], &2u32.to_le_bytes());
    }

    #[test]
    fn record_challenge_matches_entry_challenge() {
        let record = Record {
            key: "key".into(),
            value: b"value".to_vec(),
            time: Timestamp::from_millis(42),
            salt: Salt::default(),
            work: Work::ZERO,
            public_key: PublicKey([0u8; 32]),
            signature: Signature([0u8; 64]),
        };
        assert_eq!(
            record.challenge(),
            Challenge::for_entry("key", b"value", Timestamp::from_millis(42))
        );
    }
}
