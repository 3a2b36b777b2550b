//! PoW validation.

use dave_types::{Challenge, Record, Salt, Work};

use crate::generator::{work_from_load, work_load};

/// Whether `work` has at least `difficulty` leading zero bits.
pub fn meets_difficulty(work: &Work, difficulty: u8) -> bool {
    work.leading_zero_bits() >= u32::from(difficulty)
}

/// Recompute the work digest for a challenge and salt.
pub fn compute_work(challenge: &Challenge, salt: &Salt) -> Work {
    work_from_load(&work_load(challenge), salt)
}

/// Validate that `work` is the digest of `(challenge, salt)` and meets `difficulty`.
pub fn validate_work(challenge: &Challenge, salt: &Salt, work: &Work, difficulty: u8) -> bool {
    compute_work(challenge, salt) == *work && meets_difficulty(work, difficulty)
}

/// Validate the proof carried by a record. The signature is checked separately.
pub fn validate_record(record: &Record, difficulty: u8) -> bool {
    validate_work(&record.challenge(), &record.salt, &record.work, difficulty)
}
