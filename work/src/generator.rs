//! PoW search.

use dave_crypto::blake2b_256_multi;
use dave_types::{Challenge, Salt, Solution, Work};

use crate::validator::meets_difficulty;

/// Candidates tried between two checks of the stop condition.
pub const BATCH_SIZE: u64 = 4096;

/// Hash of the challenge input and time. Computed once per search; each
/// candidate then costs a single 64-byte hash.
pub fn work_load(challenge: &Challenge) -> [u8; 32] {
    blake2b_256_multi(&[&challenge.input, &challenge.time.to_le_bytes()])
}

pub(crate) fn work_from_load(load: &[u8; 32], salt: &Salt) -> Work {
    Work::new(blake2b_256_multi(&[salt.as_bytes(), load]))
}

/// Find the first salt (in counter order) whose work meets `difficulty`.
///
/// Deterministic for a given challenge. Runs until a solution is found;
/// callers that need a deadline use [`search_range`] or the pool.
pub fn search(challenge: &Challenge, difficulty: u8) -> Solution {
    let load = work_load(challenge);
    let mut counter: u64 = 0;
    loop {
        let salt = Salt::from_counter(counter);
        let work = work_from_load(&load, &salt);
        if meets_difficulty(&work, difficulty) {
            return Solution { work, salt };
        }
        counter = counter.wrapping_add(1);
    }
}

/// Search the candidates `start, start + stride, start + 2 * stride, …`.
///
/// `should_stop` is polled every [`BATCH_SIZE`] candidates; returns `None`
/// once it reports true.
pub fn search_range<F>(
    challenge: &Challenge,
    difficulty: u8,
    start: u64,
    stride: u64,
    should_stop: F,
) -> Option<Solution>
where
    F: Fn() -> bool,
{
    scan(&work_load(challenge), difficulty, start, stride, should_stop)
}

pub(crate) fn scan<F>(
    load: &[u8; 32],
    difficulty: u8,
    start: u64,
    stride: u64,
    should_stop: F,
) -> Option<Solution>
where
    F: Fn() -> bool,
{
    let stride = stride.max(1);
    let mut counter = start;
    loop {
        if should_stop() {
            return None;
        }
        for _ in 0..BATCH_SIZE {
            let salt = Salt::from_counter(counter);
            let work = work_from_load(load, &salt);
            if meets_difficulty(&work, difficulty) {
                return Some(Solution { work, salt });
            }
            counter = counter.wrapping_add(stride);
        }
    }
}
