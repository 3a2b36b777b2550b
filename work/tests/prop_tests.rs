use proptest::prelude::*;

use dave_types::{Challenge, Salt, Timestamp, Work};
use dave_work::{compute_work, meets_difficulty, search, validate_work, CancelFlag, WorkPool};

proptest! {
    #![proptest_config(ProptestConfig::with_cases(64))]

    /// Searched work always passes its own validation.
    #[test]
    fn searched_work_always_valid(
        input in prop::collection::vec(any::<u8>(), 0..64),
        time in any::<u64>(),
        difficulty in 0u8..10,
    ) {
        let challenge = Challenge::new(input, Timestamp::from_millis(time));
        let solution = search(&challenge, difficulty);
        prop_assert!(solution.work.leading_zero_bits() >= u32::from(difficulty));
        prop_assert!(validate_work(&challenge, &solution.salt, &solution.work, difficulty));
    }

    /// Zero difficulty accepts any correctly computed work.
    #[test]
    fn zero_difficulty_always_passes(
        input in prop::collection::vec(any::<u8>(), 0..64),
        counter in any::<u64>(),
    ) {
        let challenge = Challenge::new(input, Timestamp::EPOCH);
        let salt = Salt::from_counter(counter);
        let work = compute_work(&challenge, &salt);
        prop_assert!(validate_work(&challenge, &salt, &work, 0));
    }

    /// Lower difficulty is easier to meet: if valid at D, then valid at D-1.
    #[test]
    fn lower_difficulty_is_easier(
        bytes in prop::array::uniform32(0u8..),
        difficulty in 1u8..=255,
    ) {
        let work = Work::new(bytes);
        if meets_difficulty(&work, difficulty) {
            prop_assert!(meets_difficulty(&work, difficulty - 1));
        }
    }

    /// Raced solutions satisfy the same predicate as the sequential search.
    #[test]
    fn raced_work_always_valid(
        input in prop::collection::vec(any::<u8>(), 0..32),
        difficulty in 0u8..8,
    ) {
        let pool = WorkPool::with_widths(1, 3).unwrap();
        let challenge = Challenge::new(input, Timestamp::from_millis(1));
        let solution = pool.race(&challenge, difficulty, &CancelFlag::new()).unwrap();
        prop_assert!(validate_work(&challenge, &solution.salt, &solution.work, difficulty));
    }
}
