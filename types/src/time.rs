//! Millisecond timestamps carried by records.
//!
//! Records are timestamped in Unix epoch milliseconds (UTC). Submitters stamp
//! records slightly in the past so that verifiers with a modestly skewed
//! clock still accept them.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::time::{Duration, SystemTime, UNIX_EPOCH};

/// A Unix timestamp in milliseconds since epoch (UTC).
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct Timestamp(u64);

impl Timestamp {
    /// The epoch (time zero).
    pub const EPOCH: Self = Self(0);

    pub fn from_millis(millis: u64) -> Self {
        Self(millis)
    }

    /// Get the current system time as a `Timestamp`.
    pub fn now() -> Self {
        let millis = SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .unwrap_or_default()
            .as_millis();
        Self(millis as u64)
    }

    pub fn as_millis(&self) -> u64 {
        self.0
    }

    pub fn to_le_bytes(self) -> [u8; 8] {
        self.0.to_le_bytes()
    }

    /// This timestamp moved `margin` into the past, saturating at the epoch.
    pub fn saturating_sub(self, margin: Duration) -> Self {
        Self(self.0.saturating_sub(margin.as_millis() as u64))
    }

    /// This timestamp moved `delta` into the future.
    pub fn saturating_add(self, delta: Duration) -> Self {
        Self(self.0.saturating_add(delta.as_millis() as u64))
    }

    /// Time elapsed between this timestamp and `now` (zero if `now` is earlier).
    pub fn elapsed_since(&self, now: Timestamp) -> Duration {
        Duration::from_millis(now.0.saturating_sub(self.0))
    }
}

impl fmt::Display for Timestamp {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}ms", self.0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn saturating_sub_moves_into_the_past() {
        let t = Timestamp::from_millis(1_000);
        assert_eq!(t.saturating_sub(Duration::from_millis(100)).as_millis(), 900);
        assert_eq!(
            Timestamp::from_millis(50).saturating_sub(Duration::from_millis(100)),
            Timestamp::EPOCH
        );
    }

    #[test]
    fn elapsed_since_never_negative() {
        let t = Timestamp::from_millis(1_000);
        assert_eq!(t.elapsed_since(Timestamp::from_millis(1_250)), Duration::from_millis(250));
        assert_eq!(t.elapsed_since(Timestamp::from_millis(10)), Duration::ZERO);
    }

    #[test]
    fn now_is_after_2020() {
        assert!(Timestamp::now().as_millis() > 1_577_836_800_000);
    }
}
