//! General time utility functions

use chrono;
use std::time::Duration;

/// Number of nanoseconds in a second
pub const NANOS_PER_SECOND: i64 = 1_000_000_000;

/// Convert a chrono duration into a number of seconds, or `None` if overflow
pub fn duration_to_seconds(duration: chrono::Duration) -> Option<f64> {
    duration
        .num_nanoseconds()
        .map(|ns| ns as f64 / NANOS_PER_SECOND as f64)
}

/// Time elapsed between `since` and `now`.
///
/// Monotonic timestamps should never go backwards, but if `since` is later than `now` zero is
/// returned rather than underflowing.
pub fn elapsed_since(now: Duration, since: Duration) -> Duration {
    now.checked_sub(since).unwrap_or_default()
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn test_duration_to_seconds() {
        assert_eq!(
            duration_to_seconds(chrono::Duration::milliseconds(1500)),
            Some(1.5)
        );
        assert_eq!(duration_to_seconds(chrono::Duration::zero()), Some(0.0));
    }

    fn millis(ms: u64) -> Duration {
        Duration::from_millis(ms)
    }

    #[test]
    fn test_elapsed_since_saturates() {
        assert_eq!(elapsed_since(millis(300), millis(100)), millis(200));
        assert_eq!(elapsed_since(millis(100), millis(300)), Duration::ZERO);
    }
}
