//! Utility helpers for working with epoch-millisecond timestamps.
//!
//! Cache entries and sync frontiers are stamped in milliseconds since the
//! Unix epoch so that the same value can be compared against remote rows
//! and serialized into persisted envelopes without precision loss.

use time::OffsetDateTime;

/// Current wall-clock time in milliseconds since the Unix epoch.
pub fn now_millis() -> i64 {
    (OffsetDateTime::now_utc().unix_timestamp_nanos() / 1_000_000) as i64
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn now_millis_is_past_2020() {
        // 2020-01-01T00:00:00Z in epoch millis
        assert!(now_millis() > 1_577_836_800_000);
    }

    #[test]
    fn now_millis_is_monotonic_enough() {
        let a = now_millis();
        let b = now_millis();
        assert!(b >= a);
    }
}
