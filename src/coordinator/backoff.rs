//! Exponential backoff with jitter for the 429 retry path.

use std::time::Duration;

use crate::config::BACKOFF_JITTER_FRACTION;

/// Delay before retry number `retry_count` (zero-based) when the server gave
/// no `retry-after` hint: `min(cap, base * 2^retry_count)` plus up to 10%
/// random jitter so callers rejected together don't retry together.
pub(crate) fn backoff_delay(retry_count: u32, base: Duration, cap: Duration) -> Duration {
    let exponential = base.saturating_mul(1u32 << retry_count.min(31));
    let capped = exponential.min(cap);
    let jitter = capped.mul_f64(rand::random::<f64>() * BACKOFF_JITTER_FRACTION);
    capped + jitter
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{DEFAULT_BACKOFF_BASE, DEFAULT_BACKOFF_CAP};

    fn delay(retry_count: u32) -> Duration {
        backoff_delay(retry_count, DEFAULT_BACKOFF_BASE, DEFAULT_BACKOFF_CAP)
    }

    #[test]
    fn test_first_retry_starts_at_base() {
        let d = delay(0);
        assert!(d >= Duration::from_millis(1000));
        assert!(d < Duration::from_millis(1100), "jitter must stay under 10%");
    }

    #[test]
    fn test_delays_double_per_retry() {
        for retry in 0..5 {
            let expected_ms = 1000u64 << retry;
            let d = delay(retry);
            assert!(d >= Duration::from_millis(expected_ms));
            assert!(d < Duration::from_millis(expected_ms + expected_ms / 10 + 1));
        }
    }

    #[test]
    fn test_cap_applies_before_jitter() {
        // 2^10 seconds is far past the cap; jitter is relative to the cap
        let d = delay(10);
        assert!(d >= Duration::from_millis(60_000));
        assert!(d < Duration::from_millis(66_001));
    }

    #[test]
    fn test_large_retry_counts_do_not_overflow() {
        let d = backoff_delay(u32::MAX, DEFAULT_BACKOFF_BASE, DEFAULT_BACKOFF_CAP);
        assert!(d <= Duration::from_millis(66_000));
    }
}
