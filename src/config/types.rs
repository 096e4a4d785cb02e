//! Construction-time configuration types.

use std::time::Duration;

use super::{DEFAULT_BACKOFF_BASE, DEFAULT_BACKOFF_CAP, DEFAULT_RETRY_CEILING};

/// Configuration for a token-bucket limiter.
///
/// `capacity` bounds short-term bursts; `refill_rate` bounds the long-run
/// average throughput. Both must be positive.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct TokenBucketConfig {
    /// Maximum tokens the bucket can hold (burst ceiling). Must be > 0.
    pub capacity: u32,
    /// Tokens replenished per second. Must be > 0 and finite.
    pub refill_rate: f64,
}

/// Configuration for a sliding-window limiter.
///
/// Admits at most `max_requests` events in any trailing `window` interval.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SlidingWindowConfig {
    /// Length of the rolling window. Must be non-zero.
    pub window: Duration,
    /// Maximum admissions inside the window. Zero is accepted but admission
    /// can then never succeed.
    pub max_requests: usize,
}

/// Which admission policy to register for a provider.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum LimiterConfig {
    /// Continuous-refill token bucket (burst-tolerant average rate).
    TokenBucket(TokenBucketConfig),
    /// Exact rolling-window counter (discrete request count per interval).
    SlidingWindow(SlidingWindowConfig),
}

/// Retry and backoff tuning for a coordinator instance.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CoordinatorConfig {
    /// Maximum retries after a 429 before the call fails terminally.
    pub max_retries: u32,
    /// Base delay for exponential backoff (doubles each retry).
    pub backoff_base: Duration,
    /// Cap on a single backoff delay, applied before jitter.
    pub backoff_cap: Duration,
}

impl Default for CoordinatorConfig {
    fn default() -> Self {
        CoordinatorConfig {
            max_retries: DEFAULT_RETRY_CEILING,
            backoff_base: DEFAULT_BACKOFF_BASE,
            backoff_cap: DEFAULT_BACKOFF_CAP,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_coordinator_config_defaults() {
        let config = CoordinatorConfig::default();
        assert_eq!(config.max_retries, 5);
        assert_eq!(config.backoff_base, Duration::from_millis(1000));
        assert_eq!(config.backoff_cap, Duration::from_millis(60_000));
    }
}
