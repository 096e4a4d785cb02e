//! Admission-control limiters.
//!
//! Two policies gate the start of work (never work already in flight):
//! - [`TokenBucketLimiter`]: continuous refill, bursts up to a capacity,
//!   bounded long-run average rate.
//! - [`SlidingWindowLimiter`]: exact event count per trailing interval.
//!
//! Neither promises FIFO among distinct concurrent waiters — coarse polling
//! means near-simultaneous waiters can be admitted out of arrival order,
//! which is accepted. The [`PriorityRequestQueue`](crate::queue::PriorityRequestQueue)
//! is the ordering tool.

mod sliding_window;
mod token_bucket;

use std::sync::Arc;

use serde::Serialize;

use crate::config::LimiterConfig;
use crate::error_handling::ThrottleError;

pub use sliding_window::SlidingWindowLimiter;
pub use token_bucket::TokenBucketLimiter;

/// Observable limiter state, serializable for the host application's status
/// surfaces.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum LimiterState {
    /// Token-bucket snapshot.
    TokenBucket {
        /// Whole tokens currently available (`floor(tokens)`).
        available: u32,
        /// Burst ceiling.
        capacity: u32,
        /// Current refill rate in tokens per second (may have been adapted
        /// downward since construction).
        refill_rate: f64,
    },
    /// Sliding-window snapshot.
    SlidingWindow {
        /// Admissions currently inside the window (post-purge).
        in_window: usize,
        /// Maximum admissions per window.
        max_requests: usize,
        /// Window length in milliseconds.
        window_ms: u64,
    },
}

/// A registered limiter, variant-agnostic at the call site.
///
/// One instance exists per provider name, owned by the coordinator that
/// registered it; cloning shares the same underlying limiter.
#[derive(Clone)]
pub enum ProviderLimiter {
    /// Burst-tolerant average-rate policy.
    TokenBucket(Arc<TokenBucketLimiter>),
    /// Discrete request-count-per-interval policy.
    SlidingWindow(Arc<SlidingWindowLimiter>),
}

impl ProviderLimiter {
    /// Builds the limiter variant described by `config`.
    pub fn from_config(config: LimiterConfig) -> Result<Self, ThrottleError> {
        match config {
            LimiterConfig::TokenBucket(cfg) => Ok(ProviderLimiter::TokenBucket(Arc::new(
                TokenBucketLimiter::new(cfg)?,
            ))),
            LimiterConfig::SlidingWindow(cfg) => Ok(ProviderLimiter::SlidingWindow(Arc::new(
                SlidingWindowLimiter::new(cfg)?,
            ))),
        }
    }

    /// Blocks until one unit of work is admitted.
    pub async fn admit(&self) -> Result<(), ThrottleError> {
        match self {
            ProviderLimiter::TokenBucket(bucket) => bucket.acquire(1).await,
            ProviderLimiter::SlidingWindow(window) => {
                window.acquire().await;
                Ok(())
            }
        }
    }

    /// Current state snapshot.
    pub fn state(&self) -> LimiterState {
        match self {
            ProviderLimiter::TokenBucket(bucket) => bucket.state(),
            ProviderLimiter::SlidingWindow(window) => window.state(),
        }
    }

    /// Stops the limiter's background task. Idempotent.
    pub fn release(&self) {
        match self {
            ProviderLimiter::TokenBucket(bucket) => bucket.release(),
            ProviderLimiter::SlidingWindow(window) => window.release(),
        }
    }

    /// The token bucket behind this handle, when that is the variant.
    /// Adaptive refill-rate tuning only applies to token buckets.
    pub(crate) fn as_token_bucket(&self) -> Option<&Arc<TokenBucketLimiter>> {
        match self {
            ProviderLimiter::TokenBucket(bucket) => Some(bucket),
            ProviderLimiter::SlidingWindow(_) => None,
        }
    }
}
