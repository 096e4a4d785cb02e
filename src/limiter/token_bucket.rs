//! Token-bucket admission gate.

use std::sync::{Arc, Mutex};
use std::time::Duration;

use tokio::time::{interval, sleep, Instant};
use tokio_util::sync::CancellationToken;

use super::LimiterState;
use crate::config::{
    TokenBucketConfig, ADMISSION_POLL_CAP, ADMISSION_POLL_FLOOR, MIN_REFILL_RATE, REFILL_TICK,
};
use crate::error_handling::ThrottleError;
use crate::utils::lock_unpoisoned;

struct Bucket {
    tokens: f64,
    refill_rate: f64,
    last_refill: Instant,
}

impl Bucket {
    /// Credits tokens for the wall-clock time elapsed since the last refill,
    /// capped at `capacity`. Called eagerly on every consume so accounting is
    /// correct regardless of the background tick cadence.
    fn refill(&mut self, capacity: u32) {
        let now = Instant::now();
        let elapsed = now.duration_since(self.last_refill);
        self.tokens = (self.tokens + elapsed.as_secs_f64() * self.refill_rate).min(f64::from(capacity));
        self.last_refill = now;
    }
}

/// Burst-tolerant admission gate with a bounded average rate.
///
/// The bucket starts full (bursts up to `capacity` are admitted immediately)
/// and refills continuously at `refill_rate` tokens per second. A background
/// task also refills once per second, bounding drift between bursts.
///
/// Invariant: `0 <= tokens <= capacity` at every observation point.
///
/// Admission waits carry no cancellation or deadline of their own; callers
/// that need a bound can wrap [`acquire`](Self::acquire) in
/// `tokio::time::timeout`.
pub struct TokenBucketLimiter {
    capacity: u32,
    bucket: Arc<Mutex<Bucket>>,
    shutdown: CancellationToken,
}

impl TokenBucketLimiter {
    /// Creates a limiter and starts its background refill task.
    ///
    /// # Errors
    ///
    /// Returns [`ThrottleError::InvalidConfig`] if `capacity` is zero or
    /// `refill_rate` is not positive and finite.
    pub fn new(config: TokenBucketConfig) -> Result<Self, ThrottleError> {
        if config.capacity == 0 {
            return Err(ThrottleError::InvalidConfig(
                "token bucket capacity must be > 0".to_string(),
            ));
        }
        if config.refill_rate <= 0.0 || !config.refill_rate.is_finite() {
            return Err(ThrottleError::InvalidConfig(
                "token bucket refill rate must be positive and finite".to_string(),
            ));
        }

        let bucket = Arc::new(Mutex::new(Bucket {
            tokens: f64::from(config.capacity),
            refill_rate: config.refill_rate,
            last_refill: Instant::now(),
        }));
        let shutdown = CancellationToken::new();

        let bucket_for_task = Arc::clone(&bucket);
        let shutdown_for_task = shutdown.clone();
        let capacity = config.capacity;
        tokio::spawn(async move {
            let mut ticker = interval(REFILL_TICK);
            loop {
                tokio::select! {
                    _ = ticker.tick() => {
                        lock_unpoisoned(&bucket_for_task).refill(capacity);
                    }
                    _ = shutdown_for_task.cancelled() => {
                        log::debug!("token bucket refill task shutting down");
                        break;
                    }
                }
            }
        });

        Ok(TokenBucketLimiter {
            capacity: config.capacity,
            bucket,
            shutdown,
        })
    }

    /// Attempts to consume `cost` tokens without waiting.
    ///
    /// Refills from elapsed time first, then tests availability. Returns
    /// false with no side effect when tokens are short. A `cost` larger than
    /// the capacity can never succeed; it is refused here and rejected with
    /// an error by [`acquire`](Self::acquire).
    pub fn try_consume(&self, cost: u32) -> bool {
        if cost > self.capacity {
            log::warn!(
                "admission cost {} exceeds bucket capacity {} and can never be granted",
                cost,
                self.capacity
            );
            return false;
        }
        let mut bucket = lock_unpoisoned(&self.bucket);
        bucket.refill(self.capacity);
        if bucket.tokens >= f64::from(cost) {
            bucket.tokens -= f64::from(cost);
            true
        } else {
            false
        }
    }

    /// Waits until `cost` tokens are available, then consumes them.
    ///
    /// Polls with a sleep proportional to the current shortfall
    /// (`(cost - tokens) / refill_rate`), clamped to [10ms, 1s] per
    /// iteration so waiters notice refill-rate changes promptly.
    ///
    /// # Errors
    ///
    /// Returns [`ThrottleError::CostExceedsCapacity`] when `cost` exceeds the
    /// bucket capacity, since such a wait would never end.
    pub async fn acquire(&self, cost: u32) -> Result<(), ThrottleError> {
        if cost > self.capacity {
            return Err(ThrottleError::CostExceedsCapacity {
                cost,
                capacity: self.capacity,
            });
        }
        loop {
            let wait = {
                let mut bucket = lock_unpoisoned(&self.bucket);
                bucket.refill(self.capacity);
                if bucket.tokens >= f64::from(cost) {
                    bucket.tokens -= f64::from(cost);
                    return Ok(());
                }
                let shortfall = f64::from(cost) - bucket.tokens;
                Duration::from_secs_f64(shortfall / bucket.refill_rate)
            };
            sleep(wait.clamp(ADMISSION_POLL_FLOOR, ADMISSION_POLL_CAP)).await;
        }
    }

    /// Current state snapshot (refilled before reading).
    pub fn state(&self) -> LimiterState {
        let mut bucket = lock_unpoisoned(&self.bucket);
        bucket.refill(self.capacity);
        LimiterState::TokenBucket {
            available: bucket.tokens.floor() as u32,
            capacity: self.capacity,
            refill_rate: bucket.refill_rate,
        }
    }

    /// Replaces the refill rate. Tokens accrued at the old rate are settled
    /// first, so the change only affects future accrual.
    pub fn update_refill_rate(&self, refill_rate: f64) {
        if refill_rate <= 0.0 || !refill_rate.is_finite() {
            log::warn!("ignoring invalid refill rate update: {refill_rate}");
            return;
        }
        let mut bucket = lock_unpoisoned(&self.bucket);
        bucket.refill(self.capacity);
        bucket.refill_rate = refill_rate;
    }

    /// Halves the refill rate with a floor of 1 token/s, returning
    /// `(old, new)`. Used by the coordinator for proactive self-throttling
    /// when a provider reports low remaining quota.
    pub fn halve_refill_rate(&self) -> (f64, f64) {
        let mut bucket = lock_unpoisoned(&self.bucket);
        bucket.refill(self.capacity);
        let old = bucket.refill_rate;
        let new = (old / 2.0).max(MIN_REFILL_RATE);
        bucket.refill_rate = new;
        (old, new)
    }

    /// Stops the background refill task. Idempotent; also fired on drop.
    pub fn release(&self) {
        self.shutdown.cancel();
    }
}

impl Drop for TokenBucketLimiter {
    fn drop(&mut self) {
        self.shutdown.cancel();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tokio::time::advance;

    fn bucket(capacity: u32, refill_rate: f64) -> TokenBucketLimiter {
        TokenBucketLimiter::new(TokenBucketConfig {
            capacity,
            refill_rate,
        })
        .expect("valid config")
    }

    #[tokio::test(start_paused = true)]
    async fn test_burst_then_starve_then_refill() {
        let limiter = bucket(10, 2.0);

        // Full bucket admits a burst of exactly the capacity
        assert!(limiter.try_consume(10));
        assert!(!limiter.try_consume(1));

        // 2 tokens/s for 2s
        advance(Duration::from_secs(2)).await;
        assert!(limiter.try_consume(1));
    }

    #[tokio::test(start_paused = true)]
    async fn test_tokens_never_exceed_capacity() {
        let limiter = bucket(5, 10.0);
        advance(Duration::from_secs(100)).await;
        match limiter.state() {
            LimiterState::TokenBucket {
                available, capacity, ..
            } => {
                assert_eq!(available, 5);
                assert_eq!(capacity, 5);
            }
            other => panic!("unexpected state: {other:?}"),
        }
    }

    #[tokio::test(start_paused = true)]
    async fn test_acquire_waits_for_shortfall() {
        let limiter = bucket(1, 1.0);
        assert!(limiter.try_consume(1));

        let start = Instant::now();
        limiter.acquire(1).await.expect("cost within capacity");
        let waited = start.elapsed();
        assert!(
            waited >= Duration::from_millis(900),
            "expected ~1s wait, got {waited:?}"
        );
    }

    #[tokio::test]
    async fn test_cost_above_capacity_is_rejected() {
        let limiter = bucket(10, 2.0);
        assert!(!limiter.try_consume(11));
        match limiter.acquire(11).await {
            Err(ThrottleError::CostExceedsCapacity { cost, capacity }) => {
                assert_eq!(cost, 11);
                assert_eq!(capacity, 10);
            }
            other => panic!("expected CostExceedsCapacity, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn test_invalid_config_is_rejected() {
        let zero_capacity = TokenBucketLimiter::new(TokenBucketConfig {
            capacity: 0,
            refill_rate: 1.0,
        });
        assert!(matches!(
            zero_capacity,
            Err(ThrottleError::InvalidConfig(_))
        ));

        let zero_rate = TokenBucketLimiter::new(TokenBucketConfig {
            capacity: 1,
            refill_rate: 0.0,
        });
        assert!(matches!(zero_rate, Err(ThrottleError::InvalidConfig(_))));
    }

    #[tokio::test(start_paused = true)]
    async fn test_halve_refill_rate_respects_floor() {
        let limiter = bucket(10, 3.0);
        assert_eq!(limiter.halve_refill_rate(), (3.0, 1.5));
        assert_eq!(limiter.halve_refill_rate(), (1.5, 1.0));
        // Floor reached, further halving holds at 1 token/s
        assert_eq!(limiter.halve_refill_rate(), (1.0, 1.0));
    }

    #[tokio::test(start_paused = true)]
    async fn test_update_refill_rate_changes_future_accrual() {
        let limiter = bucket(10, 1.0);
        assert!(limiter.try_consume(10));

        limiter.update_refill_rate(100.0);
        advance(Duration::from_millis(100)).await;
        // 100 tokens/s for 100ms
        assert!(limiter.try_consume(10));
    }

    #[tokio::test]
    async fn test_release_is_idempotent() {
        let limiter = bucket(10, 2.0);
        limiter.release();
        limiter.release();
        // Accounting still works after the background task is gone
        assert!(limiter.try_consume(1));
    }
}
