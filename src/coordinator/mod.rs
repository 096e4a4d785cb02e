//! Adaptive limiter coordination.
//!
//! One coordinator instance owns everything per-provider: the registered
//! limiter, the latest quota feedback, and the 429 retry counter. All of it
//! lives in instance fields (no globals), so tests and embedders can build
//! independent, isolated coordinators. The network call itself is an injected
//! [`ProviderTransport`].
//!
//! Per logical call: PendingAdmission -> InFlight -> Succeeded, or
//! RateLimited (loops back to PendingAdmission, bounded by the retry
//! ceiling), or Failed (terminal, propagated unchanged).

mod backoff;
mod headers;

use std::collections::HashMap;
use std::future::Future;
use std::sync::{Arc, Mutex};

use chrono::{DateTime, Utc};
use serde::Serialize;
use serde_json::Value;
use tokio::time::sleep;

use crate::config::{CoordinatorConfig, LimiterConfig, QUOTA_PRESSURE_THRESHOLD};
use crate::error_handling::{DispatchOutcome, ThrottleError, ThrottleStats};
use crate::limiter::{LimiterState, ProviderLimiter};
use crate::queue::{Priority, PriorityRequestQueue, QueueStats};
use crate::transport::{ProviderResponse, ProviderTransport};
use crate::utils::lock_unpoisoned;

use backoff::backoff_delay;
use headers::{parse_limit_state, retry_after_delay};

/// Quota feedback derived from the most recent successful response's
/// headers. One per provider, overwritten on each success.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ProviderLimitState {
    /// Total request quota for the provider's current window.
    pub limit: u64,
    /// Remaining request quota.
    pub remaining: u64,
    /// When the quota resets, when the provider said so in a parseable form.
    pub reset_at: Option<DateTime<Utc>>,
    /// When this snapshot was taken.
    pub updated_at: DateTime<Utc>,
}

impl ProviderLimitState {
    /// Remaining quota as a fraction of the limit. A zero limit reads as
    /// fully available rather than dividing by zero.
    pub fn remaining_fraction(&self) -> f64 {
        if self.limit == 0 {
            1.0
        } else {
            self.remaining as f64 / self.limit as f64
        }
    }
}

/// Uniform throttled call path per provider: blocking admission through the
/// registered limiter, dispatch via the injected transport, response-driven
/// self-tuning, and bounded retry on 429.
pub struct AdaptiveLimiterCoordinator {
    transport: Arc<dyn ProviderTransport>,
    config: CoordinatorConfig,
    limiters: Mutex<HashMap<String, ProviderLimiter>>,
    limit_states: Mutex<HashMap<String, ProviderLimitState>>,
    retry_counts: Mutex<HashMap<String, u32>>,
    queue: PriorityRequestQueue<Value>,
    stats: ThrottleStats,
}

impl AdaptiveLimiterCoordinator {
    /// Creates a coordinator with default retry/backoff tuning.
    pub fn new(transport: Arc<dyn ProviderTransport>) -> Self {
        Self::with_config(transport, CoordinatorConfig::default())
    }

    /// Creates a coordinator with explicit retry/backoff tuning.
    pub fn with_config(transport: Arc<dyn ProviderTransport>, config: CoordinatorConfig) -> Self {
        AdaptiveLimiterCoordinator {
            transport,
            config,
            limiters: Mutex::new(HashMap::new()),
            limit_states: Mutex::new(HashMap::new()),
            retry_counts: Mutex::new(HashMap::new()),
            queue: PriorityRequestQueue::new(),
            stats: ThrottleStats::new(),
        }
    }

    /// Registers (or replaces) the admission policy for a provider.
    /// A replaced limiter is released before it is dropped.
    ///
    /// # Errors
    ///
    /// Returns [`ThrottleError::InvalidConfig`] for out-of-range parameters.
    pub fn register(
        &self,
        provider: impl Into<String>,
        config: LimiterConfig,
    ) -> Result<(), ThrottleError> {
        let limiter = ProviderLimiter::from_config(config)?;
        let provider = provider.into();
        let mut limiters = lock_unpoisoned(&self.limiters);
        if let Some(old) = limiters.insert(provider.clone(), limiter) {
            old.release();
            log::debug!("replaced limiter for provider '{provider}'");
        }
        Ok(())
    }

    /// Performs one throttled call to `provider`.
    ///
    /// Providers without a registered limiter pass through unthrottled. 429
    /// rejections are retried with the server-requested delay when
    /// `retry-after` parses, otherwise with capped exponential backoff plus
    /// jitter, up to the configured ceiling. Every other failure propagates
    /// immediately as [`ThrottleError::Upstream`].
    ///
    /// Admission and backoff waits are unbounded; callers that need a
    /// deadline can wrap this call in `tokio::time::timeout`.
    ///
    /// # Errors
    ///
    /// [`ThrottleError::RateLimitExhausted`] after the retry ceiling,
    /// [`ThrottleError::Upstream`] for non-429 failures.
    pub async fn dispatch(
        &self,
        provider: &str,
        payload: &Value,
    ) -> Result<ProviderResponse, ThrottleError> {
        loop {
            let limiter = lock_unpoisoned(&self.limiters).get(provider).cloned();
            match &limiter {
                Some(limiter) => limiter.admit().await?,
                None => {
                    log::trace!("no limiter registered for provider '{provider}', passing through")
                }
            }

            match self.transport.execute(provider, payload).await {
                Ok(response) => {
                    self.stats.increment(DispatchOutcome::Success);
                    self.note_success(provider, &response.headers);
                    return Ok(response);
                }
                Err(error) if error.is_rate_limited() => {
                    self.stats.increment(DispatchOutcome::RateLimited);
                    let attempts = self.bump_retry(provider);
                    if attempts > self.config.max_retries {
                        self.stats.increment(DispatchOutcome::RetryExhausted);
                        // Clear the counter so a later call to this provider
                        // starts with a fresh retry budget
                        lock_unpoisoned(&self.retry_counts).remove(provider);
                        log::warn!(
                            "provider '{provider}' still rate limited after {attempts} attempts, giving up"
                        );
                        return Err(ThrottleError::RateLimitExhausted {
                            provider: provider.to_string(),
                            attempts,
                        });
                    }
                    let delay = match retry_after_delay(&error.headers) {
                        Some(server_delay) => server_delay,
                        None => backoff_delay(
                            attempts - 1,
                            self.config.backoff_base,
                            self.config.backoff_cap,
                        ),
                    };
                    log::warn!(
                        "provider '{provider}' answered 429 (retry {attempts}/{}), waiting {:?}",
                        self.config.max_retries,
                        delay
                    );
                    sleep(delay).await;
                }
                Err(error) => {
                    self.stats.increment(DispatchOutcome::UpstreamError);
                    return Err(ThrottleError::Upstream(error));
                }
            }
        }
    }

    /// Enqueues arbitrary work on the coordinator's priority queue, for
    /// callers that want admission ordering independent of provider
    /// throttling. The returned future resolves when the work completes.
    pub fn enqueue_with_priority<F, Fut>(
        &self,
        priority: Priority,
        work: F,
    ) -> impl Future<Output = Result<Value, ThrottleError>>
    where
        F: FnOnce() -> Fut + Send + 'static,
        Fut: Future<Output = anyhow::Result<Value>> + Send + 'static,
    {
        self.queue.submit(priority, work)
    }

    /// Latest quota feedback recorded for a provider, if any success has
    /// carried the `x-ratelimit-*` headers.
    pub fn limit_state(&self, provider: &str) -> Option<ProviderLimitState> {
        lock_unpoisoned(&self.limit_states).get(provider).cloned()
    }

    /// State snapshot of the provider's registered limiter, if any.
    pub fn limiter_state(&self, provider: &str) -> Option<LimiterState> {
        lock_unpoisoned(&self.limiters)
            .get(provider)
            .map(ProviderLimiter::state)
    }

    /// Current 429 retry count for a provider (zero when absent). Reset on
    /// the next success.
    pub fn pending_retries(&self, provider: &str) -> u32 {
        lock_unpoisoned(&self.retry_counts)
            .get(provider)
            .copied()
            .unwrap_or(0)
    }

    /// Depths and drain state of the internal priority queue.
    pub fn queue_stats(&self) -> QueueStats {
        self.queue.stats()
    }

    /// Outcome counters for this coordinator instance.
    pub fn stats(&self) -> &ThrottleStats {
        &self.stats
    }

    /// Releases every registered limiter's background task and clears all
    /// per-provider state. Safe to call more than once.
    pub fn release(&self) {
        let mut limiters = lock_unpoisoned(&self.limiters);
        for (_, limiter) in limiters.drain() {
            limiter.release();
        }
        drop(limiters);
        lock_unpoisoned(&self.limit_states).clear();
        lock_unpoisoned(&self.retry_counts).clear();
    }

    /// Records a success: stores quota feedback, clears the retry counter,
    /// and proactively halves a token bucket's refill rate when the provider
    /// reports less than 20% of its quota remaining.
    fn note_success(&self, provider: &str, response_headers: &HashMap<String, String>) {
        lock_unpoisoned(&self.retry_counts).remove(provider);

        let Some(state) = parse_limit_state(response_headers) else {
            return;
        };
        let fraction = state.remaining_fraction();
        lock_unpoisoned(&self.limit_states).insert(provider.to_string(), state);

        if fraction < QUOTA_PRESSURE_THRESHOLD {
            let limiter = lock_unpoisoned(&self.limiters).get(provider).cloned();
            if let Some(bucket) = limiter.as_ref().and_then(ProviderLimiter::as_token_bucket) {
                let (old, new) = bucket.halve_refill_rate();
                if new < old {
                    log::info!(
                        "provider '{provider}' quota at {:.0}%, easing token refill rate {old:.2} -> {new:.2}/s",
                        fraction * 100.0
                    );
                }
            }
        }
    }

    fn bump_retry(&self, provider: &str) -> u32 {
        let mut counts = lock_unpoisoned(&self.retry_counts);
        let count = counts.entry(provider.to_string()).or_insert(0);
        *count += 1;
        *count
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_remaining_fraction() {
        let state = ProviderLimitState {
            limit: 100,
            remaining: 5,
            reset_at: None,
            updated_at: Utc::now(),
        };
        assert!((state.remaining_fraction() - 0.05).abs() < f64::EPSILON);

        let zero_limit = ProviderLimitState {
            limit: 0,
            remaining: 0,
            reset_at: None,
            updated_at: Utc::now(),
        };
        assert_eq!(zero_limit.remaining_fraction(), 1.0);
    }
}
