//! Exact rolling-window admission gate.

use std::collections::VecDeque;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use tokio::time::{interval, sleep, Instant};
use tokio_util::sync::CancellationToken;

use super::LimiterState;
use crate::config::{SlidingWindowConfig, ADMISSION_POLL_CAP, WINDOW_SWEEP_INTERVAL};
use crate::error_handling::ThrottleError;
use crate::utils::lock_unpoisoned;

/// Exact-timestamp rolling-window limiter for providers metered by discrete
/// request counts per interval.
///
/// Admission appends the current time to a deque; a purge pass before every
/// observation drops entries older than the window, so after any purge every
/// retained timestamp is strictly newer than `now - window` and the deque
/// never holds more than `max_requests` entries. Purge cost is linear in
/// deque depth, which is bounded by `max_requests`.
pub struct SlidingWindowLimiter {
    window: Duration,
    max_requests: usize,
    timestamps: Arc<Mutex<VecDeque<Instant>>>,
    shutdown: CancellationToken,
}

/// Drops timestamps whose age has reached the window length.
fn purge(timestamps: &mut VecDeque<Instant>, window: Duration, now: Instant) {
    while let Some(front) = timestamps.front() {
        if now.duration_since(*front) >= window {
            timestamps.pop_front();
        } else {
            break;
        }
    }
}

impl SlidingWindowLimiter {
    /// Creates a limiter and starts its background sweep task, which keeps
    /// the deque purged while the limiter sits idle.
    ///
    /// # Errors
    ///
    /// Returns [`ThrottleError::InvalidConfig`] for a zero-length window.
    /// `max_requests == 0` is accepted but admission can then never succeed.
    pub fn new(config: SlidingWindowConfig) -> Result<Self, ThrottleError> {
        if config.window.is_zero() {
            return Err(ThrottleError::InvalidConfig(
                "sliding window length must be non-zero".to_string(),
            ));
        }

        let timestamps = Arc::new(Mutex::new(VecDeque::with_capacity(config.max_requests)));
        let shutdown = CancellationToken::new();

        let timestamps_for_task = Arc::clone(&timestamps);
        let shutdown_for_task = shutdown.clone();
        let window = config.window;
        tokio::spawn(async move {
            let mut ticker = interval(WINDOW_SWEEP_INTERVAL);
            loop {
                tokio::select! {
                    _ = ticker.tick() => {
                        let mut timestamps = lock_unpoisoned(&timestamps_for_task);
                        purge(&mut timestamps, window, Instant::now());
                    }
                    _ = shutdown_for_task.cancelled() => {
                        log::debug!("sliding window sweep task shutting down");
                        break;
                    }
                }
            }
        });

        Ok(SlidingWindowLimiter {
            window: config.window,
            max_requests: config.max_requests,
            timestamps,
            shutdown,
        })
    }

    /// Attempts admission without waiting: purges expired timestamps, then
    /// records and admits if a slot is free.
    pub fn try_admit(&self) -> bool {
        let mut timestamps = lock_unpoisoned(&self.timestamps);
        let now = Instant::now();
        purge(&mut timestamps, self.window, now);
        if timestamps.len() < self.max_requests {
            timestamps.push_back(now);
            true
        } else {
            false
        }
    }

    /// Time until the next slot frees up: zero when a slot is already free,
    /// else the remaining lifetime of the oldest retained timestamp (clamped
    /// to zero, so a backward clock jump never yields a negative wait).
    pub fn time_until_next_slot(&self) -> Duration {
        let mut timestamps = lock_unpoisoned(&self.timestamps);
        let now = Instant::now();
        purge(&mut timestamps, self.window, now);
        if timestamps.len() < self.max_requests {
            return Duration::ZERO;
        }
        match timestamps.front() {
            Some(oldest) => (*oldest + self.window).duration_since(now),
            // max_requests == 0: no slot will ever free up; report a full
            // window so pollers back off instead of spinning
            None => self.window,
        }
    }

    /// Waits for a free slot, then admits.
    ///
    /// Sleeps `time_until_next_slot` (clamped to 1s per iteration) and
    /// retries admission until it lands. No cancellation or deadline is
    /// threaded through; wrap in `tokio::time::timeout` if a bound is needed.
    pub async fn acquire(&self) {
        loop {
            let wait = self.time_until_next_slot();
            if !wait.is_zero() {
                sleep(wait.min(ADMISSION_POLL_CAP)).await;
            }
            if self.try_admit() {
                return;
            }
        }
    }

    /// Current state snapshot (purged before reading).
    pub fn state(&self) -> LimiterState {
        let mut timestamps = lock_unpoisoned(&self.timestamps);
        purge(&mut timestamps, self.window, Instant::now());
        LimiterState::SlidingWindow {
            in_window: timestamps.len(),
            max_requests: self.max_requests,
            window_ms: self.window.as_millis() as u64,
        }
    }

    /// Stops the background sweep task. Idempotent; also fired on drop.
    pub fn release(&self) {
        self.shutdown.cancel();
    }
}

impl Drop for SlidingWindowLimiter {
    fn drop(&mut self) {
        self.shutdown.cancel();
    }
}
