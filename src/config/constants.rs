//! Configuration constants.
//!
//! Tunable constants for admission control, retry behavior, and header
//! handling. These are compile-time defaults; per-coordinator values live in
//! [`CoordinatorConfig`](super::CoordinatorConfig).

use std::time::Duration;

// Retry-on-429 strategy
/// Maximum number of retries after a 429 before the call is declared
/// exhausted. Six consecutive 429s (1 initial attempt + 5 retries) produce a
/// terminal `RateLimitExhausted` error.
pub const DEFAULT_RETRY_CEILING: u32 = 5;
/// Base delay for exponential backoff when the server supplies no
/// `retry-after` hint. Doubles on each retry.
pub const DEFAULT_BACKOFF_BASE: Duration = Duration::from_millis(1000);
/// Upper bound on a single backoff delay, applied before jitter.
pub const DEFAULT_BACKOFF_CAP: Duration = Duration::from_millis(60_000);
/// Fraction of the computed backoff delay added as random jitter (up to 10%).
/// Spreads retries from concurrent callers that were rejected together.
pub const BACKOFF_JITTER_FRACTION: f64 = 0.1;

// Adaptive throttling
/// When a success response reports `remaining / limit` below this fraction,
/// the provider's token-bucket refill rate is halved proactively.
pub const QUOTA_PRESSURE_THRESHOLD: f64 = 0.2;
/// Floor for adaptive refill-rate reduction, in tokens per second. Halving
/// never drops the rate below this, so a throttled provider keeps draining.
pub const MIN_REFILL_RATE: f64 = 1.0;

// Background task cadence
/// Interval of the token bucket's background refill task. Refill is also
/// recomputed eagerly on every consume, so this only bounds drift between
/// bursts; correctness does not depend on the tick cadence.
pub const REFILL_TICK: Duration = Duration::from_secs(1);
/// Interval of the sliding window's background sweep, which purges expired
/// timestamps while the limiter is idle.
pub const WINDOW_SWEEP_INTERVAL: Duration = Duration::from_secs(1);

// Admission polling
/// Upper clamp on a single admission-poll sleep. Keeps waiters responsive to
/// refill-rate changes made while they are parked.
pub const ADMISSION_POLL_CAP: Duration = Duration::from_secs(1);
/// Lower clamp on a single admission-poll sleep, preventing a busy loop when
/// the computed shortfall is near zero.
pub const ADMISSION_POLL_FLOOR: Duration = Duration::from_millis(10);

// HTTP surface
/// Status code this layer specializes; everything else propagates untouched.
pub const HTTP_STATUS_TOO_MANY_REQUESTS: u16 = 429;
/// Header carrying the server's requested retry delay (seconds or HTTP date).
pub const RETRY_AFTER_HEADER: &str = "retry-after";
/// Header carrying the provider's total request quota for the current window.
pub const X_RATELIMIT_LIMIT_HEADER: &str = "x-ratelimit-limit";
/// Header carrying the provider's remaining request quota.
pub const X_RATELIMIT_REMAINING_HEADER: &str = "x-ratelimit-remaining";
/// Header carrying the provider's quota reset time (format varies by vendor).
pub const X_RATELIMIT_RESET_HEADER: &str = "x-ratelimit-reset";

// HTTP client defaults
/// Request timeout for the bundled reqwest transport.
pub const HTTP_CLIENT_TIMEOUT: Duration = Duration::from_secs(30);
/// Maximum HTTP header value length retained, in characters. Longer values
/// are truncated before they reach limit-state parsing or error reporting.
pub const MAX_HEADER_VALUE_LENGTH: usize = 1000;
