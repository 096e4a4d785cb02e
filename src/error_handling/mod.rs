//! Error taxonomy and outcome statistics.
//!
//! Three error families cross this crate's boundary:
//! - `RateLimitExhausted`: terminal, raised when a provider's retry counter
//!   would exceed the ceiling.
//! - `Upstream`: any non-429 collaborator failure, propagated unchanged.
//! - `QueueWork` / `QueueClosed`: failures isolated to one queued item.
//!
//! Header-parsing failures are deliberately not errors — malformed
//! `retry-after` values fall back silently to exponential backoff.

mod stats;
mod types;

pub use stats::{DispatchOutcome, ThrottleStats};
pub use types::{InitializationError, ThrottleError};
