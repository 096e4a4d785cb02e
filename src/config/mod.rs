//! Configuration constants and construction-time config types.

mod constants;
mod types;

pub use constants::*;
pub use types::{CoordinatorConfig, LimiterConfig, SlidingWindowConfig, TokenBucketConfig};
