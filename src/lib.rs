//! Admission control for outbound AI-provider calls.
//!
//! Everything here gates when work *starts*; nothing cancels or preempts work
//! already in flight. The building blocks:
//!
//! - [`TokenBucketLimiter`]: burst up to a capacity, bounded long-run rate.
//! - [`SlidingWindowLimiter`]: exact request count per trailing interval.
//! - [`PriorityRequestQueue`]: three strict tiers, FIFO within a tier.
//! - [`AdaptiveLimiterCoordinator`]: per-provider limiters, bounded 429
//!   retry with `retry-after` or exponential backoff, and header-driven
//!   self-tuning, over an injected [`ProviderTransport`].
//!
//! ```no_run
//! use std::sync::Arc;
//!
//! use provider_throttle::{
//!     AdaptiveLimiterCoordinator, HttpTransport, LimiterConfig, ProviderEndpoint,
//!     TokenBucketConfig,
//! };
//! use serde_json::json;
//!
//! # async fn run() -> anyhow::Result<()> {
//! let transport = HttpTransport::with_default_client()?
//!     .endpoint(
//!         "openai",
//!         ProviderEndpoint::new("https://api.openai.com/v1/chat/completions")
//!             .with_bearer("sk-..."),
//!     );
//! let coordinator = AdaptiveLimiterCoordinator::new(Arc::new(transport));
//! coordinator.register(
//!     "openai",
//!     LimiterConfig::TokenBucket(TokenBucketConfig {
//!         capacity: 10,
//!         refill_rate: 2.0,
//!     }),
//! )?;
//!
//! let response = coordinator
//!     .dispatch("openai", &json!({"model": "gpt-4o", "messages": []}))
//!     .await?;
//! println!("{}", response.body);
//! # Ok(())
//! # }
//! ```

#![warn(missing_docs)]

pub mod config;
mod coordinator;
mod error_handling;
mod initialization;
mod limiter;
mod queue;
mod transport;
mod utils;

pub use config::{CoordinatorConfig, LimiterConfig, SlidingWindowConfig, TokenBucketConfig};
pub use coordinator::{AdaptiveLimiterCoordinator, ProviderLimitState};
pub use error_handling::{DispatchOutcome, InitializationError, ThrottleError, ThrottleStats};
pub use initialization::{init_client, init_logger};
pub use limiter::{LimiterState, ProviderLimiter, SlidingWindowLimiter, TokenBucketLimiter};
pub use queue::{Priority, PriorityRequestQueue, QueueStats};
pub use transport::{
    HttpTransport, ProviderEndpoint, ProviderResponse, ProviderTransport, TransportError,
};
