//! Error type definitions.

use log::SetLoggerError;
use reqwest::Error as ReqwestError;
use thiserror::Error;

use crate::transport::TransportError;

/// Error types for initialization failures.
#[derive(Error, Debug)]
pub enum InitializationError {
    /// Error initializing the logger (usually a second initialization).
    #[error("Logger initialization error: {0}")]
    LoggerError(#[from] SetLoggerError),

    /// Error building the shared HTTP client.
    #[error("HTTP client initialization error: {0}")]
    HttpClientError(#[from] ReqwestError),
}

/// Errors surfaced by throttled dispatch and queue admission.
///
/// `dispatch` returns a successful response or exactly one of these; there is
/// no partial outcome. Only the 429 path is handled inside this layer —
/// [`ThrottleError::Upstream`] carries everything else through unchanged.
#[derive(Error, Debug)]
pub enum ThrottleError {
    /// A provider kept answering 429 past the retry ceiling. Terminal: this
    /// layer will not retry further and the caller must treat it as a hard
    /// failure.
    #[error("rate limit retries exhausted for provider '{provider}' after {attempts} attempts")]
    RateLimitExhausted {
        /// Provider whose retry budget ran out.
        provider: String,
        /// Total calls made, including the initial attempt.
        attempts: u32,
    },

    /// A non-429 failure from the network collaborator, propagated
    /// immediately with status, headers, and message intact.
    #[error("upstream request failed: {0}")]
    Upstream(#[source] TransportError),

    /// A queued work item failed. Isolated to that item's future; sibling
    /// entries are unaffected.
    #[error("queued work failed: {0}")]
    QueueWork(#[source] anyhow::Error),

    /// A work item's result channel closed without delivering a result.
    /// Dropping the queue handle does not cause this — already-submitted
    /// work runs to completion regardless. It can only occur when the async
    /// runtime is torn down with work still pending.
    #[error("queued work abandoned before completion")]
    QueueClosed,

    /// An admission cost larger than the bucket capacity can never succeed;
    /// rejected up front instead of waiting forever.
    #[error("admission cost {cost} exceeds bucket capacity {capacity}")]
    CostExceedsCapacity {
        /// Requested token cost.
        cost: u32,
        /// Bucket capacity the cost was checked against.
        capacity: u32,
    },

    /// A limiter was constructed with out-of-range parameters.
    #[error("invalid limiter configuration: {0}")]
    InvalidConfig(String),
}
