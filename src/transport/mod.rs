//! The injected network collaborator contract.
//!
//! The coordinator never performs network I/O itself. Callers hand it
//! anything implementing [`ProviderTransport`]; the only obligations are to
//! surface the HTTP status of a failure as a recoverable field and to expose
//! response headers, so the coordinator can specialize 429 handling and read
//! quota-feedback headers. A reqwest-backed implementation is provided in
//! [`HttpTransport`] for hosts that don't bring their own.

mod http;

use std::collections::HashMap;

use async_trait::async_trait;
use serde_json::Value;
use thiserror::Error;

use crate::config::HTTP_STATUS_TOO_MANY_REQUESTS;

pub use http::{HttpTransport, ProviderEndpoint};

/// A successful provider response: parsed body plus response headers.
///
/// Header names are lowercased by the bundled transport; lookups elsewhere in
/// the crate are case-insensitive regardless.
#[derive(Debug, Clone)]
pub struct ProviderResponse {
    /// Parsed JSON response body.
    pub body: Value,
    /// Response headers, name -> value.
    pub headers: HashMap<String, String>,
}

/// A failed provider call.
///
/// Carries the HTTP status (when one was received) and the response headers,
/// which is what lets the coordinator recognize 429s and honor `retry-after`.
#[derive(Debug, Clone, Error)]
#[error("{message}")]
pub struct TransportError {
    /// HTTP status of the failure, if a response was received at all.
    pub status: Option<u16>,
    /// Human-readable description.
    pub message: String,
    /// Response headers, empty when no response was received.
    pub headers: HashMap<String, String>,
}

impl TransportError {
    /// A failure with no HTTP status (connect error, no endpoint, ...).
    pub fn new(message: impl Into<String>) -> Self {
        TransportError {
            status: None,
            message: message.into(),
            headers: HashMap::new(),
        }
    }

    /// A failure carrying an HTTP status.
    pub fn with_status(status: u16, message: impl Into<String>) -> Self {
        TransportError {
            status: Some(status),
            message: message.into(),
            headers: HashMap::new(),
        }
    }

    /// Attaches response headers.
    pub fn headers(mut self, headers: HashMap<String, String>) -> Self {
        self.headers = headers;
        self
    }

    /// True when this failure is a 429 rate-limit rejection, the one error
    /// the coordinator retries.
    pub fn is_rate_limited(&self) -> bool {
        self.status == Some(HTTP_STATUS_TOO_MANY_REQUESTS)
    }
}

/// Capability to execute a single provider call.
///
/// Implementations must be cheap to call concurrently; the coordinator holds
/// one instance behind an `Arc` and never serializes calls through it.
#[async_trait]
pub trait ProviderTransport: Send + Sync {
    /// Performs the network call for `provider` with the given payload.
    async fn execute(&self, provider: &str, payload: &Value)
        -> Result<ProviderResponse, TransportError>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_is_rate_limited() {
        assert!(TransportError::with_status(429, "slow down").is_rate_limited());
        assert!(!TransportError::with_status(500, "boom").is_rate_limited());
        assert!(!TransportError::new("connect refused").is_rate_limited());
    }

    #[test]
    fn test_headers_builder() {
        let mut headers = HashMap::new();
        headers.insert("retry-after".to_string(), "2".to_string());
        let err = TransportError::with_status(429, "slow down").headers(headers);
        assert_eq!(err.headers.get("retry-after").map(String::as_str), Some("2"));
    }
}
