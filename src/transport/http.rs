//! Reqwest-backed provider transport.

use std::collections::HashMap;

use async_trait::async_trait;
use serde_json::Value;

use super::{ProviderResponse, ProviderTransport, TransportError};
use crate::config::{HTTP_CLIENT_TIMEOUT, MAX_HEADER_VALUE_LENGTH};
use crate::error_handling::InitializationError;
use crate::initialization::init_client;

/// Where a provider's requests go, and how they authenticate.
#[derive(Debug, Clone)]
pub struct ProviderEndpoint {
    /// Request URL the payload is POSTed to.
    pub url: String,
    /// Optional bearer token attached to each request.
    pub api_key: Option<String>,
}

impl ProviderEndpoint {
    /// An unauthenticated endpoint.
    pub fn new(url: impl Into<String>) -> Self {
        ProviderEndpoint {
            url: url.into(),
            api_key: None,
        }
    }

    /// Attaches a bearer token.
    pub fn with_bearer(mut self, api_key: impl Into<String>) -> Self {
        self.api_key = Some(api_key.into());
        self
    }
}

/// HTTP implementation of [`ProviderTransport`].
///
/// Posts the payload as JSON to the provider's configured endpoint and maps
/// non-success statuses into [`TransportError`] with the response headers
/// attached, which is all the coordinator needs for 429 handling and quota
/// feedback.
pub struct HttpTransport {
    client: reqwest::Client,
    endpoints: HashMap<String, ProviderEndpoint>,
}

impl HttpTransport {
    /// Creates a transport around an existing client.
    pub fn new(client: reqwest::Client) -> Self {
        HttpTransport {
            client,
            endpoints: HashMap::new(),
        }
    }

    /// Creates a transport with the crate's default client (30s timeout,
    /// crate user-agent).
    pub fn with_default_client() -> Result<Self, InitializationError> {
        Ok(Self::new(init_client(HTTP_CLIENT_TIMEOUT)?))
    }

    /// Registers the endpoint for a provider name. Builder-style so the
    /// transport can be assembled before being shared behind an `Arc`.
    pub fn endpoint(mut self, provider: impl Into<String>, endpoint: ProviderEndpoint) -> Self {
        self.endpoints.insert(provider.into(), endpoint);
        self
    }
}

#[async_trait]
impl ProviderTransport for HttpTransport {
    async fn execute(
        &self,
        provider: &str,
        payload: &Value,
    ) -> Result<ProviderResponse, TransportError> {
        let endpoint = self.endpoints.get(provider).ok_or_else(|| {
            TransportError::new(format!("no endpoint configured for provider '{provider}'"))
        })?;

        let mut request = self.client.post(&endpoint.url).json(payload);
        if let Some(key) = &endpoint.api_key {
            request = request.bearer_auth(key);
        }

        let response = request.send().await.map_err(|e| TransportError {
            status: e.status().map(|s| s.as_u16()),
            message: format!("request to provider '{provider}' failed: {e}"),
            headers: HashMap::new(),
        })?;

        let status = response.status();
        let headers = collect_headers(response.headers());

        if !status.is_success() {
            return Err(TransportError::with_status(
                status.as_u16(),
                format!("provider '{provider}' returned status {status}"),
            )
            .headers(headers));
        }

        let body = response.json::<Value>().await.map_err(|e| {
            TransportError::new(format!(
                "failed to decode response body from provider '{provider}': {e}"
            ))
        })?;

        Ok(ProviderResponse { body, headers })
    }
}

/// Flattens a header map into owned name/value pairs.
///
/// Names are already lowercase in reqwest; values are truncated at
/// `MAX_HEADER_VALUE_LENGTH` and non-UTF-8 values are skipped.
fn collect_headers(headers: &reqwest::header::HeaderMap) -> HashMap<String, String> {
    headers
        .iter()
        .filter_map(|(name, value)| {
            value.to_str().ok().map(|v| {
                let truncated: String = v.chars().take(MAX_HEADER_VALUE_LENGTH).collect();
                (name.as_str().to_string(), truncated)
            })
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use reqwest::header::{HeaderMap, HeaderValue};

    #[test]
    fn test_collect_headers_lowercases_and_truncates() {
        let mut headers = HeaderMap::new();
        headers.insert("Retry-After", HeaderValue::from_static("2"));
        let long_value = "x".repeat(MAX_HEADER_VALUE_LENGTH + 50);
        headers.insert(
            "x-ratelimit-reset",
            HeaderValue::from_str(&long_value).unwrap(),
        );

        let collected = collect_headers(&headers);
        assert_eq!(collected.get("retry-after").map(String::as_str), Some("2"));
        assert_eq!(
            collected.get("x-ratelimit-reset").map(String::len),
            Some(MAX_HEADER_VALUE_LENGTH)
        );
    }

    #[tokio::test]
    async fn test_missing_endpoint_is_an_error_without_status() {
        let transport = HttpTransport::with_default_client().unwrap();
        let err = transport
            .execute("unknown", &serde_json::json!({}))
            .await
            .unwrap_err();
        assert_eq!(err.status, None);
        assert!(err.message.contains("no endpoint configured"));
    }
}
