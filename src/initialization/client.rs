//! HTTP client initialization.

use std::time::Duration;

use reqwest::ClientBuilder;

use crate::error_handling::InitializationError;

/// Builds the shared HTTP client used by [`HttpTransport`].
///
/// One client is built per transport and reused for every request, so
/// connection pooling works across providers.
///
/// [`HttpTransport`]: crate::transport::HttpTransport
///
/// # Errors
///
/// Returns [`InitializationError::HttpClientError`] if the TLS backend or
/// client configuration fails to initialize.
pub fn init_client(timeout: Duration) -> Result<reqwest::Client, InitializationError> {
    let client = ClientBuilder::new()
        .timeout(timeout)
        .user_agent(concat!("provider_throttle/", env!("CARGO_PKG_VERSION")))
        .build()?;
    Ok(client)
}
