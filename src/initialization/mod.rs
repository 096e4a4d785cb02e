//! Shared resource setup: logger and HTTP client.
//!
//! Both are optional conveniences — a host application that already owns its
//! logging and HTTP stack can skip this module entirely and inject its own
//! [`ProviderTransport`](crate::transport::ProviderTransport).

mod client;
mod logger;

pub use client::init_client;
pub use logger::init_logger;
