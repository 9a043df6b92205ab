//! HTTP client factory with consistent timeout configuration.
//!
//! Provider calls must be bounded: a timed-out call fails the enclosing
//! operation and is never retried here. Build clients with `build_client()`
//! rather than constructing `reqwest::Client` directly.

use reqwest::Client;
use std::time::Duration;

/// Default connect timeout (TCP handshake + TLS).
pub const DEFAULT_CONNECT_TIMEOUT: Duration = Duration::from_secs(5);

/// Default request timeout (total request/response time).
pub const DEFAULT_REQUEST_TIMEOUT: Duration = Duration::from_secs(30);

/// Build an HTTP client with the given timeouts.
///
/// Panics if the client cannot be built (e.g., TLS misconfiguration).
/// Only called at startup, and the app cannot function without it.
pub fn build_client(connect_timeout: Duration, request_timeout: Duration) -> Client {
    try_build_client(connect_timeout, request_timeout).expect("Failed to build HTTP client")
}

pub fn try_build_client(
    connect_timeout: Duration,
    request_timeout: Duration,
) -> Result<Client, reqwest::Error> {
    Client::builder()
        .connect_timeout(connect_timeout)
        .timeout(request_timeout)
        .build()
}
