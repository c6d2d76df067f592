//! Shared HTTP client for feed requests.

use crate::config::FeedConfig;
use crate::error::FeedError;
use std::time::Duration;

/// User-Agent sent when the configuration does not override it.
pub const DEFAULT_USER_AGENT: &str = concat!("gagstock/", env!("CARGO_PKG_VERSION"));

/// Build a [`reqwest::Client`] for the feed endpoints.
///
/// The client has the configured per-request timeout, a JSON `Accept`
/// header and gzip decompression.
///
/// # Errors
///
/// Returns [`FeedError::Http`] if the client cannot be constructed.
pub fn build_client(config: &FeedConfig) -> Result<reqwest::Client, FeedError> {
    let ua = config
        .user_agent
        .clone()
        .unwrap_or_else(|| DEFAULT_USER_AGENT.to_owned());

    let mut headers = reqwest::header::HeaderMap::new();
    headers.insert(
        reqwest::header::ACCEPT,
        reqwest::header::HeaderValue::from_static("application/json"),
    );

    reqwest::Client::builder()
        .timeout(Duration::from_secs(config.timeout_seconds))
        .user_agent(ua)
        .default_headers(headers)
        .build()
        .map_err(|e| FeedError::Http(format!("failed to build HTTP client: {e}")))
}
