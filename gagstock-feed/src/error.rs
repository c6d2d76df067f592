//! Error types for the gagstock-feed crate.
//!
//! Messages are stable strings suitable for logs. Endpoint URLs may appear
//! in messages; access tokens never do.

/// Errors that can occur while fetching remote stock or weather state.
#[derive(Debug, thiserror::Error)]
pub enum FeedError {
    /// The HTTP request could not be sent or the body could not be read.
    #[error("HTTP error: {0}")]
    Http(String),

    /// The request did not complete within the configured timeout.
    #[error("feed request timed out: {0}")]
    Timeout(String),

    /// The endpoint answered with a non-success status code.
    #[error("feed returned status {status} for {url}")]
    Status {
        /// HTTP status code.
        status: u16,
        /// Requested URL.
        url: String,
    },

    /// The response body was not the expected JSON shape.
    #[error("parse error: {0}")]
    Parse(String),

    /// A required stock category was absent from the payload.
    #[error("stock payload is missing the `{0}` category")]
    MissingCategory(&'static str),

    /// Invalid feed configuration.
    #[error("config error: {0}")]
    Config(String),
}

impl FeedError {
    pub(crate) fn from_reqwest(url: &str, err: reqwest::Error) -> Self {
        if err.is_timeout() {
            Self::Timeout(url.to_owned())
        } else {
            Self::Http(format!("{url}: {err}"))
        }
    }
}

/// Convenience type alias for feed results.
pub type Result<T> = std::result::Result<T, FeedError>;
