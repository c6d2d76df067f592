//! Error types for the stock tracker bot.

use gagstock_feed::FeedError;

/// Errors raised by the tracking core.
#[derive(Debug, thiserror::Error)]
pub enum TrackerError {
    /// A session already exists for this user.
    #[error("session already active for {0}")]
    AlreadyActive(String),

    /// No session exists for this user.
    #[error("no active session for {0}")]
    NoSession(String),

    /// Remote stock or weather fetch failed.
    #[error("fetch failed: {0}")]
    Fetch(#[from] FeedError),

    /// Outbound message could not be delivered.
    #[error("notify failed: {0}")]
    Notify(String),

    /// The session was torn down while the cycle was in flight.
    #[error("session cancelled")]
    Cancelled,
}

/// Top-level error type for the bot process.
#[derive(Debug, thiserror::Error)]
pub enum BotError {
    /// Configuration error.
    #[error("config error: {0}")]
    Config(String),

    /// I/O error.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

/// Convenience result type.
pub type Result<T> = std::result::Result<T, BotError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn tracker_errors_render_user_id() {
        let err = TrackerError::AlreadyActive("42".into());
        assert_eq!(err.to_string(), "session already active for 42");
    }

    #[test]
    fn feed_errors_convert_into_tracker_errors() {
        let err: TrackerError = FeedError::Timeout("http://x".into()).into();
        assert!(matches!(err, TrackerError::Fetch(_)));
        assert_eq!(err.to_string(), "fetch failed: feed request timed out: http://x");
    }

    #[test]
    fn io_errors_convert_into_bot_errors() {
        let io = std::io::Error::new(std::io::ErrorKind::NotFound, "config.toml");
        let err: BotError = io.into();
        assert!(matches!(err, BotError::Io(_)));
        assert_eq!(err.to_string(), "I/O error: config.toml");
    }
}
