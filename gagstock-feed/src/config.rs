//! Feed endpoint configuration.

use crate::error::FeedError;
use serde::{Deserialize, Serialize};

/// Where and how to fetch remote state.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct FeedConfig {
    /// Stock endpoint returning the five item categories.
    pub stock_url: String,
    /// Weather endpoint.
    pub weather_url: String,
    /// Per-request timeout in seconds.
    pub timeout_seconds: u64,
    /// Custom User-Agent. `None` uses the crate default.
    pub user_agent: Option<String>,
}

impl Default for FeedConfig {
    fn default() -> Self {
        Self {
            stock_url: "https://gagstock.gleeze.com/grow-a-garden".to_owned(),
            weather_url: "https://growagardenstock.com/api/stock/weather".to_owned(),
            timeout_seconds: 5,
            user_agent: None,
        }
    }
}

impl FeedConfig {
    /// Validates this configuration.
    ///
    /// Both URLs must parse as absolute `http`/`https` URLs and the timeout
    /// must be non-zero.
    pub fn validate(&self) -> Result<(), FeedError> {
        if self.timeout_seconds == 0 {
            return Err(FeedError::Config("timeout_seconds must be > 0".into()));
        }
        for (field, raw) in [("stock_url", &self.stock_url), ("weather_url", &self.weather_url)] {
            let parsed = url::Url::parse(raw)
                .map_err(|e| FeedError::Config(format!("{field} is not a valid URL: {e}")))?;
            if !matches!(parsed.scheme(), "http" | "https") {
                return Err(FeedError::Config(format!(
                    "{field} must use http or https, got `{}`",
                    parsed.scheme()
                )));
            }
        }
        Ok(())
    }
}
