//! HTTP-backed stock feed.

use crate::config::FeedConfig;
use crate::error::{FeedError, Result};
use crate::http::build_client;
use crate::types::{FeedSnapshot, StockSnapshot, Weather};
use async_trait::async_trait;
use serde_json::Value;

/// Source of remote stock and weather state.
///
/// The tracker only sees this trait, so tests and alternative backends can
/// stand in for the HTTP implementation.
#[async_trait]
pub trait StockFeed: Send + Sync {
    /// Fetch stock and weather together. Any failure fails the whole fetch.
    async fn fetch(&self) -> Result<FeedSnapshot>;
}

/// [`StockFeed`] that reads the configured JSON endpoints.
#[derive(Clone)]
pub struct HttpStockFeed {
    stock_url: String,
    weather_url: String,
    client: reqwest::Client,
}

impl HttpStockFeed {
    /// Validate `config` and build the HTTP client.
    ///
    /// # Errors
    ///
    /// Returns [`FeedError::Config`] for invalid endpoints and
    /// [`FeedError::Http`] when the client cannot be built.
    pub fn new(config: &FeedConfig) -> Result<Self> {
        config.validate()?;
        Ok(Self {
            stock_url: config.stock_url.clone(),
            weather_url: config.weather_url.clone(),
            client: build_client(config)?,
        })
    }

    async fn get_json(&self, url: &str) -> Result<Value> {
        let response = self
            .client
            .get(url)
            .send()
            .await
            .map_err(|e| FeedError::from_reqwest(url, e))?;

        let status = response.status();
        if !status.is_success() {
            return Err(FeedError::Status {
                status: status.as_u16(),
                url: url.to_owned(),
            });
        }

        let body = response
            .text()
            .await
            .map_err(|e| FeedError::from_reqwest(url, e))?;
        serde_json::from_str(&body).map_err(|e| FeedError::Parse(format!("{url}: {e}")))
    }

    /// Fetch and decode the stock endpoint.
    pub async fn fetch_stock(&self) -> Result<StockSnapshot> {
        let payload = self.get_json(&self.stock_url).await?;
        StockSnapshot::from_value(&payload)
    }

    /// Fetch and decode the weather endpoint.
    pub async fn fetch_weather(&self) -> Result<Weather> {
        let payload = self.get_json(&self.weather_url).await?;
        Ok(Weather::from_value(&payload))
    }
}

#[async_trait]
impl StockFeed for HttpStockFeed {
    async fn fetch(&self) -> Result<FeedSnapshot> {
        let (stock, weather) = tokio::try_join!(self.fetch_stock(), self.fetch_weather())?;
        tracing::trace!(
            gear = stock.gear.len(),
            seed = stock.seed.len(),
            weather = %weather.current,
            "feed fetched"
        );
        Ok(FeedSnapshot { stock, weather })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn new_rejects_invalid_config() {
        let config = FeedConfig {
            stock_url: "nope".into(),
            ..Default::default()
        };
        assert!(matches!(
            HttpStockFeed::new(&config),
            Err(FeedError::Config(_))
        ));
    }

    #[test]
    fn feed_is_object_safe() {
        fn assert_dyn(_: &dyn StockFeed) {}
        let feed = HttpStockFeed::new(&FeedConfig::default()).unwrap();
        assert_dyn(&feed);
    }
}
