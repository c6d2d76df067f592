//! # gagstock-feed
//!
//! Read-only client for the two remote resources the tracker polls: the
//! shop stock endpoint and the weather endpoint.
//!
//! ## Design
//!
//! - Both endpoints are fetched concurrently with a bounded per-request timeout
//! - Stock categories are mandatory: a missing or malformed category fails the fetch
//! - Weather fields are optional and fall back to defaults
//! - [`StockFeed`] is the injection seam used by the tracker and its tests

pub mod client;
pub mod config;
pub mod error;
pub mod http;
pub mod types;

pub use client::{HttpStockFeed, StockFeed};
pub use config::FeedConfig;
pub use error::{FeedError, Result};
pub use types::{FeedSnapshot, StockCategory, StockItem, StockSnapshot, Weather};
