//! gagstock: per-user Grow a Garden stock tracking over Messenger.
//!
//! # Architecture
//!
//! - **Channels**: webhook gateway, Messenger adapter, per-user rate limits
//! - **Commands**: parses chat text and drives the tracker
//! - **Tracker**: session store, scheduler tasks, fetch-and-notify cycles
//! - **Feed**: stock and weather client (`gagstock-feed` crate)

pub mod channels;
pub mod commands;
pub mod config;
pub mod error;
pub mod tracker;

pub use commands::{CommandDispatcher, parse};
pub use config::BotConfig;
pub use error::{BotError, Result, TrackerError};
pub use tracker::{CycleOutcome, SuppressReason, TrackerManager};
