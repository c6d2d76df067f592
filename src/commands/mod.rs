//! Chat command parsing and dispatch.
//!
//! Every inbound text becomes a [`Command`]; [`CommandDispatcher`] runs it
//! against the tracker and returns the reply text.

pub mod admin;
pub mod intent;

pub use admin::{AdminAllowlist, Authorizer};
pub use intent::Intent;

use crate::error::TrackerError;
use crate::tracker::{CycleOutcome, SuppressReason, TrackerManager};
use std::sync::Arc;
use tracing::{debug, info, warn};

/// A parsed chat command.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Command {
    Start { filters: Vec<String> },
    Stop,
    Refresh,
    Status,
    Help,
    /// Free-form request for the current stock: refresh, or start if idle.
    ShowStock,
    /// `gagstock` with a missing or unknown subcommand.
    Usage,
    Admin(AdminCommand),
    Unknown,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AdminCommand {
    Sessions,
    StopAll,
    Usage,
}

pub const USAGE: &str = "📌 Usage:\n\
• gagstock on: track all stock\n\
• gagstock on Sunflower | Watering Can: track only matching gear and seeds\n\
• gagstock refresh: send the current stock now\n\
• gagstock status: show your tracking session\n\
• gagstock off: stop tracking";

const ADMIN_USAGE: &str = "🛠️ Admin commands:\n• admin sessions\n• admin stopall";

const NO_SESSION: &str = "⚠️ No active session. Send \"gagstock on\" to start tracking.";

/// Split `|`-separated filters: trimmed, lowercased, empties dropped.
pub fn parse_filters(raw: &str) -> Vec<String> {
    raw.split('|')
        .map(|f| f.trim().to_lowercase())
        .filter(|f| !f.is_empty())
        .collect()
}

/// First whitespace-delimited word and the trimmed remainder.
fn split_word(text: &str) -> (&str, &str) {
    let text = text.trim_start();
    match text.find(char::is_whitespace) {
        Some(idx) => (&text[..idx], text[idx..].trim()),
        None => (text, ""),
    }
}

/// Parse a chat message.
pub fn parse(text: &str) -> Command {
    let (head, rest) = split_word(text);
    match head.to_lowercase().as_str() {
        "gagstock" => {
            let (sub, args) = split_word(rest);
            match sub.to_lowercase().as_str() {
                "on" | "start" => Command::Start {
                    filters: parse_filters(args),
                },
                "off" | "stop" => Command::Stop,
                "refresh" => Command::Refresh,
                "status" => Command::Status,
                _ => Command::Usage,
            }
        }
        "help" => Command::Help,
        "admin" => match split_word(rest).0.to_lowercase().as_str() {
            "sessions" => Command::Admin(AdminCommand::Sessions),
            "stopall" => Command::Admin(AdminCommand::StopAll),
            _ => Command::Admin(AdminCommand::Usage),
        },
        _ => match intent::classify(text) {
            Some(Intent::Start { filters }) => Command::Start { filters },
            Some(Intent::Stop) => Command::Stop,
            Some(Intent::ShowStock) => Command::ShowStock,
            Some(Intent::Status) => Command::Status,
            Some(Intent::Help) => Command::Help,
            None => Command::Unknown,
        },
    }
}

/// Runs commands for users and produces reply texts.
#[derive(Clone)]
pub struct CommandDispatcher {
    tracker: TrackerManager,
    authorizer: Arc<dyn Authorizer>,
}

impl CommandDispatcher {
    pub fn new(tracker: TrackerManager, authorizer: Arc<dyn Authorizer>) -> Self {
        Self {
            tracker,
            authorizer,
        }
    }

    pub fn tracker(&self) -> &TrackerManager {
        &self.tracker
    }

    /// Handle one message from `user_id` and return the reply.
    pub async fn dispatch(&self, user_id: &str, text: &str) -> String {
        self.tracker.touch(user_id);
        let command = parse(text);
        debug!(user_id, ?command, "dispatching command");

        match command {
            Command::Start { filters } => self.start(user_id, filters).await,
            Command::Stop => self.stop(user_id).await,
            Command::Refresh => self.refresh(user_id).await,
            Command::ShowStock => {
                if self.tracker.status(user_id).is_some() {
                    self.refresh(user_id).await
                } else {
                    self.start(user_id, Vec::new()).await
                }
            }
            Command::Status => self.status(user_id),
            Command::Help | Command::Usage => USAGE.to_owned(),
            Command::Admin(admin) => self.admin(user_id, admin).await,
            Command::Unknown => {
                "🤔 I didn't get that. Send \"help\" to see what I can do.".to_owned()
            }
        }
    }

    async fn start(&self, user_id: &str, filters: Vec<String>) -> String {
        let tracking = if filters.is_empty() {
            "all gear and seeds".to_owned()
        } else {
            filters.join(", ")
        };
        match self.tracker.start(user_id, filters).await {
            Ok(CycleOutcome::NotSent(SuppressReason::NoMatch)) => format!(
                "✅ Gagstock tracking started for {tracking}.\n\
                 Nothing matching is in stock right now; you'll get a message when it shows up."
            ),
            Ok(_) => format!(
                "✅ Gagstock tracking started for {tracking}.\n\
                 You'll get a message whenever the stock changes."
            ),
            Err(TrackerError::AlreadyActive(_)) => {
                "📡 Gagstock tracking is already active. Send \"gagstock off\" to stop it first."
                    .to_owned()
            }
            Err(TrackerError::Notify(_)) => {
                "✅ Gagstock tracking started, but the first update could not be delivered."
                    .to_owned()
            }
            Err(TrackerError::Cancelled) => {
                "🛑 Tracking was stopped before it could start.".to_owned()
            }
            Err(e) => {
                warn!(user_id, error = %e, "start failed");
                "⚠️ Couldn't fetch the stock right now, so tracking was not started. \
                 Please try again later."
                    .to_owned()
            }
        }
    }

    async fn stop(&self, user_id: &str) -> String {
        if self.tracker.stop(user_id).await {
            "🛑 Gagstock tracking stopped.".to_owned()
        } else {
            NO_SESSION.to_owned()
        }
    }

    async fn refresh(&self, user_id: &str) -> String {
        match self.tracker.refresh(user_id).await {
            Ok(_) => "🔄 Stock refreshed.".to_owned(),
            Err(TrackerError::NoSession(_)) => NO_SESSION.to_owned(),
            Err(TrackerError::Notify(_)) => "⚠️ Couldn't deliver the stock update.".to_owned(),
            Err(TrackerError::Cancelled) => "🛑 Tracking was stopped.".to_owned(),
            Err(e) => {
                warn!(user_id, error = %e, "refresh failed");
                "⚠️ Couldn't fetch the stock right now. Please try again later.".to_owned()
            }
        }
    }

    fn status(&self, user_id: &str) -> String {
        match self.tracker.status(user_id) {
            Some(session) => {
                let filters = if session.filters.is_empty() {
                    "all gear and seeds".to_owned()
                } else {
                    session.filters.join(", ")
                };
                format!(
                    "📡 Tracking since {}\n🔍 Filters: {filters}",
                    session.started_at.format("%Y-%m-%d %H:%M UTC")
                )
            }
            None => NO_SESSION.to_owned(),
        }
    }

    async fn admin(&self, user_id: &str, command: AdminCommand) -> String {
        if !self.authorizer.is_admin(user_id) {
            warn!(user_id, "admin command denied");
            return "⛔ That command is for admins only.".to_owned();
        }
        match command {
            AdminCommand::Sessions => {
                let users = self.tracker.active_users();
                let mut reply = format!("👥 Active sessions: {}", users.len());
                for user in users {
                    reply.push_str("\n- ");
                    reply.push_str(&user);
                }
                reply
            }
            AdminCommand::StopAll => {
                let stopped = self.tracker.stop_all().await;
                info!(user_id, stopped, "admin stopped all sessions");
                format!("🛑 Stopped {stopped} session(s).")
            }
            AdminCommand::Usage => ADMIN_USAGE.to_owned(),
        }
    }
}

#[cfg(test)]
mod tests {
    #![allow(clippy::unwrap_used, clippy::expect_used)]

    use super::*;

    #[test]
    fn parse_start_with_filters() {
        assert_eq!(
            parse("gagstock on Watering Can |  Carrot | "),
            Command::Start {
                filters: vec!["watering can".to_owned(), "carrot".to_owned()]
            }
        );
        assert_eq!(parse("GAGSTOCK ON"), Command::Start { filters: vec![] });
    }

    #[test]
    fn parse_subcommands() {
        assert_eq!(parse("gagstock off"), Command::Stop);
        assert_eq!(parse("gagstock   refresh"), Command::Refresh);
        assert_eq!(parse("gagstock status"), Command::Status);
        assert_eq!(parse("gagstock"), Command::Usage);
        assert_eq!(parse("gagstock dance"), Command::Usage);
        assert_eq!(parse("help"), Command::Help);
    }

    #[test]
    fn parse_admin_commands() {
        assert_eq!(parse("admin sessions"), Command::Admin(AdminCommand::Sessions));
        assert_eq!(parse("Admin StopAll"), Command::Admin(AdminCommand::StopAll));
        assert_eq!(parse("admin"), Command::Admin(AdminCommand::Usage));
    }

    #[test]
    fn parse_falls_back_to_intent() {
        assert_eq!(parse("stop tracking please"), Command::Stop);
        assert_eq!(
            parse("track sunflower"),
            Command::Start {
                filters: vec!["sunflower".to_owned()]
            }
        );
        assert_eq!(parse("hello there"), Command::Unknown);
    }

    #[test]
    fn filters_drop_empty_segments() {
        assert_eq!(parse_filters(" | | "), Vec::<String>::new());
        assert_eq!(parse_filters("A|b"), vec!["a".to_owned(), "b".to_owned()]);
    }
}
