//! Keyword intent classifier for free-form messages.
//!
//! Used only when the first word is not a known command.

use crate::commands::parse_filters;

/// What a free-form message most likely asks for.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Intent {
    Start { filters: Vec<String> },
    Stop,
    ShowStock,
    Status,
    Help,
}

const STOP_KEYWORDS: &[&str] = &[
    "stop track",
    "stop gagstock",
    "stop notif",
    "stop updat",
    "unsubscribe",
    "turn off",
];

/// Leading words that introduce a filter list, e.g. "track sunflower".
const START_PREFIXES: &[&str] = &["track", "watch", "notify me about", "notify me", "subscribe"];

/// Words after a start prefix that mean "everything", not a filter.
const EVERYTHING: &[&str] = &["", "stock", "the stock", "gagstock", "everything", "all"];

const STOCK_KEYWORDS: &[&str] = &["stock", "shop", "restock"];
const STOCK_QUESTIONS: &[&str] = &["show", "what", "check", "current", "see", "any"];

const STATUS_KEYWORDS: &[&str] = &["am i tracking", "my status", "my filters", "status"];
const HELP_KEYWORDS: &[&str] = &["help", "commands", "how do i", "how does", "what can you"];

/// Classify `text`. `None` when nothing matches.
pub fn classify(text: &str) -> Option<Intent> {
    let lower = text.trim().to_lowercase();
    if lower.is_empty() {
        return None;
    }

    if STOP_KEYWORDS.iter().any(|kw| lower.contains(kw)) {
        return Some(Intent::Stop);
    }

    for prefix in START_PREFIXES {
        if let Some(rest) = strip_word_prefix(&lower, prefix) {
            let filters = if EVERYTHING.contains(&rest) {
                Vec::new()
            } else {
                parse_filters(rest)
            };
            return Some(Intent::Start { filters });
        }
    }

    if STATUS_KEYWORDS.iter().any(|kw| lower.contains(kw)) {
        return Some(Intent::Status);
    }
    if STOCK_KEYWORDS.iter().any(|kw| lower.contains(kw))
        && STOCK_QUESTIONS.iter().any(|kw| lower.contains(kw))
    {
        return Some(Intent::ShowStock);
    }
    if HELP_KEYWORDS.iter().any(|kw| lower.contains(kw)) {
        return Some(Intent::Help);
    }
    None
}

/// `text` minus a leading `prefix` that ends on a word boundary.
fn strip_word_prefix<'a>(text: &'a str, prefix: &str) -> Option<&'a str> {
    let rest = text.strip_prefix(prefix)?;
    if rest.is_empty() || rest.starts_with(char::is_whitespace) {
        Some(rest.trim())
    } else {
        None
    }
}
