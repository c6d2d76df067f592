//! One fetch, filter, compare and notify pass for a single session.

use crate::channels::traits::{ChannelAdapter, ChannelOutboundMessage};
use crate::error::TrackerError;
use crate::tracker::fingerprint::{FingerprintCache, fingerprint};
use crate::tracker::format::{RenderContext, render_message};
use crate::tracker::schedule::Clock;
use crate::tracker::session::{SessionSnapshot, SessionStore};
use gagstock_feed::{StockCategory, StockFeed, StockItem, StockSnapshot};
use std::sync::Arc;
use tracing::{debug, info};

/// Why a cycle produced no message.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SuppressReason {
    /// Gear and seed are unchanged since the last message.
    Duplicate,
    /// The session has filters and nothing in gear or seed matched.
    NoMatch,
}

/// Result of a completed cycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CycleOutcome {
    Sent,
    NotSent(SuppressReason),
}

/// Stock after filters, in display order.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FilteredStock {
    pub sections: Vec<(StockCategory, Vec<StockItem>)>,
    /// `false` only when filters are set and neither gear nor seed matched.
    pub matched: bool,
}

impl FilteredStock {
    pub fn items(&self, category: StockCategory) -> &[StockItem] {
        self.sections
            .iter()
            .find(|(c, _)| *c == category)
            .map(|(_, items)| items.as_slice())
            .unwrap_or(&[])
    }

    /// Fingerprint over the filtered gear and seed lists.
    pub fn fingerprint(&self) -> String {
        fingerprint(
            self.items(StockCategory::Gear),
            self.items(StockCategory::Seed),
        )
    }
}

fn matches_any(name: &str, filters: &[String]) -> bool {
    let name = name.to_lowercase();
    filters.iter().any(|f| name.contains(f.to_lowercase().as_str()))
}

/// Apply user filters.
///
/// Filters only narrow gear and seed. When either of them keeps at least
/// one item, eggs, cosmetics and honey are included unfiltered; when
/// neither does, nothing is included.
pub fn apply_filters(stock: &StockSnapshot, filters: &[String]) -> FilteredStock {
    if filters.is_empty() {
        return FilteredStock {
            sections: StockCategory::ALL
                .iter()
                .map(|c| (*c, stock.items(*c).to_vec()))
                .collect(),
            matched: true,
        };
    }

    let mut sections: Vec<(StockCategory, Vec<StockItem>)> = StockCategory::PRIMARY
        .iter()
        .map(|c| {
            let kept = stock
                .items(*c)
                .iter()
                .filter(|item| matches_any(&item.name, filters))
                .cloned()
                .collect::<Vec<_>>();
            (*c, kept)
        })
        .filter(|(_, kept)| !kept.is_empty())
        .collect();

    if sections.is_empty() {
        return FilteredStock {
            sections,
            matched: false,
        };
    }

    sections.extend(
        StockCategory::ALL
            .iter()
            .filter(|c| !c.is_primary())
            .map(|c| (*c, stock.items(*c).to_vec())),
    );
    FilteredStock {
        sections,
        matched: true,
    }
}

/// What to do with a cycle's result.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Decision {
    Send,
    Suppress(SuppressReason),
}

/// Send/suppress decision table.
pub fn decide(always_send: bool, cache_hit: bool, unmatched_filters: bool) -> Decision {
    if always_send {
        Decision::Send
    } else if cache_hit {
        Decision::Suppress(SuppressReason::Duplicate)
    } else if unmatched_filters {
        Decision::Suppress(SuppressReason::NoMatch)
    } else {
        Decision::Send
    }
}

/// Everything a cycle touches, shared by every session task.
pub struct CycleRunner {
    pub(crate) store: Arc<dyn SessionStore>,
    pub(crate) cache: FingerprintCache,
    pub(crate) feed: Arc<dyn StockFeed>,
    pub(crate) notifier: Arc<dyn ChannelAdapter>,
    pub(crate) clock: Clock,
    pub(crate) utc_offset_hours: i32,
}

impl CycleRunner {
    fn is_live(&self, session: &SessionSnapshot) -> bool {
        !session.cancel.is_cancelled()
            && self.store.is_current(&session.user_id, session.session_id)
    }

    /// Run one cycle for `session`.
    ///
    /// Liveness is checked before the fetch, after it, and once more before
    /// notifying; a session torn down at any of those points yields
    /// [`TrackerError::Cancelled`] and sends nothing.
    ///
    /// The fingerprint is recorded before the notify call and is kept even
    /// when the notify fails.
    pub async fn run(
        &self,
        session: &SessionSnapshot,
        always_send: bool,
    ) -> Result<CycleOutcome, TrackerError> {
        let _guard = session.cycle_lock.lock().await;
        if !self.is_live(session) {
            return Err(TrackerError::Cancelled);
        }

        let snapshot = self.feed.fetch().await?;
        if !self.is_live(session) {
            debug!(user_id = %session.user_id, "session ended during fetch; discarding result");
            return Err(TrackerError::Cancelled);
        }
        self.store.touch(&session.user_id);

        let filtered = apply_filters(&snapshot.stock, &session.filters);
        let current = filtered.fingerprint();
        let cache_hit = self.cache.is_duplicate(&session.user_id, &current).await;
        let unmatched = !session.filters.is_empty() && !filtered.matched;

        if let Decision::Suppress(reason) = decide(always_send, cache_hit, unmatched) {
            debug!(user_id = %session.user_id, ?reason, "cycle suppressed");
            return Ok(CycleOutcome::NotSent(reason));
        }
        if !self.is_live(session) {
            return Err(TrackerError::Cancelled);
        }

        self.cache.record(&session.user_id, current).await;

        let ctx = RenderContext {
            filters: &session.filters,
            now: self.clock.now(),
            utc_offset_hours: self.utc_offset_hours,
        };
        let text = render_message(&filtered, &snapshot.weather, &ctx);
        self.notifier
            .send(ChannelOutboundMessage {
                reply_target: session.user_id.clone(),
                text,
            })
            .await
            .map_err(|e| TrackerError::Notify(e.to_string()))?;

        info!(user_id = %session.user_id, always_send, "stock notification sent");
        Ok(CycleOutcome::Sent)
    }
}
