//! Per-user stock tracking.
//!
//! [`TrackerManager`] owns the session store, the fingerprint cache, the
//! feed and the notifier. Every session gets one tokio task that sleeps to
//! the next grid point, runs a cycle, and re-arms until its cancellation
//! token fires.

pub mod cycle;
pub mod fingerprint;
pub mod format;
pub mod schedule;
pub mod session;

pub use cycle::{CycleOutcome, CycleRunner, FilteredStock, SuppressReason, apply_filters};
pub use fingerprint::FingerprintCache;
pub use schedule::Clock;
pub use session::{InMemorySessionStore, SessionSnapshot, SessionStore};

use crate::channels::traits::ChannelAdapter;
use crate::config::TrackerConfig;
use crate::error::TrackerError;
use gagstock_feed::StockFeed;
use std::sync::Arc;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

/// Session lifecycle and scheduling front door. Cheap to clone.
#[derive(Clone)]
pub struct TrackerManager {
    runner: Arc<CycleRunner>,
    config: TrackerConfig,
}

impl TrackerManager {
    pub fn new(
        config: TrackerConfig,
        store: Arc<dyn SessionStore>,
        feed: Arc<dyn StockFeed>,
        notifier: Arc<dyn ChannelAdapter>,
    ) -> Self {
        Self::with_clock(config, store, feed, notifier, Clock::system())
    }

    pub fn with_clock(
        config: TrackerConfig,
        store: Arc<dyn SessionStore>,
        feed: Arc<dyn StockFeed>,
        notifier: Arc<dyn ChannelAdapter>,
        clock: Clock,
    ) -> Self {
        let runner = CycleRunner {
            store,
            cache: FingerprintCache::new(config.fingerprint_ttl()),
            feed,
            notifier,
            clock,
            utc_offset_hours: config.restock_utc_offset_hours,
        };
        Self {
            runner: Arc::new(runner),
            config,
        }
    }

    pub fn cache(&self) -> &FingerprintCache {
        &self.runner.cache
    }

    /// Start tracking for `user_id`.
    ///
    /// Runs the first cycle inline. A failed first fetch removes the
    /// session again and returns the fetch error. A failed first delivery
    /// keeps the session and its timer and returns [`TrackerError::Notify`].
    pub async fn start(
        &self,
        user_id: &str,
        filters: Vec<String>,
    ) -> Result<CycleOutcome, TrackerError> {
        let session = self.runner.store.create(user_id, filters)?;
        // A fingerprint left by an earlier session must not suppress the first message.
        self.runner.cache.remove(user_id).await;
        info!(user_id, filters = ?session.filters, "tracking session started");

        match self.runner.run(&session, false).await {
            Ok(outcome) => {
                self.spawn_session(session);
                Ok(outcome)
            }
            Err(TrackerError::Notify(reason)) => {
                warn!(user_id, %reason, "first stock message could not be delivered");
                self.spawn_session(session);
                Err(TrackerError::Notify(reason))
            }
            Err(TrackerError::Cancelled) => Err(TrackerError::Cancelled),
            Err(e) => {
                warn!(user_id, error = %e, "initial fetch failed; rolling back session");
                if self.runner.store.is_current(user_id, session.session_id) {
                    self.runner.store.destroy(user_id);
                    self.runner.cache.remove(user_id).await;
                }
                Err(e)
            }
        }
    }

    /// Stop tracking. Returns `false` when there was nothing to stop.
    pub async fn stop(&self, user_id: &str) -> bool {
        let removed = self.runner.store.destroy(user_id);
        if removed {
            self.runner.cache.remove(user_id).await;
            info!(user_id, "tracking session stopped");
        }
        removed
    }

    /// Run one cycle now and send regardless of the cached fingerprint.
    pub async fn refresh(&self, user_id: &str) -> Result<CycleOutcome, TrackerError> {
        let session = self
            .runner
            .store
            .get(user_id)
            .ok_or_else(|| TrackerError::NoSession(user_id.to_owned()))?;
        self.runner.store.touch(user_id);
        self.runner.run(&session, true).await
    }

    pub fn status(&self, user_id: &str) -> Option<SessionSnapshot> {
        self.runner.store.get(user_id)
    }

    /// Mark the user as active. Returns `false` when they have no session.
    pub fn touch(&self, user_id: &str) -> bool {
        self.runner.store.touch(user_id)
    }

    pub fn active_users(&self) -> Vec<String> {
        self.runner.store.user_ids()
    }

    pub fn active_count(&self) -> usize {
        self.runner.store.len()
    }

    /// Stop every session. Returns how many were stopped.
    pub async fn stop_all(&self) -> usize {
        let mut stopped = 0;
        for user_id in self.runner.store.user_ids() {
            if self.stop(&user_id).await {
                stopped += 1;
            }
        }
        stopped
    }

    /// Remove sessions idle past the inactivity timeout. The users are not
    /// told.
    pub async fn sweep_idle(&self) -> Vec<String> {
        let idle = self
            .runner
            .store
            .idle_users(self.config.inactivity_timeout());
        let mut removed = Vec::with_capacity(idle.len());
        for user_id in idle {
            if self.runner.store.destroy(&user_id) {
                self.runner.cache.remove(&user_id).await;
                info!(user_id = %user_id, "idle tracking session removed");
                removed.push(user_id);
            }
        }
        removed
    }

    /// Run [`Self::sweep_idle`] every sweep interval until `cancel` fires.
    pub fn spawn_sweeper(&self, cancel: CancellationToken) -> JoinHandle<()> {
        let manager = self.clone();
        tokio::spawn(async move {
            let mut interval = tokio::time::interval(manager.config.sweep_interval());
            interval.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);
            // The first tick completes immediately.
            interval.tick().await;
            loop {
                tokio::select! {
                    () = cancel.cancelled() => break,
                    _ = interval.tick() => {
                        let removed = manager.sweep_idle().await;
                        if !removed.is_empty() {
                            debug!(count = removed.len(), "idle sweep finished");
                        }
                    }
                }
            }
        })
    }

    fn spawn_session(&self, session: SessionSnapshot) -> JoinHandle<()> {
        let runner = Arc::clone(&self.runner);
        let interval = self.config.interval();
        let offset = self.config.offset();
        tokio::spawn(async move {
            loop {
                let delay = schedule::delay_until_next(runner.clock.now(), interval, offset);
                tokio::select! {
                    () = session.cancel.cancelled() => break,
                    () = tokio::time::sleep(delay) => {}
                }
                match runner.run(&session, false).await {
                    Ok(outcome) => debug!(user_id = %session.user_id, ?outcome, "scheduled cycle done"),
                    Err(TrackerError::Cancelled) => break,
                    Err(e) => warn!(user_id = %session.user_id, error = %e, "scheduled cycle failed"),
                }
            }
            debug!(user_id = %session.user_id, session_id = session.session_id, "session task exited");
        })
    }
}
