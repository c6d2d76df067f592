//! Per-user session store.
//!
//! [`SessionStore`] is the seam between scheduling and storage; the
//! in-memory implementation is the only one shipped.

use crate::error::TrackerError;
use chrono::{DateTime, Utc};
use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio::time::Instant;
use tokio_util::sync::CancellationToken;

/// Point-in-time view of a session, cheap to clone.
///
/// `cancel` and `cycle_lock` are shared with the stored session, so a
/// snapshot held by a running task observes teardown.
#[derive(Debug, Clone)]
pub struct SessionSnapshot {
    /// Unique per created session; a restarted session gets a new id.
    pub session_id: u64,
    pub user_id: String,
    /// Lowercase filter substrings in the order the user typed them.
    pub filters: Vec<String>,
    pub started_at: DateTime<Utc>,
    pub last_activity: Instant,
    /// Cancelled when the session is destroyed.
    pub cancel: CancellationToken,
    /// Serializes cycles for this session.
    pub cycle_lock: Arc<tokio::sync::Mutex<()>>,
}

impl SessionSnapshot {
    pub fn idle_for(&self) -> Duration {
        Instant::now().saturating_duration_since(self.last_activity)
    }
}

/// Storage contract for tracking sessions.
pub trait SessionStore: Send + Sync {
    /// Create a session. Fails if one already exists for `user_id`.
    fn create(&self, user_id: &str, filters: Vec<String>)
    -> Result<SessionSnapshot, TrackerError>;

    /// Current session for `user_id`, if any.
    fn get(&self, user_id: &str) -> Option<SessionSnapshot>;

    /// Remove the session and cancel its timer. Returns `false` when absent.
    fn destroy(&self, user_id: &str) -> bool;

    /// Refresh last activity. Returns `false` when absent.
    fn touch(&self, user_id: &str) -> bool;

    /// Whether `session_id` is still the live session for `user_id`.
    fn is_current(&self, user_id: &str, session_id: u64) -> bool;

    /// Users whose last activity is older than `max_idle`.
    fn idle_users(&self, max_idle: Duration) -> Vec<String>;

    /// All users with a session, sorted.
    fn user_ids(&self) -> Vec<String>;

    fn len(&self) -> usize;

    fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

#[derive(Debug)]
struct StoredSession {
    session_id: u64,
    filters: Vec<String>,
    started_at: DateTime<Utc>,
    last_activity: Instant,
    cancel: CancellationToken,
    cycle_lock: Arc<tokio::sync::Mutex<()>>,
}

impl StoredSession {
    fn snapshot(&self, user_id: &str) -> SessionSnapshot {
        SessionSnapshot {
            session_id: self.session_id,
            user_id: user_id.to_owned(),
            filters: self.filters.clone(),
            started_at: self.started_at,
            last_activity: self.last_activity,
            cancel: self.cancel.clone(),
            cycle_lock: Arc::clone(&self.cycle_lock),
        }
    }
}

/// Process-local [`SessionStore`].
#[derive(Debug, Default)]
pub struct InMemorySessionStore {
    sessions: Mutex<HashMap<String, StoredSession>>,
    next_id: AtomicU64,
}

impl InMemorySessionStore {
    pub fn new() -> Self {
        Self::default()
    }

    fn with_sessions<T>(&self, f: impl FnOnce(&mut HashMap<String, StoredSession>) -> T) -> T {
        // A panic while holding the lock leaves the map itself consistent.
        let mut guard = match self.sessions.lock() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        };
        f(&mut guard)
    }
}

impl SessionStore for InMemorySessionStore {
    fn create(
        &self,
        user_id: &str,
        filters: Vec<String>,
    ) -> Result<SessionSnapshot, TrackerError> {
        self.with_sessions(|sessions| {
            if sessions.contains_key(user_id) {
                return Err(TrackerError::AlreadyActive(user_id.to_owned()));
            }
            let session = StoredSession {
                session_id: self.next_id.fetch_add(1, Ordering::Relaxed) + 1,
                filters,
                started_at: Utc::now(),
                last_activity: Instant::now(),
                cancel: CancellationToken::new(),
                cycle_lock: Arc::new(tokio::sync::Mutex::new(())),
            };
            let snapshot = session.snapshot(user_id);
            sessions.insert(user_id.to_owned(), session);
            Ok(snapshot)
        })
    }

    fn get(&self, user_id: &str) -> Option<SessionSnapshot> {
        self.with_sessions(|sessions| sessions.get(user_id).map(|s| s.snapshot(user_id)))
    }

    fn destroy(&self, user_id: &str) -> bool {
        let removed = self.with_sessions(|sessions| sessions.remove(user_id));
        match removed {
            Some(session) => {
                session.cancel.cancel();
                true
            }
            None => false,
        }
    }

    fn touch(&self, user_id: &str) -> bool {
        self.with_sessions(|sessions| match sessions.get_mut(user_id) {
            Some(session) => {
                session.last_activity = Instant::now();
                true
            }
            None => false,
        })
    }

    fn is_current(&self, user_id: &str, session_id: u64) -> bool {
        self.with_sessions(|sessions| {
            sessions
                .get(user_id)
                .is_some_and(|s| s.session_id == session_id && !s.cancel.is_cancelled())
        })
    }

    fn idle_users(&self, max_idle: Duration) -> Vec<String> {
        let now = Instant::now();
        self.with_sessions(|sessions| {
            let mut idle: Vec<String> = sessions
                .iter()
                .filter(|(_, s)| now.saturating_duration_since(s.last_activity) > max_idle)
                .map(|(user_id, _)| user_id.clone())
                .collect();
            idle.sort();
            idle
        })
    }

    fn user_ids(&self) -> Vec<String> {
        let mut ids = self.with_sessions(|sessions| sessions.keys().cloned().collect::<Vec<_>>());
        ids.sort();
        ids
    }

    fn len(&self) -> usize {
        self.with_sessions(|sessions| sessions.len())
    }
}
