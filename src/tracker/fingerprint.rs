//! Per-user fingerprint of the last notified stock.
//!
//! Every recorded fingerprint arms a delayed clear on the tokio clock. Once
//! it fires, identical stock is reported again. A later record re-arms the
//! clear, and the older timer leaves the newer entry alone.

use gagstock_feed::StockItem;
use moka::future::Cache;
use moka::ops::compute::Op;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;

/// Upper bound on tracked users; one entry per active session.
const MAX_ENTRIES: u64 = 10_000;

/// Digest of the gear and seed item lists.
///
/// Only these two categories contribute, so changes limited to eggs,
/// cosmetics or honey never produce a new fingerprint.
pub fn fingerprint(gear: &[StockItem], seed: &[StockItem]) -> String {
    let mut hasher = blake3::Hasher::new();
    for (tag, items) in [(b"gear", gear), (b"seed", seed)] {
        hasher.update(tag);
        hasher.update(&(items.len() as u64).to_le_bytes());
        for item in items {
            hasher.update(&(item.name.len() as u64).to_le_bytes());
            hasher.update(item.name.as_bytes());
            hasher.update(&item.quantity.to_le_bytes());
        }
    }
    hasher.finalize().to_hex().to_string()
}

#[derive(Debug, Clone)]
struct Recorded {
    value: String,
    stamp: u64,
}

/// Map from user id to the fingerprint of the last message sent to them.
#[derive(Clone)]
pub struct FingerprintCache {
    inner: Cache<String, Recorded>,
    clear_after: Option<Duration>,
    stamps: Arc<AtomicU64>,
}

impl FingerprintCache {
    /// Create a cache. `clear_after = None` keeps entries until removed.
    pub fn new(clear_after: Option<Duration>) -> Self {
        Self {
            inner: Cache::builder().max_capacity(MAX_ENTRIES).build(),
            clear_after,
            stamps: Arc::new(AtomicU64::new(0)),
        }
    }

    /// Last recorded fingerprint for `user_id`.
    pub async fn get(&self, user_id: &str) -> Option<String> {
        self.inner.get(user_id).await.map(|r| r.value)
    }

    /// Whether `candidate` equals the recorded fingerprint.
    pub async fn is_duplicate(&self, user_id: &str, candidate: &str) -> bool {
        self.get(user_id).await.as_deref() == Some(candidate)
    }

    /// Store `value` and arm the delayed clear for it.
    pub async fn record(&self, user_id: &str, value: String) {
        let stamp = self.stamps.fetch_add(1, Ordering::Relaxed);
        self.inner
            .insert(user_id.to_owned(), Recorded { value, stamp })
            .await;

        let Some(delay) = self.clear_after else {
            return;
        };
        let inner = self.inner.clone();
        let user_id = user_id.to_owned();
        tokio::spawn(async move {
            tokio::time::sleep(delay).await;
            inner
                .entry_by_ref(user_id.as_str())
                .and_compute_with(|current| {
                    let op = match current {
                        Some(entry) if entry.value().stamp == stamp => Op::Remove,
                        _ => Op::Nop,
                    };
                    std::future::ready(op)
                })
                .await;
            tracing::trace!(user_id = %user_id, "fingerprint clear timer fired");
        });
    }

    pub async fn remove(&self, user_id: &str) {
        self.inner.invalidate(user_id).await;
    }

    pub fn contains(&self, user_id: &str) -> bool {
        self.inner.contains_key(user_id)
    }
}

impl Default for FingerprintCache {
    fn default() -> Self {
        Self::new(None)
    }
}
