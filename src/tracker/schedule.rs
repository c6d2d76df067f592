//! Wake-time arithmetic for the per-session timer chain.
//!
//! Wake times sit on an epoch-aligned grid: `k * interval + offset`. Each
//! cycle re-arms against the grid, so a slow cycle never shifts later ticks.

use chrono::{DateTime, TimeZone, Utc};
use gagstock_feed::StockCategory;
use std::time::Duration;
use tokio::time::Instant;

/// Shortest delay ever armed.
pub const MIN_DELAY: Duration = Duration::from_secs(1);

/// Wall-clock time derived from the tokio clock.
///
/// Anchoring wall time to a tokio [`Instant`] keeps grid arithmetic in step
/// with `tokio::time::sleep`, including under a paused test clock.
#[derive(Debug, Clone, Copy)]
pub struct Clock {
    origin_utc: DateTime<Utc>,
    origin: Instant,
}

impl Clock {
    pub fn system() -> Self {
        Self::starting_at(Utc::now())
    }

    /// A clock that reads `at` right now and advances with tokio time.
    pub fn starting_at(at: DateTime<Utc>) -> Self {
        Self {
            origin_utc: at,
            origin: Instant::now(),
        }
    }

    pub fn now(&self) -> DateTime<Utc> {
        let elapsed = Instant::now().saturating_duration_since(self.origin);
        self.origin_utc + chrono::Duration::from_std(elapsed).unwrap_or(chrono::Duration::zero())
    }
}

impl Default for Clock {
    fn default() -> Self {
        Self::system()
    }
}

/// Smallest grid point strictly after `now`.
pub fn next_wake(now: DateTime<Utc>, interval: Duration, offset: Duration) -> DateTime<Utc> {
    let interval_ms = (interval.as_millis() as i64).max(1_000);
    let offset_ms = offset.as_millis() as i64 % interval_ms;
    let now_ms = now.timestamp_millis();

    let slot = (now_ms - offset_ms).div_euclid(interval_ms) + 1;
    let next_ms = slot * interval_ms + offset_ms;
    Utc.timestamp_millis_opt(next_ms)
        .single()
        .unwrap_or(now + chrono::Duration::milliseconds(interval_ms))
}

/// Delay to arm after a cycle finishing at `now`: `max(next - now, 1s)`.
pub fn delay_until_next(now: DateTime<Utc>, interval: Duration, offset: Duration) -> Duration {
    let next = next_wake(now, interval, offset);
    (next - now).to_std().unwrap_or(MIN_DELAY).max(MIN_DELAY)
}

/// How often the shop restocks each category.
pub fn restock_period(category: StockCategory) -> Duration {
    match category {
        StockCategory::Gear | StockCategory::Seed => Duration::from_secs(5 * 60),
        StockCategory::Egg => Duration::from_secs(30 * 60),
        StockCategory::Honey => Duration::from_secs(60 * 60),
        StockCategory::Cosmetics => Duration::from_secs(4 * 60 * 60),
    }
}

/// Time left until `category` restocks, with boundaries in local time at
/// `utc_offset_hours`.
pub fn restock_in(category: StockCategory, now: DateTime<Utc>, utc_offset_hours: i32) -> Duration {
    let local_secs = now.timestamp() + i64::from(utc_offset_hours.clamp(-23, 23)) * 3600;
    let period = restock_period(category).as_secs() as i64;
    let elapsed = local_secs.rem_euclid(period);
    Duration::from_secs((period - elapsed) as u64)
}
