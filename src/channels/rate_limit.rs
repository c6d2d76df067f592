//! Per-user inbound command rate limiting.
//!
//! Each user gets an independent sliding 60 second window.

use std::collections::{HashMap, VecDeque};
use std::time::Duration;
use thiserror::Error;
use tokio::time::Instant;

const WINDOW: Duration = Duration::from_secs(60);

/// Rate limiting error.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum RateLimitError {
    /// Too many commands in the current window.
    #[error("rate limit exceeded; retry after {retry_after_secs}s")]
    Exceeded {
        /// Seconds until the oldest command leaves the window.
        retry_after_secs: u64,
    },
}

/// Sliding window for one user.
#[derive(Debug, Clone)]
pub struct RateLimiter {
    max_per_minute: u32,
    window: VecDeque<Instant>,
}

impl RateLimiter {
    #[must_use]
    pub fn new(max_per_minute: u32) -> Self {
        Self {
            max_per_minute,
            window: VecDeque::new(),
        }
    }

    fn prune(&mut self, now: Instant) {
        while let Some(&first) = self.window.front() {
            if now.saturating_duration_since(first) >= WINDOW {
                self.window.pop_front();
            } else {
                break;
            }
        }
    }

    /// Record a command, or fail if the window is full.
    pub fn try_acquire(&mut self) -> Result<(), RateLimitError> {
        let now = Instant::now();
        self.prune(now);

        if self.window.len() >= self.max_per_minute as usize {
            let oldest = self.window.front().copied().unwrap_or(now);
            let remaining = WINDOW.saturating_sub(now.saturating_duration_since(oldest));
            return Err(RateLimitError::Exceeded {
                retry_after_secs: remaining.as_secs().saturating_add(1),
            });
        }

        self.window.push_back(now);
        Ok(())
    }

    #[must_use]
    pub fn remaining(&self) -> u32 {
        self.max_per_minute
            .saturating_sub(self.window.len() as u32)
    }

    fn is_empty(&self) -> bool {
        self.window.is_empty()
    }
}

/// Windows for every user seen within the last minute.
#[derive(Debug)]
pub struct UserRateLimiters {
    max_per_minute: u32,
    limiters: HashMap<String, RateLimiter>,
}

impl UserRateLimiters {
    #[must_use]
    pub fn new(max_per_minute: u32) -> Self {
        Self {
            max_per_minute,
            limiters: HashMap::new(),
        }
    }

    pub fn try_acquire(&mut self, user_id: &str) -> Result<(), RateLimitError> {
        let max = self.max_per_minute;
        self.limiters
            .entry(user_id.to_owned())
            .or_insert_with(|| RateLimiter::new(max))
            .try_acquire()
    }

    /// Remaining commands for `user_id` in the current window.
    #[must_use]
    pub fn remaining(&self, user_id: &str) -> u32 {
        self.limiters
            .get(user_id)
            .map_or(self.max_per_minute, RateLimiter::remaining)
    }

    /// Drop expired timestamps and forget users with empty windows.
    pub fn prune(&mut self) {
        let now = Instant::now();
        self.limiters.retain(|_, limiter| {
            limiter.prune(now);
            !limiter.is_empty()
        });
    }

    #[must_use]
    pub fn tracked_users(&self) -> usize {
        self.limiters.len()
    }
}

#[cfg(test)]
mod tests {
    #![allow(clippy::unwrap_used, clippy::expect_used)]

    use super::*;

    #[tokio::test(start_paused = true)]
    async fn allows_up_to_the_limit() {
        let mut limiter = RateLimiter::new(3);
        for _ in 0..3 {
            assert!(limiter.try_acquire().is_ok());
        }
        assert_eq!(limiter.remaining(), 0);

        match limiter.try_acquire() {
            Err(RateLimitError::Exceeded { retry_after_secs }) => {
                assert!(retry_after_secs > 0);
                assert!(retry_after_secs <= 61);
            }
            other => unreachable!("expected rate limit exceeded, got {other:?}"),
        }
    }

    #[tokio::test(start_paused = true)]
    async fn window_slides_after_a_minute() {
        let mut limiter = RateLimiter::new(2);
        limiter.try_acquire().unwrap();
        tokio::time::advance(Duration::from_secs(30)).await;
        limiter.try_acquire().unwrap();
        assert!(limiter.try_acquire().is_err());

        tokio::time::advance(Duration::from_secs(31)).await;
        assert!(limiter.try_acquire().is_ok());
        assert!(limiter.try_acquire().is_err());
    }

    #[tokio::test(start_paused = true)]
    async fn users_are_isolated() {
        let mut limiters = UserRateLimiters::new(2);
        limiters.try_acquire("a").unwrap();
        limiters.try_acquire("a").unwrap();
        assert!(limiters.try_acquire("a").is_err());

        assert!(limiters.try_acquire("b").is_ok());
        assert_eq!(limiters.remaining("b"), 1);
        assert_eq!(limiters.remaining("unseen"), 2);
    }

    #[tokio::test(start_paused = true)]
    async fn prune_forgets_quiet_users() {
        let mut limiters = UserRateLimiters::new(10);
        limiters.try_acquire("a").unwrap();
        tokio::time::advance(Duration::from_secs(45)).await;
        limiters.try_acquire("b").unwrap();
        tokio::time::advance(Duration::from_secs(20)).await;

        limiters.prune();
        assert_eq!(limiters.tracked_users(), 1);
        assert_eq!(limiters.remaining("a"), 10);
        assert_eq!(limiters.remaining("b"), 9);
    }
}
