//! # Feature: Chat Rate Limiting
//!
//! Caps how many chat messages one session or client may send per window so a single
//! client cannot burn through the completion quota. Sliding window per key
//! (a session id or a client address), backed by DashMap.
//!
//! - **Version**: 1.2.0
//! - **Since**: 0.1.0
//! - **Toggleable**: false
//!
//! ## Changelog
//! - 1.2.0: Expired keys are pruned
//! - 1.1.0: Keyed by chat session; rejected requests report when to retry
//! - 1.0.0: Initial release with per-user sliding window rate limiting

use dashmap::DashMap;
use std::time::{Duration, Instant};

#[derive(Clone)]
pub struct RateLimiter {
    requests: DashMap<String, Vec<Instant>>,
    max_requests: usize,
    time_window: Duration,
}

impl RateLimiter {
    pub fn new(max_requests: usize, time_window: Duration) -> Self {
        RateLimiter {
            requests: DashMap::new(),
            max_requests,
            time_window,
        }
    }

    /// Records a request for `key` if it is under the limit.
    ///
    /// Returns `Err` with the time until the oldest request leaves the window.
    pub fn check(&self, key: &str) -> Result<(), Duration> {
        let now = Instant::now();
        let mut entry = self.requests.entry(key.to_string()).or_default();

        entry.retain(|&time| now.duration_since(time) < self.time_window);

        if entry.len() >= self.max_requests {
            let retry_after = entry
                .first()
                .map(|&oldest| self.time_window.saturating_sub(now.duration_since(oldest)))
                .unwrap_or(self.time_window);
            Err(retry_after)
        } else {
            entry.push(now);
            Ok(())
        }
    }

    pub fn remaining(&self, key: &str) -> usize {
        let now = Instant::now();
        let used = self
            .requests
            .get(key)
            .map(|times| times.iter().filter(|&&t| now.duration_since(t) < self.time_window).count())
            .unwrap_or(0);
        self.max_requests.saturating_sub(used)
    }

    /// Forgets keys with no requests left in the window. Returns how many went.
    pub fn prune(&self) -> usize {
        let now = Instant::now();
        let before = self.requests.len();
        self.requests.retain(|_, times| {
            times.retain(|&time| now.duration_since(time) < self.time_window);
            !times.is_empty()
        });
        before.saturating_sub(self.requests.len())
    }

    pub fn tracked_keys(&self) -> usize {
        self.requests.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;
    use tokio::time::sleep;

    #[test]
    fn test_rate_limiter_allows_under_limit() {
        let limiter = RateLimiter::new(3, Duration::from_secs(1));

        assert!(limiter.check("session1").is_ok());
        assert!(limiter.check("session1").is_ok());
        assert!(limiter.check("session1").is_ok());
        assert_eq!(limiter.remaining("session1"), 0);
    }

    #[test]
    fn test_rate_limiter_blocks_over_limit() {
        let limiter = RateLimiter::new(2, Duration::from_secs(60));

        assert!(limiter.check("session1").is_ok());
        assert!(limiter.check("session1").is_ok());
        let retry_after = limiter.check("session1").unwrap_err();
        assert!(retry_after <= Duration::from_secs(60));
        assert!(retry_after > Duration::from_secs(50));
    }

    #[tokio::test]
    async fn test_rate_limiter_resets_after_window() {
        let limiter = RateLimiter::new(1, Duration::from_millis(100));

        assert!(limiter.check("session1").is_ok());
        assert!(limiter.check("session1").is_err());

        sleep(Duration::from_millis(150)).await;
        assert!(limiter.check("session1").is_ok());
    }

    #[tokio::test]
    async fn test_prune_drops_expired_keys() {
        let limiter = RateLimiter::new(5, Duration::from_millis(100));
        limiter.check("old").unwrap();
        sleep(Duration::from_millis(150)).await;
        limiter.check("fresh").unwrap();

        assert_eq!(limiter.tracked_keys(), 2);
        assert_eq!(limiter.prune(), 1);
        assert_eq!(limiter.tracked_keys(), 1);
        assert_eq!(limiter.remaining("fresh"), 4);
    }

    #[test]
    fn test_rate_limiter_per_session() {
        let limiter = RateLimiter::new(1, Duration::from_secs(1));

        assert!(limiter.check("session1").is_ok());
        assert!(limiter.check("session2").is_ok());
        assert!(limiter.check("session1").is_err());
        assert!(limiter.check("session2").is_err());
        assert_eq!(limiter.remaining("session3"), 1);
    }
}
