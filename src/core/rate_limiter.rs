use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::Mutex;
use tokio::time::{Duration, Instant};

/// Sliding-window rate limiter keyed by `(user, action)`.
///
/// Keeps the timestamps of recent invocations per key and rejects a new
/// invocation once the window already holds `limit` entries. Used to
/// throttle the broadcast fan-out per admin.
#[derive(Clone)]
pub struct ActionRateLimiter {
    windows: Arc<Mutex<HashMap<(i64, &'static str), Vec<Instant>>>>,
    limit: usize,
    window: Duration,
}

impl ActionRateLimiter {
    /// Creates a rate limiter allowing `limit` invocations per rolling `window`.
    pub fn new(limit: usize, window: Duration) -> Self {
        Self {
            windows: Arc::new(Mutex::new(HashMap::new())),
            limit,
            window,
        }
    }

    /// Attempts to record one invocation of `action` by `user_id`.
    ///
    /// Returns `true` and consumes one slot when the window has capacity,
    /// `false` without consuming anything when the limit is exhausted.
    pub async fn try_acquire(&self, user_id: i64, action: &'static str) -> bool {
        let now = Instant::now();
        let mut windows = self.windows.lock().await;
        let timestamps = windows.entry((user_id, action)).or_default();
        timestamps.retain(|t| now.duration_since(*t) < self.window);

        if timestamps.len() >= self.limit {
            return false;
        }

        timestamps.push(now);
        true
    }

    /// Remaining time until the oldest entry in the window expires.
    ///
    /// Returns `None` when the key is not currently limited.
    pub async fn retry_after(&self, user_id: i64, action: &'static str) -> Option<Duration> {
        let now = Instant::now();
        let mut windows = self.windows.lock().await;
        let timestamps = windows.get_mut(&(user_id, action))?;
        timestamps.retain(|t| now.duration_since(*t) < self.window);

        if timestamps.len() < self.limit {
            return None;
        }
        let oldest = timestamps.first()?;
        Some(self.window - now.duration_since(*oldest))
    }

    /// Drops every recorded invocation for the given key.
    pub async fn reset(&self, user_id: i64, action: &'static str) {
        let mut windows = self.windows.lock().await;
        windows.remove(&(user_id, action));
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_allows_up_to_limit() {
        let limiter = ActionRateLimiter::new(3, Duration::from_secs(60));
        assert!(limiter.try_acquire(1, "broadcast").await);
        assert!(limiter.try_acquire(1, "broadcast").await);
        assert!(limiter.try_acquire(1, "broadcast").await);
        assert!(!limiter.try_acquire(1, "broadcast").await);
    }

    #[tokio::test]
    async fn test_failed_attempt_does_not_consume_slot() {
        let limiter = ActionRateLimiter::new(1, Duration::from_secs(60));
        assert!(limiter.try_acquire(1, "broadcast").await);
        assert!(!limiter.try_acquire(1, "broadcast").await);
        assert!(!limiter.try_acquire(1, "broadcast").await);
        assert!(limiter.retry_after(1, "broadcast").await.is_some());
    }

    #[tokio::test]
    async fn test_keys_are_independent() {
        let limiter = ActionRateLimiter::new(1, Duration::from_secs(60));
        assert!(limiter.try_acquire(1, "broadcast").await);
        assert!(limiter.try_acquire(2, "broadcast").await);
        assert!(limiter.try_acquire(1, "points").await);
    }

    #[tokio::test]
    async fn test_window_expires() {
        let limiter = ActionRateLimiter::new(1, Duration::from_millis(20));
        assert!(limiter.try_acquire(1, "broadcast").await);
        tokio::time::sleep(Duration::from_millis(40)).await;
        assert!(limiter.try_acquire(1, "broadcast").await);
    }

    #[tokio::test]
    async fn test_reset_clears_window() {
        let limiter = ActionRateLimiter::new(1, Duration::from_secs(60));
        assert!(limiter.try_acquire(1, "broadcast").await);
        limiter.reset(1, "broadcast").await;
        assert!(limiter.try_acquire(1, "broadcast").await);
    }
}
