use governor::{
    clock::{Clock, DefaultClock},
    state::direct::NotKeyed,
    state::InMemoryState,
    Quota, RateLimiter as GovernorRateLimiter,
};
use std::collections::HashMap;
use std::time::Instant;
use std::{num::NonZeroU32, sync::Arc, time::Duration};
use tokio::sync::RwLock;

type DirectLimiter = GovernorRateLimiter<NotKeyed, InMemoryState, DefaultClock>;

struct Entry {
    limiter: Arc<DirectLimiter>,
    last_attempt: Instant,
}

/// Per-email limiter for management login attempts.
///
/// Every attempt consumes one cell; a successful login resets the email.
/// Default: 5 attempts per 15 minutes.
#[derive(Clone)]
pub struct LoginRateLimiter {
    entries: Arc<RwLock<HashMap<String, Entry>>>,
    max_attempts: NonZeroU32,
    window: Duration,
}

impl LoginRateLimiter {
    pub fn new() -> Self {
        Self::with_config(5, Duration::from_secs(15 * 60))
    }

    pub fn with_config(max_attempts: u32, window: Duration) -> Self {
        Self {
            entries: Arc::new(RwLock::new(HashMap::new())),
            max_attempts: NonZeroU32::new(max_attempts).unwrap_or(NonZeroU32::MIN),
            window,
        }
    }

    /// Record an attempt for `email`.
    ///
    /// Returns `Err(wait)` when the email is currently locked out.
    pub async fn attempt(&self, email: &str) -> Result<(), Duration> {
        let email = email.to_lowercase();

        let limiter = {
            let mut entries = self.entries.write().await;
            let entry = entries.entry(email).or_insert_with(|| Entry {
                limiter: Arc::new(GovernorRateLimiter::direct(self.quota())),
                last_attempt: Instant::now(),
            });
            entry.last_attempt = Instant::now();
            entry.limiter.clone()
        };

        limiter
            .check()
            .map_err(|negative| negative.wait_time_from(DefaultClock::default().now()))
    }

    pub async fn reset(&self, email: &str) {
        let mut entries = self.entries.write().await;
        entries.remove(&email.to_lowercase());
    }

    /// Drop entries idle for longer than the window; their quota has fully
    /// replenished by then.
    pub async fn cleanup(&self) -> usize {
        let mut entries = self.entries.write().await;
        let before = entries.len();
        let window = self.window;
        entries.retain(|_, entry| entry.last_attempt.elapsed() < window);
        before - entries.len()
    }

    fn quota(&self) -> Quota {
        let period = (self.window / self.max_attempts.get()).max(Duration::from_millis(1));
        Quota::with_period(period)
            .unwrap_or_else(|| Quota::per_second(NonZeroU32::MIN))
            .allow_burst(self.max_attempts)
    }
}

impl Default for LoginRateLimiter {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_allows_within_limit() {
        let limiter = LoginRateLimiter::with_config(3, Duration::from_secs(60));
        let email = "admin@example.com";

        assert!(limiter.attempt(email).await.is_ok());
        assert!(limiter.attempt(email).await.is_ok());
        assert!(limiter.attempt(email).await.is_ok());
        assert!(limiter.attempt(email).await.is_err());
    }

    #[tokio::test]
    async fn test_reset_clears_lockout() {
        let limiter = LoginRateLimiter::with_config(1, Duration::from_secs(60));
        let email = "admin@example.com";

        assert!(limiter.attempt(email).await.is_ok());
        assert!(limiter.attempt(email).await.is_err());

        limiter.reset(email).await;
        assert!(limiter.attempt(email).await.is_ok());
    }

    #[tokio::test]
    async fn test_case_insensitive_and_independent() {
        let limiter = LoginRateLimiter::with_config(1, Duration::from_secs(60));

        assert!(limiter.attempt("Admin@Example.com").await.is_ok());
        assert!(limiter.attempt("admin@example.com").await.is_err());
        assert!(limiter.attempt("other@example.com").await.is_ok());
    }

    #[tokio::test]
    async fn test_cleanup_keeps_recent_entries() {
        let limiter = LoginRateLimiter::with_config(2, Duration::from_secs(60));
        let _ = limiter.attempt("admin@example.com").await;

        assert_eq!(limiter.cleanup().await, 0);
        assert_eq!(limiter.entries.read().await.len(), 1);
    }

    #[tokio::test]
    async fn test_cleanup_drops_idle_entries() {
        let limiter = LoginRateLimiter::with_config(2, Duration::from_millis(10));
        let _ = limiter.attempt("admin@example.com").await;

        tokio::time::sleep(Duration::from_millis(20)).await;
        assert_eq!(limiter.cleanup().await, 1);
    }
}
