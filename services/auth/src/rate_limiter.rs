//! In-process rate limiter for login attempts
//!
//! Keyed by the login identifier the caller presented, so a brute-force run
//! against one account is throttled regardless of source address. State is
//! per-process; the auth service is the only writer of credentials, so this
//! does not need to be shared.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::sync::Mutex;
use tracing::info;

/// Rate limiter configuration
#[derive(Debug, Clone)]
pub struct RateLimiterConfig {
    /// Maximum number of attempts allowed within the window
    pub max_attempts: u32,
    /// Time window in seconds
    pub window_seconds: u64,
    /// Ban duration in seconds once the limit is exceeded
    pub ban_duration_seconds: u64,
}

impl Default for RateLimiterConfig {
    fn default() -> Self {
        Self {
            max_attempts: 5,
            window_seconds: 300,        // 5 minutes
            ban_duration_seconds: 3600, // 1 hour
        }
    }
}

#[derive(Debug)]
struct RateLimiterEntry {
    attempts: u32,
    last_attempt: Instant,
    ban_expires: Option<Instant>,
}

/// Login rate limiter
#[derive(Debug, Clone)]
pub struct RateLimiter {
    config: RateLimiterConfig,
    entries: Arc<Mutex<HashMap<String, RateLimiterEntry>>>,
}

impl RateLimiter {
    /// Create a new rate limiter
    pub fn new(config: RateLimiterConfig) -> Self {
        Self {
            config,
            entries: Arc::new(Mutex::new(HashMap::new())),
        }
    }

    /// Record an attempt for `key` and report whether it may proceed
    pub async fn is_allowed(&self, key: &str) -> bool {
        let mut entries = self.entries.lock().await;
        let now = Instant::now();

        let entry = entries.entry(key.to_string()).or_insert(RateLimiterEntry {
            attempts: 0,
            last_attempt: now,
            ban_expires: None,
        });

        if let Some(ban_expires) = entry.ban_expires {
            if now >= ban_expires {
                entry.attempts = 0;
                entry.ban_expires = None;
            } else {
                return false;
            }
        }

        if now.duration_since(entry.last_attempt) >= Duration::from_secs(self.config.window_seconds)
        {
            entry.attempts = 0;
        }

        if entry.attempts >= self.config.max_attempts {
            entry.ban_expires = Some(now + Duration::from_secs(self.config.ban_duration_seconds));
            info!(
                "Throttling login attempts for {} for {} seconds",
                key, self.config.ban_duration_seconds
            );
            return false;
        }

        entry.attempts += 1;
        entry.last_attempt = now;

        true
    }

    /// Forget the attempt history for `key`, called after a successful login
    pub async fn clear(&self, key: &str) {
        self.entries.lock().await.remove(key);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn tight_config() -> RateLimiterConfig {
        RateLimiterConfig {
            max_attempts: 3,
            window_seconds: 300,
            ban_duration_seconds: 3600,
        }
    }

    #[tokio::test]
    async fn test_attempts_within_limit_are_allowed() {
        let limiter = RateLimiter::new(tight_config());
        for _ in 0..3 {
            assert!(limiter.is_allowed("alice").await);
        }
    }

    #[tokio::test]
    async fn test_exceeding_limit_bans_the_key() {
        let limiter = RateLimiter::new(tight_config());
        for _ in 0..3 {
            assert!(limiter.is_allowed("alice").await);
        }
        assert!(!limiter.is_allowed("alice").await);
        // Still banned on the next call.
        assert!(!limiter.is_allowed("alice").await);
    }

    #[tokio::test]
    async fn test_keys_are_independent() {
        let limiter = RateLimiter::new(tight_config());
        for _ in 0..4 {
            let _ = limiter.is_allowed("alice").await;
        }
        assert!(limiter.is_allowed("bob").await);
    }

    #[tokio::test]
    async fn test_clear_resets_the_key() {
        let limiter = RateLimiter::new(tight_config());
        for _ in 0..4 {
            let _ = limiter.is_allowed("alice").await;
        }
        assert!(!limiter.is_allowed("alice").await);

        limiter.clear("alice").await;
        assert!(limiter.is_allowed("alice").await);
    }
}
