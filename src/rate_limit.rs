//! In-memory rate limiting for credential attempts.
//!
//! DESIGN
//! ======
//! Sliding-window counters backed by `HashMap<String, VecDeque<Instant>>`.
//! Two limits are enforced on login and registration attempts:
//! - Per key (normalized email): `LOGIN_RATE_LIMIT` attempts per window
//! - Global: `LOGIN_RATE_GLOBAL` attempts per window across all keys
//!
//! A successful login clears the key's history so a user who finally types
//! the right password is not penalized on the next visit.

use std::collections::{HashMap, VecDeque};
use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant};

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum RateLimitError {
    #[error("per-account attempt limit exceeded (max {limit} attempts/{window_secs}s)")]
    PerKeyExceeded { limit: usize, window_secs: u64 },
    #[error("global attempt limit exceeded (max {limit} attempts/{window_secs}s)")]
    GlobalExceeded { limit: usize, window_secs: u64 },
}

#[derive(Clone, Copy)]
struct RateLimitConfig {
    per_key_limit: usize,
    global_limit: usize,
    window: Duration,
}

#[derive(Clone)]
pub struct RateLimiter {
    inner: Arc<Mutex<RateLimiterInner>>,
    config: RateLimitConfig,
}

#[derive(Default)]
struct RateLimiterInner {
    key_attempts: HashMap<String, VecDeque<Instant>>,
    global_attempts: VecDeque<Instant>,
}

impl RateLimiter {
    #[must_use]
    pub fn new(per_key_limit: usize, global_limit: usize, window: Duration) -> Self {
        Self {
            inner: Arc::new(Mutex::new(RateLimiterInner::default())),
            config: RateLimitConfig { per_key_limit, global_limit, window },
        }
    }

    /// A limiter that never rejects.
    #[cfg(test)]
    pub fn unlimited() -> Self {
        Self::new(usize::MAX, usize::MAX, Duration::from_secs(1))
    }

    /// Number of keys with attempts still tracked.
    #[cfg(test)]
    pub fn tracked_keys(&self) -> usize {
        self.inner
            .lock()
            .unwrap_or_else(std::sync::PoisonError::into_inner)
            .key_attempts
            .len()
    }

    /// Check both limits, then record the attempt.
    ///
    /// # Errors
    ///
    /// Returns which limit was exceeded; the attempt is not recorded.
    pub fn check_and_record(&self, key: &str) -> Result<(), RateLimitError> {
        self.check_and_record_at(key, Instant::now())
    }

    fn check_and_record_at(&self, key: &str, now: Instant) -> Result<(), RateLimitError> {
        let mut inner = self
            .inner
            .lock()
            .unwrap_or_else(std::sync::PoisonError::into_inner);
        let cfg = self.config;

        prune_window(&mut inner.global_attempts, now, cfg.window);
        if inner.global_attempts.len() >= cfg.global_limit {
            return Err(RateLimitError::GlobalExceeded { limit: cfg.global_limit, window_secs: cfg.window.as_secs() });
        }

        inner.key_attempts.retain(|_, deque| {
            prune_window(deque, now, cfg.window);
            !deque.is_empty()
        });

        let key_deque = inner.key_attempts.entry(key.to_owned()).or_default();
        if key_deque.len() >= cfg.per_key_limit {
            return Err(RateLimitError::PerKeyExceeded { limit: cfg.per_key_limit, window_secs: cfg.window.as_secs() });
        }

        key_deque.push_back(now);
        inner.global_attempts.push_back(now);
        Ok(())
    }

    /// Forget the per-key history for `key`. Global history is kept.
    pub fn clear(&self, key: &str) {
        let mut inner = self
            .inner
            .lock()
            .unwrap_or_else(std::sync::PoisonError::into_inner);
        inner.key_attempts.remove(key);
    }
}

fn prune_window(deque: &mut VecDeque<Instant>, now: Instant, window: Duration) {
    while let Some(&front) = deque.front() {
        if now.duration_since(front) > window {
            deque.pop_front();
        } else {
            break;
        }
    }
}

#[cfg(test)]
#[path = "rate_limit_test.rs"]
mod tests;
