//! Sliding-window rate limiting.
//!
//! Each key keeps the timestamps of its accepted attempts. On every check
//! the timestamps older than the window are dropped; the attempt is accepted
//! only while fewer than `max_attempts` remain.

use std::collections::VecDeque;

use dashmap::DashMap;
use tokio::time::Instant;

use crate::config::RateLimitConfig;

/// Per-key sliding-window limiter.
pub struct RateLimiter {
    config: RateLimitConfig,
    windows: DashMap<String, VecDeque<Instant>>,
}

impl RateLimiter {
    pub fn new(config: RateLimitConfig) -> Self {
        Self {
            config,
            windows: DashMap::new(),
        }
    }

    pub fn config(&self) -> RateLimitConfig {
        self.config
    }

    /// Record an attempt for `key`. Returns false when the window is full.
    pub fn check(&self, key: &str) -> bool {
        let now = Instant::now();
        let window = self.config.window();
        let mut attempts = self.windows.entry(key.to_string()).or_default();

        while let Some(oldest) = attempts.front() {
            if now.duration_since(*oldest) >= window {
                attempts.pop_front();
            } else {
                break;
            }
        }

        if attempts.len() >= self.config.max_attempts {
            return false;
        }
        attempts.push_back(now);
        true
    }

    /// Attempts still inside the window for `key`.
    pub fn attempts(&self, key: &str) -> usize {
        let now = Instant::now();
        let window = self.config.window();
        self.windows
            .get(key)
            .map(|a| a.iter().filter(|t| now.duration_since(**t) < window).count())
            .unwrap_or(0)
    }

    /// Forget all attempts for `key` (e.g. after a successful login).
    pub fn reset(&self, key: &str) {
        self.windows.remove(key);
    }

    /// Drop keys whose attempts have all aged out. Returns how many were removed.
    pub fn cleanup(&self) -> usize {
        let now = Instant::now();
        let window = self.config.window();
        let before = self.windows.len();
        self.windows.retain(|_, attempts| {
            attempts
                .back()
                .map(|newest| now.duration_since(*newest) < window)
                .unwrap_or(false)
        });
        before - self.windows.len()
    }

    pub fn tracked_keys(&self) -> usize {
        self.windows.len()
    }
}
