//! Fixed-window request quota per client identity
//!
//! Each identity (normally the client IP) gets `limit` requests per `window`.
//! The window opens on the first request and is reset by the first request
//! that arrives after it has elapsed. Rejected requests do not consume quota.

use dashmap::DashMap;
use std::time::Duration;
use tokio::time::Instant;
use tracing::{debug, warn};

/// Quota settings
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RateLimitConfig {
    /// Requests allowed per window
    pub limit: u32,
    /// Window length
    pub window: Duration,
}

impl Default for RateLimitConfig {
    fn default() -> Self {
        Self {
            limit: 10,
            window: Duration::from_secs(60),
        }
    }
}

/// Counting state for one identity
#[derive(Debug, Clone, Copy)]
pub struct RateLimitRecord {
    pub window_start: Instant,
    pub count: u32,
}

/// Per-identity fixed-window limiter
///
/// Safe to share across tasks: the check-and-increment for one identity runs
/// under that identity's map entry lock.
#[derive(Debug, Default)]
pub struct RateLimiter {
    config: RateLimitConfig,
    records: DashMap<String, RateLimitRecord>,
}

impl RateLimiter {
    pub fn new(config: RateLimitConfig) -> Self {
        Self {
            config,
            records: DashMap::new(),
        }
    }

    pub fn config(&self) -> RateLimitConfig {
        self.config
    }

    /// Admit or reject one request from `identity` at the current time
    pub fn allow(&self, identity: &str) -> bool {
        self.allow_at(identity, Instant::now())
    }

    /// Admit or reject one request from `identity` at `now`
    pub fn allow_at(&self, identity: &str, now: Instant) -> bool {
        let mut record = self
            .records
            .entry(identity.to_string())
            .or_insert_with(|| RateLimitRecord {
                window_start: now,
                count: 0,
            });

        if now.saturating_duration_since(record.window_start) > self.config.window {
            record.window_start = now;
            record.count = 0;
        }

        if record.count >= self.config.limit {
            warn!(
                identity,
                limit = self.config.limit,
                "Rate limit exceeded"
            );
            return false;
        }

        record.count += 1;
        true
    }

    /// Drop records whose window has elapsed; returns how many were removed
    pub fn sweep_expired(&self, now: Instant) -> usize {
        let before = self.records.len();
        let window = self.config.window;
        self.records
            .retain(|_, record| now.saturating_duration_since(record.window_start) <= window);
        let removed = before.saturating_sub(self.records.len());
        if removed > 0 {
            debug!(removed, "Swept expired rate limit records");
        }
        removed
    }

    /// Number of identities currently tracked
    pub fn tracked(&self) -> usize {
        self.records.len()
    }
}
