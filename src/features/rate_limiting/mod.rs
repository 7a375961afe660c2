//! # Feature: Rate Limiting
//!
//! Per-chat flood protection with a sliding window over DashMap, so a chat
//! spamming free-text messages cannot keep the parser and database busy.
//!
//! - **Version**: 2.0.0
//! - **Since**: 0.1.0
//! - **Toggleable**: false
//!
//! ## Changelog
//! - 2.0.0: Rekeyed to chat ids, synchronous check
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

    /// Record one request for `chat_id` and report whether it is allowed.
    pub fn check_rate_limit(&self, chat_id: &str) -> bool {
        let now = Instant::now();
        let mut entry = self.requests.entry(chat_id.to_string()).or_default();

        entry.retain(|&time| now.duration_since(time) < self.time_window);

        if entry.len() >= self.max_requests {
            false
        } else {
            entry.push(now);
            true
        }
    }
}
