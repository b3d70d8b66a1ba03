//! Per-user sliding-window message limiter.
//!
//! Gate in front of any expensive work: each user gets `quota` messages per
//! trailing `window`. Timestamps are pruned lazily on access, never by a timer.

use std::collections::{HashMap, VecDeque};
use std::sync::Arc;
use std::time::Duration;

use tokio::sync::Mutex;
use tokio::time::Instant;
use tracing::debug;

/// Tracks per-user request timestamps in a trailing window.
///
/// One coarse lock per call; each operation is O(quota). A user under quota is
/// never refused.
#[derive(Clone)]
pub struct MessageLimiter {
    user_messages: Arc<Mutex<HashMap<String, VecDeque<Instant>>>>,
    quota: usize,
    window: Duration,
}

impl MessageLimiter {
    pub fn new(quota: usize, window: Duration) -> Self {
        Self {
            user_messages: Arc::new(Mutex::new(HashMap::new())),
            quota,
            window,
        }
    }

    /// Registers an inbound message for `user_id`.
    ///
    /// Prunes timestamps older than the window, then either records the message
    /// and allows it, or denies it with the time remaining until the oldest
    /// recorded message leaves the window.
    pub async fn register_message(&self, user_id: &str) -> (bool, Duration) {
        let mut users = self.user_messages.lock().await;
        let now = Instant::now();

        let timestamps = users.entry(user_id.to_string()).or_default();
        while let Some(first) = timestamps.front() {
            if now.duration_since(*first) > self.window {
                timestamps.pop_front();
            } else {
                break;
            }
        }

        if timestamps.len() < self.quota {
            timestamps.push_back(now);
            (true, Duration::ZERO)
        } else {
            let wait = match timestamps.front() {
                Some(oldest) => self.window.saturating_sub(now.duration_since(*oldest)),
                // quota of zero: nothing recorded, the full window applies
                None => self.window,
            };
            debug!(user_id = %user_id, wait_secs = wait.as_secs(), "message denied by rate limit");
            (false, wait)
        }
    }

    /// Number of users with at least one recorded timestamp.
    pub async fn tracked_users(&self) -> usize {
        self.user_messages.lock().await.len()
    }
}
