//! In-memory conversation cache with time-based eviction.
//!
//! Keyed by user id, with full-replace semantics: callers `get` a cloned record,
//! mutate it, and `put` it back. Per-user mutation is serialized by this
//! read-modify-write discipline; true same-user races are last-writer-wins.
//!
//! The eviction sweep is a cancellable periodic task: every TTL tick it snapshots
//! the key set and removes threads idle longer than the TTL, dropping a record
//! entirely when its last thread goes. Sweeping iterates the snapshot, never the
//! live map, so it cannot deadlock with concurrent `get`/`put`.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use tokio::sync::RwLock;
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info};

use crate::types::UserConversations;

/// Thread-safe store of per-user conversation records with TTL-based eviction.
#[derive(Clone)]
pub struct ConversationCache {
    entries: Arc<RwLock<HashMap<String, UserConversations>>>,
    ttl: Duration,
}

impl ConversationCache {
    /// Creates an empty cache; `ttl` is both the thread time-to-live and the
    /// sweep period.
    pub fn new(ttl: Duration) -> Self {
        Self {
            entries: Arc::new(RwLock::new(HashMap::new())),
            ttl,
        }
    }

    pub fn ttl(&self) -> Duration {
        self.ttl
    }

    /// Returns a cloned snapshot of the user's record.
    pub async fn get(&self, user_id: &str) -> Option<UserConversations> {
        self.entries.read().await.get(user_id).cloned()
    }

    /// Replaces the user's record wholesale.
    pub async fn put(&self, user_id: &str, record: UserConversations) {
        self.entries
            .write()
            .await
            .insert(user_id.to_string(), record);
    }

    pub async fn delete(&self, user_id: &str) {
        self.entries.write().await.remove(user_id);
    }

    pub async fn len(&self) -> usize {
        self.entries.read().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.len().await == 0
    }

    /// One eviction pass: removes threads idle longer than the TTL and drops
    /// records left with no threads. Returns the number of threads removed.
    pub async fn evict_expired(&self) -> usize {
        let keys: Vec<String> = self.entries.read().await.keys().cloned().collect();

        let mut evicted = 0;
        for key in keys {
            let mut entries = self.entries.write().await;
            if let Some(record) = entries.get_mut(&key) {
                let before = record.threads.len();
                record.threads.retain(|thread| !thread.is_expired(self.ttl));
                evicted += before - record.threads.len();

                if record.threads.is_empty() {
                    entries.remove(&key);
                    debug!(user_id = %key, "removed empty conversation record");
                }
            }
        }
        evicted
    }

    /// Spawns the periodic eviction sweep. Runs until `shutdown` is cancelled;
    /// the returned handle is joined by the caller so the timer never leaks.
    pub fn spawn_eviction(&self, shutdown: CancellationToken) -> JoinHandle<()> {
        let cache = self.clone();
        tokio::spawn(async move {
            let mut ticker = tokio::time::interval(cache.ttl);
            ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
            // The first tick fires immediately; a sweep at startup has nothing to do.
            ticker.tick().await;

            loop {
                tokio::select! {
                    _ = shutdown.cancelled() => {
                        debug!("eviction sweep stopped");
                        break;
                    }
                    _ = ticker.tick() => {
                        let evicted = cache.evict_expired().await;
                        if evicted > 0 {
                            let remaining = cache.len().await;
                            info!(evicted, remaining, "evicted stale conversation threads");
                        }
                    }
                }
            }
        })
    }
}
