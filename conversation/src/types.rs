//! Conversation threads and the bounded per-user thread list.

use std::time::Duration;

use chat_core::{ChatRole, ChatTurn};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// One continuous exchange of turns between a user and the model.
///
/// Turns are insertion-ordered and never reordered or removed; a thread goes away
/// only as a whole, via capacity or TTL eviction. `finished` marks a thread the
/// model considers complete; the next message then starts a fresh thread.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ConversationThread {
    pub id: Uuid,
    pub turns: Vec<ChatTurn>,
    pub finished: bool,
    pub last_activity: DateTime<Utc>,
}

impl ConversationThread {
    /// Starts a new thread seeded with the system prompt as its first turn.
    /// The system prompt is inserted exactly once here and never re-inserted.
    pub fn new(system_prompt: &str) -> Self {
        Self {
            id: Uuid::new_v4(),
            turns: vec![ChatTurn::system(system_prompt)],
            finished: false,
            last_activity: Utc::now(),
        }
    }

    /// Appends a turn and refreshes `last_activity`.
    pub fn push_turn(&mut self, turn: ChatTurn) {
        self.turns.push(turn);
        self.last_activity = Utc::now();
    }

    /// True when the last activity is older than `ttl`.
    pub fn is_expired(&self, ttl: Duration) -> bool {
        Utc::now()
            .signed_duration_since(self.last_activity)
            .to_std()
            .map(|age| age > ttl)
            .unwrap_or(false)
    }

    /// True when the thread has any non-system turns.
    pub fn has_dialogue(&self) -> bool {
        self.turns.iter().any(|t| t.role != ChatRole::System)
    }
}

/// Bounded, ordered list of a user's conversation threads, most recent last.
///
/// Owned by the cache and moved through it with full-replace semantics: callers
/// `get` a clone, mutate, and `put` it back.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct UserConversations {
    pub threads: Vec<ConversationThread>,
}

impl UserConversations {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn is_empty(&self) -> bool {
        self.threads.is_empty()
    }

    /// The last thread in the list is the active one; anything before it is history.
    pub fn active_thread(&self) -> Option<&ConversationThread> {
        self.threads.last()
    }

    /// Returns the active thread, starting a new one when there is none, the last
    /// one has no turns, or it is marked finished. Starting a thread beyond
    /// `capacity` evicts the oldest (FIFO).
    pub fn active_or_start(&mut self, system_prompt: &str, capacity: usize) -> &mut ConversationThread {
        let needs_new = match self.threads.last() {
            Some(thread) => thread.finished || thread.turns.is_empty(),
            None => true,
        };

        if needs_new {
            self.threads.push(ConversationThread::new(system_prompt));
            while self.threads.len() > capacity.max(1) {
                self.threads.remove(0);
            }
        }

        self.threads.last_mut().expect("thread list non-empty after start")
    }
}
