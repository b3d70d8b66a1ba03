//! Orchestrates one inbound message through rate limiting, moderation, the
//! conversation cache, and the completion engine.
//!
//! Every step failure is local and recoverable: the caller always gets a
//! user-safe string back; raw provider errors go to the logs only.

use chat_core::ChatTurn;
use conversation::ConversationCache;
use tokio_util::sync::CancellationToken;
use tracing::{error, info, instrument};

use crate::completion::CompletionEngine;
use crate::limiter::MessageLimiter;
use crate::moderation::ModerationGate;

pub const UNABLE_TO_ASSIST_MSG: &str = "I'm sorry, but I'm not able to assist at this time.";
pub const CANT_ANSWER_NOW_MSG: &str = "Sorry, I can't answer that question right now.";

/// Composition root for message handling: rate check, moderation, thread
/// selection, completion, persistence.
pub struct ChatOrchestrator {
    limiter: MessageLimiter,
    gate: ModerationGate,
    cache: ConversationCache,
    engine: CompletionEngine,
    system_prompt: String,
    thread_capacity: usize,
}

impl ChatOrchestrator {
    pub fn new(
        limiter: MessageLimiter,
        gate: ModerationGate,
        cache: ConversationCache,
        engine: CompletionEngine,
        system_prompt: impl Into<String>,
        thread_capacity: usize,
    ) -> Self {
        Self {
            limiter,
            gate,
            cache,
            engine,
            system_prompt: system_prompt.into(),
            thread_capacity,
        }
    }

    /// Handles one inbound message and returns the reply text.
    pub async fn handle_message(&self, author_id: &str, text: &str) -> String {
        self.handle_message_with_cancel(author_id, text, &CancellationToken::new())
            .await
    }

    /// Same as [`handle_message`](Self::handle_message) with a caller-supplied
    /// cancellation token; cancellation aborts queueing and in-flight calls.
    #[instrument(skip_all, fields(user_id = %author_id))]
    pub async fn handle_message_with_cancel(
        &self,
        author_id: &str,
        text: &str,
        cancel: &CancellationToken,
    ) -> String {
        let (allowed, wait) = self.limiter.register_message(author_id).await;
        if !allowed {
            let minutes = (wait.as_secs_f64() / 60.0).round() as u64;
            info!(wait_minutes = minutes, "message denied by rate limit");
            return format!("Sorry, you can ask another question in {minutes} minutes");
        }

        match self.gate.check(text, cancel).await {
            Ok(true) => {
                info!("input flagged, refusing to answer");
                return UNABLE_TO_ASSIST_MSG.to_string();
            }
            Ok(false) => {}
            Err(e) => {
                error!(error = %e, "moderation check failed");
                return CANT_ANSWER_NOW_MSG.to_string();
            }
        }

        let mut record = self.cache.get(author_id).await.unwrap_or_default();
        let turns = {
            let thread = record.active_or_start(&self.system_prompt, self.thread_capacity);
            thread.push_turn(ChatTurn::user(text));
            thread.turns.clone()
        };

        match self.engine.complete(&turns, cancel).await {
            Ok(outcome) => {
                if let Some(thread) = record.threads.last_mut() {
                    thread.push_turn(ChatTurn::assistant(outcome.text.clone()));
                    thread.finished = outcome.truncated;
                }
                self.cache.put(author_id, record).await;
                outcome.text
            }
            Err(e) => {
                // The user turn is not persisted on failure; the next message
                // sees the thread as it was before this one.
                error!(error = %e, "failed to generate completion");
                CANT_ANSWER_NOW_MSG.to_string()
            }
        }
    }
}
