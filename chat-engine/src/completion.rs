//! Semaphore-bounded completion engine with retry/backoff.
//!
//! At most `workers` remote calls are in flight system-wide; callers queue on the
//! semaphore and a permit is released on every exit path. Requests over the token
//! budget are rejected before any remote call.

use std::sync::Arc;

use chat_core::{ChatTurn, CoreError, Result};
use llm_client::{CompletionChoice, CompletionParams, LlmProvider};
use tokio::sync::Semaphore;
use tokio_util::sync::CancellationToken;
use tracing::{debug, instrument};

use crate::retry::{RetryError, RetryPolicy};

/// Bytes of text per estimated token. A cheap proxy, not a real tokenizer;
/// good enough for budget gating.
const BYTES_PER_TOKEN: usize = 4;

/// What to do when the model cuts a response short.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ContinuationPolicy {
    /// Return the partial text as-is, flagged as truncated.
    ReturnPartial,
    /// Re-invoke the model with the partial appended as an assistant turn,
    /// concatenating, for at most `max_rounds` extra rounds.
    AutoContinue { max_rounds: usize },
}

/// Completion result. `truncated` means the final round still did not reach a
/// natural stop.
#[derive(Debug, Clone)]
pub struct CompletionOutcome {
    pub text: String,
    pub truncated: bool,
}

/// Executes chat completions under a concurrency gate with bounded retries.
pub struct CompletionEngine {
    provider: Arc<dyn LlmProvider>,
    semaphore: Arc<Semaphore>,
    params: CompletionParams,
    token_budget: usize,
    retry: RetryPolicy,
    continuation: ContinuationPolicy,
}

/// Estimated token count of `text` (`byte length / 4`).
pub fn estimate_tokens(text: &str) -> usize {
    text.len() / BYTES_PER_TOKEN
}

impl CompletionEngine {
    pub fn new(
        provider: Arc<dyn LlmProvider>,
        workers: usize,
        params: CompletionParams,
        token_budget: usize,
        max_retries: usize,
        continuation: ContinuationPolicy,
    ) -> Self {
        Self {
            provider,
            semaphore: Arc::new(Semaphore::new(workers.max(1))),
            params,
            token_budget,
            retry: RetryPolicy::with_max_attempts(max_retries.max(1)),
            continuation,
        }
    }

    /// Runs a completion over `turns`, honoring the continuation policy.
    ///
    /// Cancellation aborts waiting for a semaphore slot, interrupts backoff
    /// sleeps, and is re-checked before every retry attempt.
    #[instrument(skip_all, fields(turn_count = turns.len()))]
    pub async fn complete(
        &self,
        turns: &[ChatTurn],
        cancel: &CancellationToken,
    ) -> Result<CompletionOutcome> {
        let estimated: usize = turns.iter().map(|t| estimate_tokens(&t.content)).sum();
        let reserved = self.params.max_tokens as usize;
        let available = self.token_budget.saturating_sub(reserved);
        if estimated > available {
            return Err(CoreError::InputTooLong {
                estimated,
                budget: available,
            });
        }

        let mut conversation = turns.to_vec();
        let mut full_text = String::new();
        let mut extra_rounds = 0usize;

        loop {
            let choice = self.request_once(&conversation, cancel).await?;
            full_text.push_str(&choice.text);

            if !choice.truncated {
                return Ok(CompletionOutcome {
                    text: full_text,
                    truncated: false,
                });
            }

            match self.continuation {
                ContinuationPolicy::ReturnPartial => {
                    return Ok(CompletionOutcome {
                        text: full_text,
                        truncated: true,
                    });
                }
                ContinuationPolicy::AutoContinue { max_rounds } => {
                    if extra_rounds >= max_rounds {
                        return Ok(CompletionOutcome {
                            text: full_text,
                            truncated: true,
                        });
                    }
                    extra_rounds += 1;
                    debug!(round = extra_rounds, "response cut short, continuing");
                    conversation.push(ChatTurn::assistant(choice.text));
                }
            }
        }
    }

    /// One remote call under the concurrency gate and retry policy.
    async fn request_once(
        &self,
        turns: &[ChatTurn],
        cancel: &CancellationToken,
    ) -> Result<CompletionChoice> {
        let choices = self
            .retry
            .run(cancel, || {
                let provider = Arc::clone(&self.provider);
                let semaphore = Arc::clone(&self.semaphore);
                let params = self.params.clone();
                let turns = turns.to_vec();
                let cancel = cancel.clone();
                async move {
                    // The permit guard releases the slot on every exit path,
                    // including errors and unwinds.
                    let _permit = tokio::select! {
                        permit = semaphore.acquire_owned() => {
                            permit.map_err(|_| anyhow::anyhow!("completion semaphore closed"))?
                        }
                        _ = cancel.cancelled() => {
                            anyhow::bail!("cancelled while waiting for a completion slot")
                        }
                    };
                    tokio::select! {
                        result = provider.chat_completion(&turns, &params) => result,
                        _ = cancel.cancelled() => {
                            anyhow::bail!("cancelled during completion call")
                        }
                    }
                }
            })
            .await
            .map_err(|err| match err {
                RetryError::Cancelled => CoreError::Cancelled,
                RetryError::Exhausted { .. } if cancel.is_cancelled() => CoreError::Cancelled,
                RetryError::Exhausted { attempts, last_error } => CoreError::CompletionService(
                    format!("after {attempts} attempts: {last_error}"),
                ),
            })?;

        choices
            .into_iter()
            .next()
            .ok_or(CoreError::NoChoicesResponse)
    }
}
