//! Shared mock LLM provider for handler-level tests: no network, scripted
//! behavior, atomic counters for call and concurrency assertions.

#![allow(dead_code)]

use std::collections::VecDeque;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Mutex;
use std::time::Duration;

use async_trait::async_trait;
use chat_core::ChatTurn;
use llm_client::{CompletionChoice, CompletionParams, LlmProvider, ModerationVerdict};

pub const DEFAULT_REPLY: &str = "mock response";

/// One scripted completion outcome, consumed per call. When the script runs
/// dry, calls reply with [`DEFAULT_REPLY`] at a natural stop.
pub enum CompletionStep {
    Reply(&'static str),
    Truncated(&'static str),
    Fail(&'static str),
    NoChoices,
}

#[derive(Default)]
pub struct MockProvider {
    pub completion_calls: AtomicUsize,
    pub moderation_calls: AtomicUsize,
    in_flight: AtomicUsize,
    pub peak_in_flight: AtomicUsize,
    completion_script: Mutex<VecDeque<CompletionStep>>,
    moderation_failures: AtomicUsize,
    flag_input: AtomicBool,
    call_delay_ms: AtomicUsize,
    /// Turns of the most recent completion request.
    pub last_request: Mutex<Vec<ChatTurn>>,
}

impl MockProvider {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_completion_script(self, steps: Vec<CompletionStep>) -> Self {
        *self.completion_script.lock().unwrap() = steps.into();
        self
    }

    /// Fail this many moderation calls before succeeding.
    pub fn with_moderation_failures(self, failures: usize) -> Self {
        self.moderation_failures.store(failures, Ordering::SeqCst);
        self
    }

    pub fn flagging_input(self) -> Self {
        self.flag_input.store(true, Ordering::SeqCst);
        self
    }

    /// Make every completion call hold its slot for this long.
    pub fn with_call_delay(self, delay: Duration) -> Self {
        self.call_delay_ms
            .store(delay.as_millis() as usize, Ordering::SeqCst);
        self
    }

    pub fn completion_call_count(&self) -> usize {
        self.completion_calls.load(Ordering::SeqCst)
    }

    pub fn moderation_call_count(&self) -> usize {
        self.moderation_calls.load(Ordering::SeqCst)
    }

    pub fn peak_concurrency(&self) -> usize {
        self.peak_in_flight.load(Ordering::SeqCst)
    }

    pub fn last_request_turns(&self) -> Vec<ChatTurn> {
        self.last_request.lock().unwrap().clone()
    }
}

#[async_trait]
impl LlmProvider for MockProvider {
    async fn chat_completion(
        &self,
        turns: &[ChatTurn],
        _params: &CompletionParams,
    ) -> anyhow::Result<Vec<CompletionChoice>> {
        self.completion_calls.fetch_add(1, Ordering::SeqCst);
        let now = self.in_flight.fetch_add(1, Ordering::SeqCst) + 1;
        self.peak_in_flight.fetch_max(now, Ordering::SeqCst);

        *self.last_request.lock().unwrap() = turns.to_vec();
        let step = self.completion_script.lock().unwrap().pop_front();

        let delay_ms = self.call_delay_ms.load(Ordering::SeqCst);
        if delay_ms > 0 {
            tokio::time::sleep(Duration::from_millis(delay_ms as u64)).await;
        }
        self.in_flight.fetch_sub(1, Ordering::SeqCst);

        match step {
            None => Ok(vec![CompletionChoice {
                text: DEFAULT_REPLY.to_string(),
                truncated: false,
            }]),
            Some(CompletionStep::Reply(text)) => Ok(vec![CompletionChoice {
                text: text.to_string(),
                truncated: false,
            }]),
            Some(CompletionStep::Truncated(text)) => Ok(vec![CompletionChoice {
                text: text.to_string(),
                truncated: true,
            }]),
            Some(CompletionStep::Fail(message)) => anyhow::bail!("{}", message),
            Some(CompletionStep::NoChoices) => Ok(vec![]),
        }
    }

    async fn moderate(&self, _input: &str) -> anyhow::Result<ModerationVerdict> {
        self.moderation_calls.fetch_add(1, Ordering::SeqCst);

        if self.moderation_failures.load(Ordering::SeqCst) > 0 {
            self.moderation_failures.fetch_sub(1, Ordering::SeqCst);
            anyhow::bail!("moderation service unavailable");
        }

        let flagged = self.flag_input.load(Ordering::SeqCst);
        Ok(ModerationVerdict {
            flagged,
            categories: if flagged {
                vec!["violence".to_string()]
            } else {
                Vec::new()
            },
        })
    }
}
