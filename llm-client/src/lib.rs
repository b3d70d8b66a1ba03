//! # LLM provider abstraction
//!
//! Defines the [`LlmProvider`] trait and an OpenAI implementation. The engine depends
//! only on this contract: chat completion over a list of turns and a moderation pass,
//! both returning provider-neutral types. Transport details stay in the implementation.

use anyhow::Result;
use async_openai::types::{
    ChatCompletionRequestAssistantMessageArgs, ChatCompletionRequestMessage,
    ChatCompletionRequestSystemMessageArgs, ChatCompletionRequestUserMessageArgs,
};
use async_trait::async_trait;
use chat_core::{ChatRole, ChatTurn};

mod openai_provider;

pub use openai_provider::OpenAiProvider;

/// Request knobs for one completion call.
#[derive(Debug, Clone)]
pub struct CompletionParams {
    pub model: String,
    pub max_tokens: u32,
    pub temperature: f32,
    pub n: u8,
}

impl Default for CompletionParams {
    fn default() -> Self {
        Self {
            model: "gpt-3.5-turbo".to_string(),
            max_tokens: 200,
            temperature: 0.8,
            n: 1,
        }
    }
}

/// One completion choice. `truncated` is set when generation stopped for any
/// reason other than a natural stop (length cap, content filter).
#[derive(Debug, Clone)]
pub struct CompletionChoice {
    pub text: String,
    pub truncated: bool,
}

/// Moderation outcome: flagged plus the names of the violated categories.
/// Transient; categories are only ever logged.
#[derive(Debug, Clone, Default)]
pub struct ModerationVerdict {
    pub flagged: bool,
    pub categories: Vec<String>,
}

/// LLM provider interface: chat completion and content moderation.
#[async_trait]
pub trait LlmProvider: Send + Sync {
    /// Runs one chat completion over the given turns and returns the choices.
    async fn chat_completion(
        &self,
        turns: &[ChatTurn],
        params: &CompletionParams,
    ) -> Result<Vec<CompletionChoice>>;

    /// Classifies `input` against the provider's content policy.
    async fn moderate(&self, input: &str) -> Result<ModerationVerdict>;
}

/// Converts a single [`ChatTurn`] into the OpenAI request message format.
fn turn_to_openai(turn: &ChatTurn) -> Result<ChatCompletionRequestMessage> {
    let content = turn.content.clone();
    let message: ChatCompletionRequestMessage = match turn.role {
        ChatRole::System => ChatCompletionRequestSystemMessageArgs::default()
            .content(content)
            .build()?
            .into(),
        ChatRole::User => ChatCompletionRequestUserMessageArgs::default()
            .content(content)
            .build()?
            .into(),
        ChatRole::Assistant => ChatCompletionRequestAssistantMessageArgs::default()
            .content(content)
            .build()?
            .into(),
    };
    Ok(message)
}
