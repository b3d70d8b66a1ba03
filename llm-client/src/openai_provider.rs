//! OpenAI-backed [`LlmProvider`]: wraps async-openai for completion and moderation.

use std::sync::Arc;

use anyhow::{Context, Result};
use async_openai::types::{
    CreateChatCompletionRequestArgs, CreateModerationRequestArgs, FinishReason,
};
use async_openai::Client;
use async_trait::async_trait;
use chat_core::ChatTurn;
use tracing::instrument;

use crate::{turn_to_openai, CompletionChoice, CompletionParams, LlmProvider, ModerationVerdict};

/// LLM provider backed by the OpenAI API.
#[derive(Clone)]
pub struct OpenAiProvider {
    client: Arc<Client<async_openai::config::OpenAIConfig>>,
}

impl OpenAiProvider {
    /// Creates a provider from an API key. An empty key is a configuration
    /// error and fails here, at construction, not at request time.
    pub fn new(api_key: impl Into<String>) -> Result<Self> {
        let api_key = api_key.into();
        if api_key.trim().is_empty() {
            anyhow::bail!("OpenAI API key is empty");
        }
        let config = async_openai::config::OpenAIConfig::new().with_api_key(api_key);
        Ok(Self {
            client: Arc::new(Client::with_config(config)),
        })
    }

    /// Same as [`OpenAiProvider::new`] with a non-default API base URL
    /// (proxies, mock servers).
    pub fn with_base_url(api_key: impl Into<String>, base_url: impl Into<String>) -> Result<Self> {
        let api_key = api_key.into();
        if api_key.trim().is_empty() {
            anyhow::bail!("OpenAI API key is empty");
        }
        let config = async_openai::config::OpenAIConfig::new()
            .with_api_key(api_key)
            .with_api_base(base_url.into());
        Ok(Self {
            client: Arc::new(Client::with_config(config)),
        })
    }
}

#[async_trait]
impl LlmProvider for OpenAiProvider {
    #[instrument(skip_all, fields(turn_count = turns.len(), model = %params.model))]
    async fn chat_completion(
        &self,
        turns: &[ChatTurn],
        params: &CompletionParams,
    ) -> Result<Vec<CompletionChoice>> {
        let mut messages = Vec::with_capacity(turns.len());
        for turn in turns {
            messages.push(turn_to_openai(turn)?);
        }

        #[allow(deprecated)]
        let request = CreateChatCompletionRequestArgs::default()
            .model(&params.model)
            .messages(messages)
            .max_tokens(params.max_tokens)
            .n(params.n)
            .temperature(params.temperature)
            .build()?;

        let response = self
            .client
            .chat()
            .create(request)
            .await
            .context("chat completion request failed")?;

        let choices = response
            .choices
            .into_iter()
            .map(|choice| CompletionChoice {
                text: choice.message.content.unwrap_or_default(),
                truncated: choice.finish_reason != Some(FinishReason::Stop),
            })
            .collect();
        Ok(choices)
    }

    #[instrument(skip_all, fields(input_len = input.len()))]
    async fn moderate(&self, input: &str) -> Result<ModerationVerdict> {
        let request = CreateModerationRequestArgs::default()
            .input(input.to_string())
            .build()?;

        let response = self
            .client
            .moderations()
            .create(request)
            .await
            .context("moderation request failed")?;

        let result = response
            .results
            .into_iter()
            .next()
            .context("no results in moderation response")?;

        Ok(ModerationVerdict {
            flagged: result.flagged,
            categories: flagged_category_names(&result.categories),
        })
    }
}

/// Names of the categories the classifier reports as violated. The category set
/// is provider-defined, so it is read from the serialized form instead of being
/// enumerated field by field.
fn flagged_category_names<T: serde::Serialize>(categories: &T) -> Vec<String> {
    serde_json::to_value(categories)
        .ok()
        .and_then(|value| {
            value.as_object().map(|fields| {
                fields
                    .iter()
                    .filter(|(_, flagged)| flagged.as_bool().unwrap_or(false))
                    .map(|(name, _)| name.clone())
                    .collect()
            })
        })
        .unwrap_or_default()
}
