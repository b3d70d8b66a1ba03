//! Engine configuration, loaded from environment variables.

use std::env;
use std::time::Duration;

use anyhow::{Context, Result};
use llm_client::CompletionParams;

use crate::completion::ContinuationPolicy;

/// Default system prompt when `SYSTEM_PROMPT` is unset. Opaque to the engine;
/// deployments source their own.
pub const DEFAULT_SYSTEM_PROMPT: &str =
    "You are a friendly and helpful community assistant. Keep answers short and conversational.";

/// Engine configuration. `OPENAI_API_KEY` is required; everything else has a
/// default. Missing credentials fail here, at startup, never at request time.
#[derive(Debug, Clone)]
pub struct EngineConfig {
    pub openai_api_key: String,
    pub openai_base_url: Option<String>,
    pub model: String,
    pub max_tokens: u32,
    pub temperature: f32,
    /// Model context budget the prompt estimate is checked against.
    pub token_budget: usize,
    /// Concurrency gate size: the provider's concurrent-request ceiling.
    pub completion_workers: usize,
    pub completion_max_retries: usize,
    pub moderation_max_retries: usize,
    pub rate_limit_quota: usize,
    pub rate_limit_window: Duration,
    pub conversation_ttl: Duration,
    pub thread_capacity: usize,
    pub system_prompt: String,
    pub english_only: bool,
    pub continuation: ContinuationPolicy,
    pub log_file: String,
}

impl EngineConfig {
    /// Loads from environment variables. When `api_key` is given it overrides
    /// `OPENAI_API_KEY`.
    pub fn load(api_key: Option<String>) -> Result<Self> {
        let openai_api_key = match api_key {
            Some(key) => key,
            None => env::var("OPENAI_API_KEY").context("OPENAI_API_KEY not set")?,
        };
        let openai_base_url = env::var("OPENAI_BASE_URL").ok();
        let model = env::var("AI_MODEL").unwrap_or_else(|_| "gpt-3.5-turbo".to_string());
        let max_tokens = parse_env("AI_MAX_TOKENS", 200);
        let temperature = parse_env("AI_TEMPERATURE", 0.8);
        let token_budget = parse_env("AI_TOKEN_BUDGET", 4096);
        let completion_workers = parse_env("COMPLETION_WORKERS", 5);
        let completion_max_retries = parse_env("COMPLETION_MAX_RETRIES", 3);
        let moderation_max_retries = parse_env("MODERATION_MAX_RETRIES", 3);
        let rate_limit_quota = parse_env("RATE_LIMIT_QUOTA", 5);
        let rate_limit_window = Duration::from_secs(parse_env("RATE_LIMIT_WINDOW_SECS", 3 * 3600));
        let conversation_ttl = Duration::from_secs(parse_env("CONVERSATION_TTL_SECS", 24 * 3600));
        let thread_capacity = parse_env("THREAD_CAPACITY", 2);
        let system_prompt = env::var("SYSTEM_PROMPT")
            .ok()
            .filter(|s| !s.trim().is_empty())
            .unwrap_or_else(|| DEFAULT_SYSTEM_PROMPT.to_string());
        let english_only = parse_env("ENGLISH_ONLY", false);
        let continuation = if parse_env("AUTO_CONTINUE", false) {
            ContinuationPolicy::AutoContinue {
                max_rounds: parse_env("AUTO_CONTINUE_MAX_ROUNDS", 2),
            }
        } else {
            ContinuationPolicy::ReturnPartial
        };
        let log_file = env::var("LOG_FILE").unwrap_or_else(|_| "logs/chatd.log".to_string());

        Ok(Self {
            openai_api_key,
            openai_base_url,
            model,
            max_tokens,
            temperature,
            token_budget,
            completion_workers,
            completion_max_retries,
            moderation_max_retries,
            rate_limit_quota,
            rate_limit_window,
            conversation_ttl,
            thread_capacity,
            system_prompt,
            english_only,
            continuation,
            log_file,
        })
    }

    pub fn from_env() -> Result<Self> {
        Self::load(None)
    }

    pub fn completion_params(&self) -> CompletionParams {
        CompletionParams {
            model: self.model.clone(),
            max_tokens: self.max_tokens,
            temperature: self.temperature,
            n: 1,
        }
    }
}

fn parse_env<T: std::str::FromStr>(key: &str, default: T) -> T {
    env::var(key)
        .ok()
        .and_then(|s| s.parse().ok())
        .unwrap_or(default)
}
