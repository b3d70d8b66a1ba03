//! Component wiring and the console loop that stands in for a platform gateway.

use std::sync::Arc;

use anyhow::Result;
use chat_core::IncomingMessage;
use conversation::ConversationCache;
use llm_client::{LlmProvider, OpenAiProvider};
use tokio::io::{AsyncBufReadExt, BufReader};
use tokio_util::sync::CancellationToken;
use tracing::info;

use crate::completion::CompletionEngine;
use crate::config::EngineConfig;
use crate::limiter::MessageLimiter;
use crate::moderation::ModerationGate;
use crate::orchestrator::ChatOrchestrator;

/// Builds the orchestrator and its cache from config. The cache is returned
/// separately so the caller owns the eviction sweep lifecycle.
pub fn build_orchestrator(
    config: &EngineConfig,
) -> Result<(Arc<ChatOrchestrator>, ConversationCache)> {
    let provider: Arc<dyn LlmProvider> = match &config.openai_base_url {
        Some(base_url) => Arc::new(OpenAiProvider::with_base_url(
            config.openai_api_key.clone(),
            base_url.clone(),
        )?),
        None => Arc::new(OpenAiProvider::new(config.openai_api_key.clone())?),
    };

    let limiter = MessageLimiter::new(config.rate_limit_quota, config.rate_limit_window);
    let cache = ConversationCache::new(config.conversation_ttl);
    let gate = ModerationGate::new(
        Arc::clone(&provider),
        config.moderation_max_retries,
        config.english_only,
    );
    let engine = CompletionEngine::new(
        provider,
        config.completion_workers,
        config.completion_params(),
        config.token_budget,
        config.completion_max_retries,
        config.continuation,
    );

    let orchestrator = Arc::new(ChatOrchestrator::new(
        limiter,
        gate,
        cache.clone(),
        engine,
        config.system_prompt.clone(),
        config.thread_capacity,
    ));
    Ok((orchestrator, cache))
}

/// Runs the engine behind a line-oriented console: `user_id: text` per line
/// (bare text maps to the `local` user). Stops on EOF or Ctrl-C; shutdown
/// cancels the eviction sweep and joins it.
pub async fn run_console(config: EngineConfig) -> Result<()> {
    let (orchestrator, cache) = build_orchestrator(&config)?;

    let shutdown = CancellationToken::new();
    let sweep = cache.spawn_eviction(shutdown.clone());

    info!(
        model = %config.model,
        workers = config.completion_workers,
        quota = config.rate_limit_quota,
        "engine ready, reading messages from stdin"
    );

    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    loop {
        tokio::select! {
            _ = tokio::signal::ctrl_c() => {
                info!("interrupt received, shutting down");
                break;
            }
            line = lines.next_line() => {
                match line? {
                    Some(line) => {
                        let line = line.trim();
                        if line.is_empty() {
                            continue;
                        }
                        let (user, text) = match line.split_once(':') {
                            Some((user, text))
                                if !user.trim().is_empty() && !user.trim().contains(' ') =>
                            {
                                (user.trim(), text.trim())
                            }
                            _ => ("local", line),
                        };
                        let event = IncomingMessage::new(user, text, "console");
                        let response = orchestrator
                            .handle_message(&event.author_id, &event.text)
                            .await;
                        println!("{response}");
                    }
                    None => break,
                }
            }
        }
    }

    shutdown.cancel();
    sweep.await?;
    Ok(())
}
