//! Moderation gate in front of the completion engine.
//!
//! Flagged input is a policy outcome (`Ok(true)`), not an error; the orchestrator
//! turns it into a fixed "cannot assist" reply. Only service failures after the
//! retry ceiling surface as errors.

use std::sync::Arc;

use chat_core::{CoreError, Result};
use llm_client::LlmProvider;
use tokio_util::sync::CancellationToken;
use tracing::{info, instrument, warn};

use crate::retry::{RetryError, RetryPolicy};

/// Submits input text to the provider's content classifier with bounded retries.
pub struct ModerationGate {
    provider: Arc<dyn LlmProvider>,
    retry: RetryPolicy,
    english_only: bool,
}

impl ModerationGate {
    /// `english_only` enables a language pre-check that rejects input whose
    /// dominant language is not English. Policy option, off by default.
    pub fn new(provider: Arc<dyn LlmProvider>, max_retries: usize, english_only: bool) -> Self {
        Self {
            provider,
            retry: RetryPolicy::with_max_attempts(max_retries.max(1)),
            english_only,
        }
    }

    /// Classifies `input`. Returns `Ok(true)` when the classifier reports any
    /// violation category.
    #[instrument(skip_all, fields(input_len = input.len()))]
    pub async fn check(&self, input: &str, cancel: &CancellationToken) -> Result<bool> {
        if input.trim().is_empty() {
            return Err(CoreError::EmptyInput);
        }

        if self.english_only {
            if let Some(detected) = dominant_non_english(input) {
                info!(language = %detected, "rejecting non-English input");
                return Err(CoreError::NonEnglishInput(detected));
            }
        }

        let provider = Arc::clone(&self.provider);
        let verdict = self
            .retry
            .run(cancel, || {
                let provider = Arc::clone(&provider);
                let cancel = cancel.clone();
                async move {
                    tokio::select! {
                        result = provider.moderate(input) => result,
                        _ = cancel.cancelled() => {
                            anyhow::bail!("cancelled during moderation call")
                        }
                    }
                }
            })
            .await
            .map_err(|err| match err {
                RetryError::Cancelled => CoreError::Cancelled,
                RetryError::Exhausted { .. } if cancel.is_cancelled() => CoreError::Cancelled,
                RetryError::Exhausted { attempts, last_error } => CoreError::ModerationService(
                    format!("after {attempts} attempts: {last_error}"),
                ),
            })?;

        if verdict.flagged {
            warn!(categories = ?verdict.categories, "input flagged by moderation");
        }
        Ok(verdict.flagged)
    }
}

/// Returns the detected language name when the detector is confident the
/// dominant language is not English. Short or ambiguous input passes.
fn dominant_non_english(input: &str) -> Option<String> {
    match whatlang::detect(input) {
        Some(info) if info.is_reliable() && info.lang() != whatlang::Lang::Eng => {
            Some(info.lang().eng_name().to_string())
        }
        _ => None,
    }
}
