//! Reusable retry-with-backoff policy for remote calls.
//!
//! One policy type, parameterized per call site: attempt ceiling, exponential
//! backoff schedule, and a floor for provider-suggested delays. Rate-limit
//! errors carry a suggested retry delay in their text (numeric milliseconds);
//! that hint wins over the exponential schedule but never drops below the floor.

use std::sync::OnceLock;
use std::time::Duration;

use regex::Regex;
use tokio_util::sync::CancellationToken;
use tracing::warn;

/// Terminal outcome of a retried operation.
#[derive(Debug, thiserror::Error)]
pub enum RetryError {
    #[error("failed after {attempts} attempts: {last_error}")]
    Exhausted {
        attempts: usize,
        last_error: anyhow::Error,
    },

    #[error("operation cancelled")]
    Cancelled,
}

/// Retry policy: bounded attempts with exponential backoff.
#[derive(Debug, Clone)]
pub struct RetryPolicy {
    pub max_attempts: usize,
    pub base_delay: Duration,
    pub max_delay: Duration,
    /// Minimum sleep when the provider suggests its own retry delay.
    pub rate_limit_floor: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: 3,
            base_delay: Duration::from_millis(500),
            max_delay: Duration::from_secs(30),
            rate_limit_floor: Duration::from_secs(1),
        }
    }
}

impl RetryPolicy {
    pub fn with_max_attempts(max_attempts: usize) -> Self {
        Self {
            max_attempts,
            ..Self::default()
        }
    }

    /// Runs `op` until it succeeds, the attempt ceiling is hit, or `cancel`
    /// fires. Cancellation is checked before every attempt and interrupts
    /// backoff sleeps.
    pub async fn run<T, F, Fut>(&self, cancel: &CancellationToken, mut op: F) -> Result<T, RetryError>
    where
        F: FnMut() -> Fut,
        Fut: std::future::Future<Output = anyhow::Result<T>>,
    {
        let mut last_error = None;

        for attempt in 0..self.max_attempts {
            if cancel.is_cancelled() {
                return Err(RetryError::Cancelled);
            }

            match op().await {
                Ok(value) => return Ok(value),
                Err(err) => {
                    let delay = self.delay_for(&err, attempt);
                    warn!(
                        attempt = attempt + 1,
                        max_attempts = self.max_attempts,
                        delay_ms = delay.as_millis() as u64,
                        error = %err,
                        "attempt failed, backing off"
                    );
                    last_error = Some(err);

                    if attempt + 1 < self.max_attempts {
                        tokio::select! {
                            _ = cancel.cancelled() => return Err(RetryError::Cancelled),
                            _ = tokio::time::sleep(delay) => {}
                        }
                    }
                }
            }
        }

        Err(RetryError::Exhausted {
            attempts: self.max_attempts,
            last_error: last_error
                .unwrap_or_else(|| anyhow::anyhow!("retry policy ran zero attempts")),
        })
    }

    fn delay_for(&self, err: &anyhow::Error, attempt: usize) -> Duration {
        if let Some(hint) = suggested_delay(&err.to_string()) {
            return hint.max(self.rate_limit_floor);
        }
        let exp = self
            .base_delay
            .saturating_mul(2u32.saturating_pow(attempt as u32));
        exp.min(self.max_delay)
    }
}

/// Extracts the retry delay a rate-limit error suggests, if any.
/// Only rate-limit-shaped errors are inspected; the hint is the first
/// "`N ms`" figure in the message.
pub fn suggested_delay(error_text: &str) -> Option<Duration> {
    static MS_PATTERN: OnceLock<Regex> = OnceLock::new();

    let lowered = error_text.to_ascii_lowercase();
    if !lowered.contains("rate limit") && !lowered.contains("429") {
        return None;
    }

    let pattern = MS_PATTERN.get_or_init(|| Regex::new(r"(\d+)\s*ms").expect("valid pattern"));
    pattern
        .captures(&lowered)
        .and_then(|caps| caps.get(1))
        .and_then(|m| m.as_str().parse::<u64>().ok())
        .map(Duration::from_millis)
}
