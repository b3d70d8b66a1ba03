use thiserror::Error;

/// Error taxonomy for the chat engine.
///
/// Rate-limit denials and flagged moderation results are policy outcomes carried in
/// return values, not errors; only genuine failures live here.
#[derive(Error, Debug)]
pub enum CoreError {
    #[error("input is empty")]
    EmptyInput,

    #[error("input is not in English, detected language: {0}")]
    NonEnglishInput(String),

    #[error("estimated prompt size {estimated} tokens exceeds budget of {budget}")]
    InputTooLong { estimated: usize, budget: usize },

    #[error("no choices in completion response")]
    NoChoicesResponse,

    #[error("failed to moderate text: {0}")]
    ModerationService(String),

    #[error("failed to create chat completion: {0}")]
    CompletionService(String),

    #[error("operation cancelled")]
    Cancelled,

    /// Misconfiguration. Fatal at startup, never surfaced per-request.
    #[error("config error: {0}")]
    Config(String),
}

pub type Result<T> = std::result::Result<T, CoreError>;
