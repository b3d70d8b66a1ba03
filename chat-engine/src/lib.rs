//! # chat-engine
//!
//! The conversation and request-management engine: per-user sliding-window rate
//! limiting, a moderation gate in front of the model, a semaphore-bounded
//! completion engine with retry/backoff, and the orchestrator that threads an
//! inbound message through all of them and the conversation cache.
//!
//! The platform gateway is an external collaborator; its contract is
//! [`ChatOrchestrator::handle_message`]. The `chatd` binary wires a console
//! stand-in for it.

pub mod completion;
pub mod config;
pub mod limiter;
pub mod moderation;
pub mod orchestrator;
pub mod retry;
pub mod runner;

pub use completion::{CompletionEngine, CompletionOutcome, ContinuationPolicy};
pub use config::EngineConfig;
pub use limiter::MessageLimiter;
pub use moderation::ModerationGate;
pub use orchestrator::{ChatOrchestrator, CANT_ANSWER_NOW_MSG, UNABLE_TO_ASSIST_MSG};
pub use retry::{RetryError, RetryPolicy};
pub use runner::{build_orchestrator, run_console};
