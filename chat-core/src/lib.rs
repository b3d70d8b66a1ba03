//! # chat-core
//!
//! Core types for the chat orchestration engine: chat roles and turns, the inbound
//! message shape, the error taxonomy, and tracing initialization. Transport-agnostic;
//! used by conversation, llm-client and chat-engine.

pub mod error;
pub mod logger;
pub mod types;

pub use error::{CoreError, Result};
pub use logger::init_tracing;
pub use types::{ChatRole, ChatTurn, IncomingMessage};
