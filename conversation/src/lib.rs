//! # conversation
//!
//! Per-user conversation state: threads of chat turns with a finished flag and
//! last-activity timestamp, bounded per-user thread lists, and the TTL cache with
//! its background eviction sweep. Entirely in-memory; nothing survives restart.

pub mod cache;
pub mod types;

pub use cache::ConversationCache;
pub use types::{ConversationThread, UserConversations};
