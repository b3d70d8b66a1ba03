//! Core types: chat roles, conversation turns, and the inbound message shape.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Role of a turn within a conversation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ChatRole {
    System,
    User,
    Assistant,
}

/// One message within a conversation thread, tagged with a role.
/// Immutable once appended to a thread.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChatTurn {
    pub role: ChatRole,
    pub content: String,
}

impl ChatTurn {
    pub fn system(content: impl Into<String>) -> Self {
        Self {
            role: ChatRole::System,
            content: content.into(),
        }
    }

    pub fn user(content: impl Into<String>) -> Self {
        Self {
            role: ChatRole::User,
            content: content.into(),
        }
    }

    pub fn assistant(content: impl Into<String>) -> Self {
        Self {
            role: ChatRole::Assistant,
            content: content.into(),
        }
    }
}

/// Inbound message event as delivered by the platform gateway.
/// The engine only reads `author_id` and `text`; `channel_id` is carried for logging.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct IncomingMessage {
    pub author_id: String,
    pub text: String,
    pub channel_id: String,
    pub created_at: DateTime<Utc>,
}

impl IncomingMessage {
    pub fn new(
        author_id: impl Into<String>,
        text: impl Into<String>,
        channel_id: impl Into<String>,
    ) -> Self {
        Self {
            author_id: author_id.into(),
            text: text.into(),
            channel_id: channel_id.into(),
            created_at: Utc::now(),
        }
    }
}
