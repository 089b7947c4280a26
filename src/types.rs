//! Core data types shared by the chat session and the provider adapters.

use chrono::{DateTime, Local};
use serde::{Deserialize, Serialize};

// --- Message Roles ---

/// The role of a message in the conversation.
///
/// - `System`: instructions to the model (the active prompt template)
/// - `User`: the human's input
/// - `Assistant`: the model's reply
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    System,
    User,
    Assistant,
}

impl Role {
    pub fn as_str(&self) -> &'static str {
        match self {
            Role::System => "system",
            Role::User => "user",
            Role::Assistant => "assistant",
        }
    }
}

// --- Messages ---

/// A single message in the conversation history.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Message {
    pub role: Role,
    pub content: String,
    pub timestamp: DateTime<Local>,
}

impl Message {
    fn new(role: Role, content: impl Into<String>) -> Self {
        Self {
            role,
            content: content.into(),
            timestamp: Local::now(),
        }
    }

    /// Create a user message.
    pub fn user(content: impl Into<String>) -> Self {
        Self::new(Role::User, content)
    }

    /// Create an assistant message.
    pub fn assistant(content: impl Into<String>) -> Self {
        Self::new(Role::Assistant, content)
    }
}

// --- Stream Accumulator ---

/// Per-request streaming state.
///
/// `buffer` holds the trailing bytes of a line that has not been terminated
/// yet; `full_content` is every delta decoded so far, in order.
#[derive(Debug, Default)]
pub struct StreamAccumulator {
    pub buffer: Vec<u8>,
    pub full_content: String,
}

impl StreamAccumulator {
    /// Append a decoded delta. Empty deltas are ignored.
    pub fn push_delta(&mut self, delta: &str) -> bool {
        if delta.is_empty() {
            return false;
        }
        self.full_content.push_str(delta);
        true
    }
}
