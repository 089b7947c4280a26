//! Error taxonomy for the chat client.
//!
//! Everything below the CLI returns [`ChatError`]; the CLI and `main` use
//! `anyhow` on top of it and turn failures into a single line for the user.

use thiserror::Error;

#[derive(Debug, Error)]
pub enum ChatError {
    /// A profile declared a request format this client cannot speak.
    #[error("unsupported request format '{0}' (expected openai, anthropic, baidu or dashscope)")]
    UnsupportedFormat(String),

    #[error("unknown provider '{0}'")]
    UnknownProvider(String),

    #[error("message is empty")]
    EmptyMessage,

    /// HTTP 401/403, or no API key resolved for a provider that needs one.
    #[error("authentication failed for {provider}: {reason}")]
    Auth { provider: String, reason: String },

    #[error("network error: {0}")]
    Network(String),

    #[error("API error ({status}): {body}")]
    Http { status: u16, body: String },

    #[error("malformed response: {0}")]
    MalformedResponse(String),

    /// The caller aborted the stream. `partial` is what arrived before that.
    #[error("request cancelled")]
    Cancelled { partial: String },

    #[error("credential validation failed for {provider}: {reason}")]
    ValidationFailed { provider: String, reason: String },

    #[error("state storage error: {0}")]
    State(String),
}

impl ChatError {
    /// Errors the user can fix by re-entering credentials.
    pub fn is_auth(&self) -> bool {
        matches!(self, ChatError::Auth { .. })
    }
}

pub type Result<T> = std::result::Result<T, ChatError>;

impl From<reqwest::Error> for ChatError {
    fn from(err: reqwest::Error) -> Self {
        ChatError::Network(err.to_string())
    }
}
