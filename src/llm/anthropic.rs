//! Anthropic (Claude) Messages API.
//!
//! Differences from the OpenAI format:
//! - the key goes in `x-api-key`, not a bearer token
//! - system prompt, history and the new message are flattened into a single
//!   user turn
//! - `anthropic-version` comes from the profile headers

use serde::{Deserialize, Serialize};
use serde_json::Value;

use super::{HttpRequest, RequestContext};

// --- API Request Types ---

#[derive(Serialize)]
struct ApiRequest<'a> {
    model: &'a str,
    max_tokens: u32,
    temperature: f64,
    messages: [ApiMessage; 1],
    #[serde(skip_serializing_if = "Option::is_none")]
    stream: Option<bool>,
}

#[derive(Serialize)]
struct ApiMessage {
    role: &'static str,
    content: String,
}

// --- Streaming Response Types ---

#[derive(Deserialize, Debug)]
struct TextBlock {
    text: Option<String>,
}

#[derive(Deserialize, Debug)]
struct StreamFrame {
    #[serde(default)]
    content: Vec<TextBlock>,
    delta: Option<TextBlock>,
}

pub fn build_request(ctx: &RequestContext<'_>) -> HttpRequest {
    let mut extra = vec![("x-api-key", ctx.api_key.to_string())];
    if ctx.stream {
        extra.push(("Accept", "text/event-stream".to_string()));
    }
    let body = ApiRequest {
        model: &ctx.profile.model_id,
        max_tokens: ctx.max_tokens,
        temperature: ctx.profile.temperature,
        messages: [ApiMessage {
            role: "user",
            content: ctx.flattened_prompt(),
        }],
        stream: ctx.stream.then_some(true),
    };
    HttpRequest::post(ctx.url, ctx.headers_with(&extra), serde_json::json!(body))
}

/// `content[0].text`, falling back to `delta.text` as sent by
/// `content_block_delta` events.
pub fn extract_delta(frame: &Value) -> Option<String> {
    let frame = StreamFrame::deserialize(frame).ok()?;
    frame
        .content
        .into_iter()
        .next()
        .and_then(|block| block.text)
        .or_else(|| frame.delta.and_then(|d| d.text))
}
