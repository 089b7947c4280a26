//! OpenAI-compatible chat completions (OpenAI, Qwen compatible mode,
//! DeepSeek, Doubao, GLM, Kimi).

use serde::{Deserialize, Serialize};
use serde_json::Value;

use super::{HttpRequest, RequestContext};

// --- API Request Types (OpenAI format) ---

#[derive(Serialize)]
struct ApiRequest<'a> {
    model: &'a str,
    messages: Vec<ApiMessage<'a>>,
    temperature: f64,
    max_tokens: u32,
    top_p: f64,
    #[serde(skip_serializing_if = "Option::is_none")]
    stream: Option<bool>,
}

#[derive(Serialize)]
pub(crate) struct ApiMessage<'a> {
    role: &'a str,
    content: &'a str,
}

// --- Streaming Response Types ---

#[derive(Deserialize, Debug)]
struct StreamResponseChunk {
    #[serde(default)]
    choices: Vec<StreamChoice>,
}

#[derive(Deserialize, Debug)]
struct StreamChoice {
    delta: StreamDelta,
}

#[derive(Deserialize, Debug)]
struct StreamDelta {
    content: Option<String>,
}

/// `messages` as `[system?, ...history, user]`.
pub(crate) fn build_messages<'a>(ctx: &'a RequestContext<'a>) -> Vec<ApiMessage<'a>> {
    let mut messages = Vec::with_capacity(ctx.history.len() + 2);
    if let Some(system) = ctx.system_prompt {
        messages.push(ApiMessage {
            role: "system",
            content: system,
        });
    }
    for msg in ctx.history {
        messages.push(ApiMessage {
            role: msg.role.as_str(),
            content: &msg.content,
        });
    }
    messages.push(ApiMessage {
        role: "user",
        content: ctx.message,
    });
    messages
}

pub fn build_request(ctx: &RequestContext<'_>) -> HttpRequest {
    let mut extra = vec![("Authorization", ctx.bearer())];
    if ctx.stream {
        extra.push(("Accept", "text/event-stream".to_string()));
    }
    let body = ApiRequest {
        model: &ctx.profile.model_id,
        messages: build_messages(ctx),
        temperature: ctx.profile.temperature,
        max_tokens: ctx.max_tokens,
        top_p: ctx.profile.top_p,
        stream: ctx.stream.then_some(true),
    };
    HttpRequest::post(ctx.url, ctx.headers_with(&extra), serde_json::json!(body))
}

/// `choices[0].delta.content`
pub fn extract_delta(frame: &Value) -> Option<String> {
    let chunk = StreamResponseChunk::deserialize(frame).ok()?;
    chunk.choices.into_iter().next()?.delta.content
}
