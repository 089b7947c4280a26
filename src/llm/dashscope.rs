//! DashScope native text-generation endpoint.
//!
//! Messages are nested under `input`, sampling parameters under
//! `parameters`; streaming is switched on with the `X-DashScope-SSE` header.

use serde::{Deserialize, Serialize};
use serde_json::Value;

use super::openai_compatible::{build_messages, ApiMessage};
use super::{HttpRequest, RequestContext};

#[derive(Serialize)]
struct ApiRequest<'a> {
    model: &'a str,
    input: ApiInput<'a>,
    parameters: ApiParameters,
}

#[derive(Serialize)]
struct ApiInput<'a> {
    messages: Vec<ApiMessage<'a>>,
}

#[derive(Serialize)]
struct ApiParameters {
    temperature: f64,
    max_tokens: u32,
    top_p: f64,
}

#[derive(Deserialize, Debug)]
struct StreamFrame {
    output: Option<StreamOutput>,
}

#[derive(Deserialize, Debug)]
struct StreamOutput {
    text: Option<String>,
}

pub fn build_request(ctx: &RequestContext<'_>) -> HttpRequest {
    let mut extra = vec![("Authorization", ctx.bearer())];
    if ctx.stream {
        extra.push(("X-DashScope-SSE", "enable".to_string()));
    }
    let body = ApiRequest {
        model: &ctx.profile.model_id,
        input: ApiInput {
            messages: build_messages(ctx),
        },
        parameters: ApiParameters {
            temperature: ctx.profile.temperature,
            max_tokens: ctx.max_tokens,
            top_p: ctx.profile.top_p,
        },
    };
    HttpRequest::post(ctx.url, ctx.headers_with(&extra), serde_json::json!(body))
}

/// `output.text`
pub fn extract_delta(frame: &Value) -> Option<String> {
    StreamFrame::deserialize(frame).ok()?.output?.text
}
