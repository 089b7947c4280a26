//! Baidu ERNIE chat. Non-streaming; the model is selected by the endpoint
//! URL, so the body carries no model field.

use serde::Serialize;
use serde_json::Value;

use super::{HttpRequest, RequestContext};

#[derive(Serialize)]
struct ApiRequest {
    messages: [ApiMessage; 1],
    temperature: f64,
    top_p: f64,
}

#[derive(Serialize)]
struct ApiMessage {
    role: &'static str,
    content: String,
}

pub fn build_request(ctx: &RequestContext<'_>) -> HttpRequest {
    let body = ApiRequest {
        messages: [ApiMessage {
            role: "user",
            content: ctx.flattened_prompt(),
        }],
        temperature: ctx.profile.temperature,
        top_p: ctx.profile.top_p,
    };
    HttpRequest::post(
        ctx.url,
        ctx.headers_with(&[("Authorization", ctx.bearer())]),
        serde_json::json!(body),
    )
}

/// Baidu replies are read whole, never as frames.
pub fn extract_delta(_frame: &Value) -> Option<String> {
    None
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::llm::test_support::profile;
    use serde_json::json;

    #[test]
    fn test_body_has_no_stream_flag() {
        let p = profile("ernie");
        let ctx = RequestContext::chat(&p, "bk", &p.endpoint_url, "SYS", &[], "hello");
        assert!(!ctx.stream);
        let req = build_request(&ctx);
        assert_eq!(req.header("Authorization"), Some("Bearer bk"));
        assert_eq!(
            req.body,
            json!({
                "messages": [{"role": "user", "content": "SYS\n\nuser: hello"}],
                "temperature": p.temperature,
                "top_p": p.top_p
            })
        );
    }
}
