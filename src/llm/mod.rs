//! Provider adapters.
//!
//! Every backend speaks one of four wire formats. Each format is described by
//! a [`FormatAdapter`]: a pure request builder plus a pure delta extractor for
//! its streaming frames. The rest of the client never branches on the format;
//! it looks the adapter up in [`ADAPTERS`] and calls through it.
//!
//! Key concepts:
//! - **RequestContext**: everything resolved for one call (profile, key, URL,
//!   system prompt, history snapshot, new message)
//! - **HttpRequest**: a transport-agnostic description of what to send
//! - **Transport**: the seam that actually performs the I/O (see `transport`)

pub mod anthropic;
pub mod baidu;
pub mod dashscope;
pub mod openai_compatible;
pub mod sse;
pub mod stream;
pub mod transport;

use serde_json::Value;
use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;

use crate::error::{ChatError, Result};
use crate::profile::ProviderProfile;
use crate::types::Message;

/// Upper bound on `max_tokens` for credential probes.
pub const PROBE_MAX_TOKENS: u32 = 100;

// --- Request Format ---

/// The wire format a provider speaks.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum RequestFormat {
    OpenAi,
    Anthropic,
    Baidu,
    DashScope,
}

impl RequestFormat {
    pub const ALL: [RequestFormat; 4] = [
        RequestFormat::OpenAi,
        RequestFormat::Anthropic,
        RequestFormat::Baidu,
        RequestFormat::DashScope,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            RequestFormat::OpenAi => "openai",
            RequestFormat::Anthropic => "anthropic",
            RequestFormat::Baidu => "baidu",
            RequestFormat::DashScope => "dashscope",
        }
    }

    /// The strategy entry for this format.
    pub fn adapter(&self) -> &'static FormatAdapter {
        match self {
            RequestFormat::OpenAi => &ADAPTERS[0],
            RequestFormat::Anthropic => &ADAPTERS[1],
            RequestFormat::Baidu => &ADAPTERS[2],
            RequestFormat::DashScope => &ADAPTERS[3],
        }
    }
}

impl fmt::Display for RequestFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for RequestFormat {
    type Err = ChatError;

    fn from_str(s: &str) -> Result<Self> {
        RequestFormat::ALL
            .into_iter()
            .find(|f| f.as_str().eq_ignore_ascii_case(s.trim()))
            .ok_or_else(|| ChatError::UnsupportedFormat(s.to_string()))
    }
}

// --- Strategy Table ---

/// How to talk to one wire format.
pub struct FormatAdapter {
    pub format: RequestFormat,
    /// Whether chat replies arrive as an SSE stream.
    pub streams: bool,
    pub build_request: fn(&RequestContext<'_>) -> HttpRequest,
    /// Pull the text delta out of one parsed SSE frame.
    pub extract_delta: fn(&Value) -> Option<String>,
}

pub static ADAPTERS: [FormatAdapter; 4] = [
    FormatAdapter {
        format: RequestFormat::OpenAi,
        streams: true,
        build_request: openai_compatible::build_request,
        extract_delta: openai_compatible::extract_delta,
    },
    FormatAdapter {
        format: RequestFormat::Anthropic,
        streams: true,
        build_request: anthropic::build_request,
        extract_delta: anthropic::extract_delta,
    },
    FormatAdapter {
        format: RequestFormat::Baidu,
        streams: false,
        build_request: baidu::build_request,
        extract_delta: baidu::extract_delta,
    },
    FormatAdapter {
        format: RequestFormat::DashScope,
        streams: true,
        build_request: dashscope::build_request,
        extract_delta: dashscope::extract_delta,
    },
];

// --- Request Description ---

/// A fully resolved HTTP request, independent of any HTTP library.
#[derive(Debug, Clone, PartialEq)]
pub struct HttpRequest {
    pub method: reqwest::Method,
    pub url: String,
    pub headers: BTreeMap<String, String>,
    pub body: Value,
}

impl HttpRequest {
    pub fn post(url: impl Into<String>, headers: BTreeMap<String, String>, body: Value) -> Self {
        Self {
            method: reqwest::Method::POST,
            url: url.into(),
            headers,
            body,
        }
    }

    #[cfg(test)]
    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers
            .iter()
            .find(|(k, _)| k.eq_ignore_ascii_case(name))
            .map(|(_, v)| v.as_str())
    }

    /// Remove every header that carries a credential.
    fn strip_credentials(&mut self) {
        self.headers.retain(|k, _| {
            !k.eq_ignore_ascii_case("authorization") && !k.eq_ignore_ascii_case("x-api-key")
        });
    }
}

/// Everything resolved for a single call.
#[derive(Debug, Clone)]
pub struct RequestContext<'a> {
    pub profile: &'a ProviderProfile,
    pub api_key: &'a str,
    pub url: &'a str,
    pub proxy_url: Option<&'a str>,
    pub system_prompt: Option<&'a str>,
    /// Snapshot of the conversation before this message.
    pub history: &'a [Message],
    pub message: &'a str,
    pub max_tokens: u32,
    /// Ask the provider for an SSE stream (only honoured by streaming formats).
    pub stream: bool,
}

impl<'a> RequestContext<'a> {
    /// A normal chat turn with the profile's own limits.
    pub fn chat(
        profile: &'a ProviderProfile,
        api_key: &'a str,
        url: &'a str,
        system_prompt: &'a str,
        history: &'a [Message],
        message: &'a str,
    ) -> Self {
        Self {
            profile,
            api_key,
            url,
            proxy_url: None,
            system_prompt: Some(system_prompt),
            history,
            message,
            max_tokens: profile.max_tokens,
            stream: profile.request_format.adapter().streams,
        }
    }

    /// A short, non-streaming call used to check that a key works.
    pub fn probe(
        profile: &'a ProviderProfile,
        api_key: &'a str,
        url: &'a str,
        message: &'a str,
    ) -> Self {
        Self {
            profile,
            api_key,
            url,
            proxy_url: None,
            system_prompt: None,
            history: &[],
            message,
            max_tokens: profile.max_tokens.min(PROBE_MAX_TOKENS),
            stream: false,
        }
    }

    pub fn with_proxy(mut self, proxy_url: Option<&'a str>) -> Self {
        self.proxy_url = proxy_url.filter(|u| !u.trim().is_empty());
        self
    }

    /// True when the request is routed through the key-injecting proxy.
    pub fn proxied(&self) -> bool {
        self.profile.use_proxy && self.proxy_url.is_some()
    }

    /// Profile headers plus the given extras; extras win on conflict.
    fn headers_with(&self, extra: &[(&str, String)]) -> BTreeMap<String, String> {
        let mut headers = self.profile.default_headers.clone();
        for (name, value) in extra {
            headers.insert((*name).to_string(), value.clone());
        }
        headers
    }

    fn bearer(&self) -> String {
        format!("Bearer {}", self.api_key)
    }

    /// System prompt, history and the new message collapsed into one user
    /// turn, for formats that take no separate system role here.
    fn flattened_prompt(&self) -> String {
        let mut parts: Vec<String> = Vec::new();
        if let Some(system) = self.system_prompt {
            parts.push(system.to_string());
        }
        if !self.history.is_empty() {
            let transcript: Vec<String> = self
                .history
                .iter()
                .map(|m| format!("{}: {}", m.role.as_str(), m.content))
                .collect();
            parts.push(transcript.join("\n"));
        }
        if parts.is_empty() {
            return self.message.to_string();
        }
        parts.push(format!("user: {}", self.message));
        parts.join("\n\n")
    }
}

/// Build the request for `ctx`, enforcing the shared preconditions.
///
/// Fails with `EmptyMessage` for blank input and with `Auth` when no key is
/// available and the request is not proxied. In proxy mode the URL becomes
/// the proxy URL and credential headers are removed.
pub fn build_request(ctx: &RequestContext<'_>) -> Result<HttpRequest> {
    if ctx.message.trim().is_empty() {
        return Err(ChatError::EmptyMessage);
    }
    let proxied = ctx.proxied();
    if !proxied && ctx.api_key.is_empty() {
        return Err(ChatError::Auth {
            provider: ctx.profile.id.clone(),
            reason: "no API key configured".to_string(),
        });
    }

    let adapter = ctx.profile.request_format.adapter();
    let mut request = (adapter.build_request)(ctx);

    if let (true, Some(proxy)) = (proxied, ctx.proxy_url) {
        request.url = proxy.to_string();
        request.strip_credentials();
    }
    Ok(request)
}

/// Pull the reply text out of a complete (non-streaming) JSON response.
///
/// Shapes are tried in order: DashScope `output.text`, OpenAI
/// `choices[0].message.content`, Anthropic `content[0].text`, Baidu `result`.
pub fn extract_final_content(body: &Value) -> Result<String> {
    let candidates = [
        body.pointer("/output/text"),
        body.pointer("/choices/0/message/content"),
        body.pointer("/content/0/text"),
        body.get("result"),
    ];
    candidates
        .into_iter()
        .flatten()
        .find_map(|v| v.as_str().map(str::to_string))
        .ok_or_else(|| {
            ChatError::MalformedResponse("no reply text in provider response".to_string())
        })
}
