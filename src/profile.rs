//! Provider profiles: the static description of each chat backend.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

use crate::error::{ChatError, Result};
use crate::llm::RequestFormat;

/// Id selected when nothing (or something unknown) is persisted.
pub const DEFAULT_PROVIDER_ID: &str = "qwen";

/// Everything needed to talk to one chat-completion backend.
#[derive(Debug, Clone, PartialEq)]
pub struct ProviderProfile {
    pub id: String,
    pub display_name: String,
    pub description: String,
    pub request_format: RequestFormat,
    pub endpoint_url: String,
    pub default_headers: BTreeMap<String, String>,
    pub model_id: String,
    pub temperature: f64,
    pub top_p: f64,
    pub max_tokens: u32,
    pub default_api_key: Option<String>,
    /// Requests go through the configured proxy, which injects the key.
    pub use_proxy: bool,
}

/// A profile as written in `config.toml` under `[[providers]]`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProfileDef {
    pub id: String,
    pub name: String,
    #[serde(default)]
    pub description: String,
    pub request_format: String,
    pub api_url: String,
    pub model: String,
    #[serde(default)]
    pub headers: BTreeMap<String, String>,
    #[serde(default = "default_temperature")]
    pub temperature: f64,
    #[serde(default = "default_top_p")]
    pub top_p: f64,
    #[serde(default = "default_max_tokens")]
    pub max_tokens: u32,
    #[serde(default)]
    pub default_api_key: Option<String>,
    #[serde(default)]
    pub use_proxy: bool,
}

fn default_temperature() -> f64 {
    0.7
}

fn default_top_p() -> f64 {
    0.95
}

fn default_max_tokens() -> u32 {
    1024
}

impl TryFrom<ProfileDef> for ProviderProfile {
    type Error = ChatError;

    fn try_from(def: ProfileDef) -> Result<Self> {
        let request_format = def.request_format.parse()?;
        let mut default_headers = def.headers;
        default_headers
            .entry("Content-Type".to_string())
            .or_insert_with(|| "application/json".to_string());
        Ok(Self {
            id: def.id,
            display_name: def.name,
            description: def.description,
            request_format,
            endpoint_url: def.api_url,
            default_headers,
            model_id: def.model,
            temperature: def.temperature,
            top_p: def.top_p,
            max_tokens: def.max_tokens,
            default_api_key: def.default_api_key.filter(|k| !k.is_empty()),
            use_proxy: def.use_proxy,
        })
    }
}

fn json_headers() -> BTreeMap<String, String> {
    BTreeMap::from([("Content-Type".to_string(), "application/json".to_string())])
}

#[allow(clippy::too_many_arguments)]
fn builtin(
    id: &str,
    name: &str,
    description: &str,
    request_format: RequestFormat,
    endpoint_url: &str,
    model_id: &str,
    top_p: f64,
    default_headers: BTreeMap<String, String>,
) -> ProviderProfile {
    ProviderProfile {
        id: id.to_string(),
        display_name: name.to_string(),
        description: description.to_string(),
        request_format,
        endpoint_url: endpoint_url.to_string(),
        default_headers,
        model_id: model_id.to_string(),
        temperature: 0.7,
        top_p,
        max_tokens: 1024,
        default_api_key: None,
        use_proxy: false,
    }
}

/// The built-in provider table, in display order.
pub fn builtin_profiles() -> Vec<ProviderProfile> {
    let mut anthropic_headers = json_headers();
    anthropic_headers.insert("anthropic-version".to_string(), "2023-06-01".to_string());

    vec![
        builtin(
            "qwen",
            "Qwen3-Max",
            "Alibaba Qwen, OpenAI-compatible mode",
            RequestFormat::OpenAi,
            "https://dashscope.aliyuncs.com/compatible-mode/v1/chat/completions",
            "qwen3-max",
            0.9,
            json_headers(),
        ),
        builtin(
            "openai",
            "OpenAI",
            "OpenAI Chat Completions",
            RequestFormat::OpenAi,
            "https://api.openai.com/v1/chat/completions",
            "gpt-4o-mini",
            0.95,
            json_headers(),
        ),
        builtin(
            "claude",
            "Claude",
            "Anthropic Claude Messages (SSE)",
            RequestFormat::Anthropic,
            "https://api.anthropic.com/v1/messages",
            "claude-3-5-sonnet-20241022",
            0.95,
            anthropic_headers,
        ),
        builtin(
            "doubao",
            "Doubao",
            "ByteDance Doubao, OpenAI-compatible",
            RequestFormat::OpenAi,
            "https://ark.cn-beijing.volces.com/api/v3/chat/completions",
            "doubao-pro-32k",
            0.95,
            json_headers(),
        ),
        builtin(
            "deepseek",
            "DeepSeek",
            "DeepSeek, OpenAI-compatible",
            RequestFormat::OpenAi,
            "https://api.deepseek.com/v1/chat/completions",
            "deepseek-chat",
            0.95,
            json_headers(),
        ),
        builtin(
            "chatglm",
            "ChatGLM",
            "Zhipu GLM, OpenAI-compatible",
            RequestFormat::OpenAi,
            "https://open.bigmodel.cn/api/paas/v4/chat/completions",
            "glm-4",
            0.95,
            json_headers(),
        ),
        builtin(
            "kimi",
            "Kimi",
            "Moonshot Kimi, OpenAI-compatible",
            RequestFormat::OpenAi,
            "https://api.moonshot.cn/v1/chat/completions",
            "moonshot-v1-8k",
            0.95,
            json_headers(),
        ),
        builtin(
            "dashscope",
            "DashScope",
            "Alibaba DashScope native text generation (SSE)",
            RequestFormat::DashScope,
            "https://dashscope.aliyuncs.com/api/v1/services/aigc/text-generation/generation",
            "qwen-plus",
            0.9,
            json_headers(),
        ),
        builtin(
            "ernie",
            "ERNIE",
            "Baidu ERNIE chat (non-streaming)",
            RequestFormat::Baidu,
            "https://aip.baidubce.com/rpc/2.0/ai_custom/v1/wenxinworkshop/chat/completions",
            "ernie-4.0",
            0.95,
            json_headers(),
        ),
    ]
}
