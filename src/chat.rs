//! Chat session: the conversation plus send/validate orchestration.
//!
//! ```text
//! user text ──> ConfigStore (provider, key, URL)
//!                   │
//!                   v
//!          build_request (format adapter)
//!                   │
//!                   v
//!              Transport ──> SSE decoder ──> on_chunk(delta)
//!                   │
//!                   v
//!          history += [user, assistant]
//! ```
//!
//! History is snapshotted into the request and only extended once the reply
//! has completed, so a failed or cancelled turn leaves it untouched.

use std::sync::Arc;
use std::time::Duration;
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};

use crate::error::{ChatError, Result};
use crate::llm::stream::{decode_stream, ensure_success, read_json};
use crate::llm::transport::{HttpResponse, Transport};
use crate::llm::{build_request, HttpRequest, RequestContext};
use crate::profile::ProviderProfile;
use crate::store::{ConfigStore, CredentialInput};
use crate::templates::PromptTemplate;
use crate::types::Message;

/// Message sent when probing a provider's credentials.
const PROBE_MESSAGE: &str = "hello";

const DEFAULT_READ_TIMEOUT: Duration = Duration::from_secs(60);

pub struct ChatSession {
    store: ConfigStore,
    transport: Arc<dyn Transport>,
    template: PromptTemplate,
    messages: Vec<Message>,
    read_timeout: Duration,
}

impl ChatSession {
    pub fn new(store: ConfigStore, transport: Arc<dyn Transport>, template: PromptTemplate) -> Self {
        Self {
            store,
            transport,
            template,
            messages: Vec::new(),
            read_timeout: DEFAULT_READ_TIMEOUT,
        }
    }

    /// Longest wait for response headers or for the next body chunk.
    pub fn with_read_timeout(mut self, timeout: Duration) -> Self {
        self.read_timeout = timeout;
        self
    }

    pub fn store(&self) -> &ConfigStore {
        &self.store
    }

    pub fn store_mut(&mut self) -> &mut ConfigStore {
        &mut self.store
    }

    pub fn template(&self) -> PromptTemplate {
        self.template
    }

    pub fn set_template(&mut self, template: PromptTemplate) {
        self.template = template;
    }

    /// Completed turns, oldest first.
    pub fn history(&self) -> &[Message] {
        &self.messages
    }

    pub fn clear_history(&mut self) {
        self.messages.clear();
    }

    /// Send `text` to the selected provider and return the full reply.
    ///
    /// Streaming providers call `on_chunk` once per delta; non-streaming
    /// ones call it once with the whole reply. `&mut self` keeps a session to
    /// one request at a time.
    pub async fn send_message<F>(
        &mut self,
        text: &str,
        on_chunk: &mut F,
        cancel: &CancellationToken,
    ) -> Result<String>
    where
        F: FnMut(&str) + ?Sized,
    {
        let text = text.trim();
        if text.is_empty() {
            return Err(ChatError::EmptyMessage);
        }

        let profile = self.store.selected_profile().clone();
        let api_key = self.store.current_api_key();
        let api_url = self.store.current_api_url();
        let ctx = RequestContext::chat(
            &profile,
            &api_key,
            &api_url,
            self.template.system_prompt(),
            &self.messages,
            text,
        )
        .with_proxy(self.store.proxy_url());
        let streaming = ctx.stream;
        let request = build_request(&ctx)?;

        info!(
            provider = %profile.id,
            format = %profile.request_format,
            history = self.messages.len(),
            proxied = ctx.proxied(),
            "sending chat request"
        );
        let reply = self
            .execute(&request, &profile, streaming, on_chunk, cancel)
            .await?;

        self.messages.push(Message::user(text));
        self.messages.push(Message::assistant(reply.clone()));
        Ok(reply)
    }

    async fn execute<F>(
        &self,
        request: &HttpRequest,
        profile: &ProviderProfile,
        streaming: bool,
        on_chunk: &mut F,
        cancel: &CancellationToken,
    ) -> Result<String>
    where
        F: FnMut(&str) + ?Sized,
    {
        let response = tokio::select! {
            biased;
            _ = cancel.cancelled() => {
                return Err(ChatError::Cancelled { partial: String::new() });
            }
            response = self.send(request) => response?,
        };
        let response = ensure_success(response, &profile.id).await?;

        if streaming {
            decode_stream(
                response.body,
                profile.request_format.adapter(),
                on_chunk,
                cancel,
            )
            .await
        } else {
            let reply = tokio::select! {
                biased;
                _ = cancel.cancelled() => {
                    return Err(ChatError::Cancelled { partial: String::new() });
                }
                reply = read_json(response) => reply?,
            };
            if !reply.is_empty() {
                on_chunk(&reply);
            }
            Ok(reply)
        }
    }

    /// Send through the transport; silence past `read_timeout` is a `Network` error.
    async fn send(&self, request: &HttpRequest) -> Result<HttpResponse> {
        let response = tokio::time::timeout(self.read_timeout, self.transport.send(request))
            .await
            .map_err(|_| {
                ChatError::Network(format!(
                    "no response from {} within {:?}",
                    request.url, self.read_timeout
                ))
            })??;
        Ok(response.with_read_timeout(self.read_timeout))
    }

    /// One short non-streaming call with `id`'s resolved credentials.
    async fn probe(&self, id: &str) -> Result<String> {
        let profile = self.store.profile(id)?.clone();
        let api_key = self.store.resolve_api_key(id)?;
        let api_url = self.store.resolve_api_url(id)?;
        let ctx = RequestContext::probe(&profile, &api_key, &api_url, PROBE_MESSAGE)
            .with_proxy(self.store.proxy_url());
        let request = build_request(&ctx)?;

        info!(provider = %id, "validating credentials");
        let response = self.send(&request).await?;
        let response = ensure_success(response, id).await?;
        read_json(response).await
    }

    /// True when a probe with `id`'s current credentials gets a non-empty reply.
    pub async fn validate_credential(&self, id: &str) -> bool {
        match self.probe(id).await {
            Ok(reply) => !reply.trim().is_empty(),
            Err(e) => {
                warn!(provider = %id, error = %e, "credential validation failed");
                false
            }
        }
    }

    /// Save the user's input for `id`, probe it, and select the provider only
    /// if the probe succeeds. The raw input is kept either way.
    pub async fn confirm_provider(&mut self, id: &str, input: &CredentialInput) -> Result<()> {
        self.store.profile(id)?;
        self.store.store_credentials(id, input)?;

        let reason = match self.probe(id).await {
            Ok(reply) if !reply.trim().is_empty() => None,
            Ok(_) => Some("provider returned an empty reply".to_string()),
            Err(e) => Some(e.to_string()),
        };
        if let Some(reason) = reason {
            warn!(provider = %id, reason = %reason, "provider not confirmed");
            return Err(ChatError::ValidationFailed {
                provider: id.to_string(),
                reason,
            });
        }

        self.store.select_provider(id)?;
        self.store.mark_confirmed(id)?;
        info!(provider = %id, "provider confirmed");
        Ok(())
    }
}
