//! Turning an [`HttpResponse`] into reply text.
//!
//! Streaming formats go through [`decode_stream`], which feeds the body into
//! the SSE decoder and hands every non-empty delta to the caller's callback.
//! Non-streaming replies go through [`read_json`].

use futures_util::StreamExt;
use serde_json::Value;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, warn};

use super::sse::{SseDecoder, SseLine};
use super::transport::{ByteStream, HttpResponse};
use super::{extract_final_content, FormatAdapter};
use crate::error::{ChatError, Result};

/// Map non-2xx statuses to errors. 401/403 become `Auth`.
pub async fn ensure_success(response: HttpResponse, provider: &str) -> Result<HttpResponse> {
    if response.is_success() {
        return Ok(response);
    }
    let status = response.status;
    let body = response.text().await.unwrap_or_default();
    error!(provider, status, body = %body, "provider returned an error");
    match status {
        401 | 403 => Err(ChatError::Auth {
            provider: provider.to_string(),
            reason: format!("HTTP {}", status),
        }),
        _ => Err(ChatError::Http { status, body }),
    }
}

/// Read a complete JSON reply and extract its text.
pub async fn read_json(response: HttpResponse) -> Result<String> {
    if !response.is_json() {
        let content_type = response.content_type.clone().unwrap_or_default();
        let body = response.text().await.unwrap_or_default();
        error!(content_type = %content_type, body = %body, "expected a JSON response");
        return Err(ChatError::MalformedResponse(format!(
            "expected application/json, got '{}'",
            content_type
        )));
    }
    let text = response.text().await?;
    let value: Value = serde_json::from_str(&text)
        .map_err(|e| ChatError::MalformedResponse(format!("invalid JSON body: {}", e)))?;
    extract_final_content(&value)
}

fn cancelled(decoder: SseDecoder) -> ChatError {
    ChatError::Cancelled {
        partial: decoder.into_content(),
    }
}

/// Decode an SSE body into the concatenated reply.
///
/// Ends at `data: [DONE]` or when the body closes, whichever comes first.
/// Frames that are not valid JSON are logged and skipped. Once `cancel`
/// fires, no more deltas are delivered and the body is dropped.
pub async fn decode_stream<F>(
    mut body: ByteStream,
    adapter: &FormatAdapter,
    on_chunk: &mut F,
    cancel: &CancellationToken,
) -> Result<String>
where
    F: FnMut(&str) + ?Sized,
{
    let mut decoder = SseDecoder::new();

    loop {
        if cancel.is_cancelled() {
            return Err(cancelled(decoder));
        }
        let next = tokio::select! {
            biased;
            _ = cancel.cancelled() => None,
            next = body.next() => Some(next),
        };
        let Some(next) = next else {
            return Err(cancelled(decoder));
        };
        let Some(chunk) = next else {
            break;
        };
        let chunk = chunk?;

        for line in decoder.feed(&chunk)? {
            if cancel.is_cancelled() {
                return Err(cancelled(decoder));
            }
            if apply_line(&mut decoder, line, adapter, on_chunk) {
                debug!(format = %adapter.format, "stream finished with [DONE]");
                return Ok(decoder.into_content());
            }
        }
    }

    if let Some(line) = decoder.finish() {
        apply_line(&mut decoder, line, adapter, on_chunk);
    }
    debug!(format = %adapter.format, "stream closed");
    Ok(decoder.into_content())
}

/// Returns true when the line ends the stream.
fn apply_line<F>(
    decoder: &mut SseDecoder,
    line: SseLine,
    adapter: &FormatAdapter,
    on_chunk: &mut F,
) -> bool
where
    F: FnMut(&str) + ?Sized,
{
    let payload = match line {
        SseLine::Done => return true,
        SseLine::Data(payload) => payload,
    };
    let frame: Value = match serde_json::from_str(&payload) {
        Ok(frame) => frame,
        Err(e) => {
            warn!(format = %adapter.format, error = %e, "skipping unparsable stream frame");
            return false;
        }
    };
    if let Some(delta) = (adapter.extract_delta)(&frame) {
        if decoder.push_delta(&delta) {
            on_chunk(&delta);
        }
    }
    false
}
