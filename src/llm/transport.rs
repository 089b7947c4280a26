//! HTTP transport seam.
//!
//! The chat session only needs "send this request, give me the status, the
//! content type and a byte stream". Production uses `reqwest`; tests plug in
//! a scripted transport so no network is involved.

use async_trait::async_trait;
use bytes::Bytes;
use futures_util::stream::{self, BoxStream};
use futures_util::{StreamExt, TryStreamExt};
use reqwest::header::{HeaderMap, HeaderName, HeaderValue, CONTENT_TYPE};
use std::time::Duration;

use super::HttpRequest;
use crate::error::{ChatError, Result};

pub type ByteStream = BoxStream<'static, Result<Bytes>>;

/// Status line, content type and a not-yet-read body.
pub struct HttpResponse {
    pub status: u16,
    pub content_type: Option<String>,
    pub body: ByteStream,
}

impl HttpResponse {
    pub fn is_success(&self) -> bool {
        (200..300).contains(&self.status)
    }

    pub fn is_json(&self) -> bool {
        self.content_type
            .as_deref()
            .is_some_and(|ct| ct.contains("application/json"))
    }

    /// Fail the body with `Network` when no chunk arrives within `timeout`.
    pub fn with_read_timeout(self, timeout: Duration) -> Self {
        let HttpResponse {
            status,
            content_type,
            body,
        } = self;
        let body = stream::unfold(Some(body), move |body| async move {
            let mut body = body?;
            match tokio::time::timeout(timeout, body.next()).await {
                Ok(Some(chunk)) => Some((chunk, Some(body))),
                Ok(None) => None,
                Err(_) => Some((
                    Err(ChatError::Network(format!(
                        "provider sent nothing for {:?}",
                        timeout
                    ))),
                    None,
                )),
            }
        })
        .boxed();
        HttpResponse {
            status,
            content_type,
            body,
        }
    }

    /// Read the whole body as text.
    pub async fn text(self) -> Result<String> {
        let chunks: Vec<Bytes> = self.body.try_collect().await?;
        let bytes: Vec<u8> = chunks.concat();
        Ok(String::from_utf8_lossy(&bytes).into_owned())
    }
}

/// Something that can execute an [`HttpRequest`].
#[async_trait]
pub trait Transport: Send + Sync {
    async fn send(&self, request: &HttpRequest) -> Result<HttpResponse>;
}

/// `reqwest`-backed transport.
pub struct ReqwestTransport {
    client: reqwest::Client,
}

impl ReqwestTransport {
    pub fn new(connect_timeout: Duration, read_timeout: Duration) -> Result<Self> {
        let client = reqwest::Client::builder()
            .connect_timeout(connect_timeout)
            .read_timeout(read_timeout)
            .build()?;
        Ok(Self { client })
    }
}

fn header_map(request: &HttpRequest) -> Result<HeaderMap> {
    let mut headers = HeaderMap::new();
    for (name, value) in &request.headers {
        let name = HeaderName::from_bytes(name.as_bytes())
            .map_err(|e| ChatError::Network(format!("invalid header name '{}': {}", name, e)))?;
        let value = HeaderValue::from_str(value)
            .map_err(|e| ChatError::Network(format!("invalid value for header '{}': {}", name, e)))?;
        headers.insert(name, value);
    }
    Ok(headers)
}

#[async_trait]
impl Transport for ReqwestTransport {
    async fn send(&self, request: &HttpRequest) -> Result<HttpResponse> {
        let response = self
            .client
            .request(request.method.clone(), &request.url)
            .headers(header_map(request)?)
            .json(&request.body)
            .send()
            .await
            .map_err(|e| ChatError::Network(format!("failed to reach {}: {}", request.url, e)))?;

        let status = response.status().as_u16();
        let content_type = response
            .headers()
            .get(CONTENT_TYPE)
            .and_then(|v| v.to_str().ok())
            .map(str::to_string);
        let body = response
            .bytes_stream()
            .map(|chunk| chunk.map_err(|e| ChatError::Network(format!("stream read error: {}", e))))
            .boxed();

        Ok(HttpResponse {
            status,
            content_type,
            body,
        })
    }
}

#[cfg(test)]
pub(crate) mod scripted {
    //! In-memory transport for tests.

    use super::*;
    use std::collections::VecDeque;
    use std::sync::Mutex;

    /// A canned reply: status, content type and body chunks.
    #[derive(Clone)]
    pub struct Reply {
        pub status: u16,
        pub content_type: Option<String>,
        pub chunks: Vec<Vec<u8>>,
        /// Keep the body open forever after the last chunk.
        pub stall: bool,
    }

    impl Reply {
        pub fn sse(chunks: &[&str]) -> Self {
            Self {
                status: 200,
                content_type: Some("text/event-stream".to_string()),
                chunks: chunks.iter().map(|c| c.as_bytes().to_vec()).collect(),
                stall: false,
            }
        }

        pub fn json(body: &str) -> Self {
            Self {
                status: 200,
                content_type: Some("application/json; charset=utf-8".to_string()),
                chunks: vec![body.as_bytes().to_vec()],
                stall: false,
            }
        }

        pub fn status(status: u16, body: &str) -> Self {
            Self {
                status,
                content_type: Some("application/json".to_string()),
                chunks: vec![body.as_bytes().to_vec()],
                stall: false,
            }
        }

        pub fn stalled(mut self) -> Self {
            self.stall = true;
            self
        }

        pub fn into_response(self) -> HttpResponse {
            let chunks = stream::iter(self.chunks.into_iter().map(|c| Ok(Bytes::from(c))));
            let body = if self.stall {
                chunks.chain(stream::pending()).boxed()
            } else {
                chunks.boxed()
            };
            HttpResponse {
                status: self.status,
                content_type: self.content_type,
                body,
            }
        }
    }

    /// Replays queued replies in order and records every request.
    #[derive(Default)]
    pub struct ScriptedTransport {
        replies: Mutex<VecDeque<Result<Reply>>>,
        pub requests: Mutex<Vec<HttpRequest>>,
    }

    impl ScriptedTransport {
        pub fn new(replies: Vec<Reply>) -> Self {
            Self {
                replies: Mutex::new(replies.into_iter().map(Ok).collect()),
                requests: Mutex::new(Vec::new()),
            }
        }

        pub fn failing(error: ChatError) -> Self {
            Self {
                replies: Mutex::new(VecDeque::from([Err(error)])),
                requests: Mutex::new(Vec::new()),
            }
        }

        pub fn sent(&self) -> Vec<HttpRequest> {
            self.requests.lock().unwrap().clone()
        }
    }

    #[async_trait]
    impl Transport for ScriptedTransport {
        async fn send(&self, request: &HttpRequest) -> Result<HttpResponse> {
            self.requests.lock().unwrap().push(request.clone());
            let reply = self
                .replies
                .lock()
                .unwrap()
                .pop_front()
                .unwrap_or_else(|| Err(ChatError::Network("no scripted reply left".to_string())));
            reply.map(Reply::into_response)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::scripted::Reply;
    use super::*;

    #[tokio::test]
    async fn test_response_text_concatenates_chunks() {
        let response = Reply::sse(&["ab", "c"]).into_response();
        assert!(response.is_success());
        assert!(!response.is_json());
        assert_eq!(response.text().await.unwrap(), "abc");
    }

    #[test]
    fn test_json_content_type_detection() {
        let response = Reply::json("{}").into_response();
        assert!(response.is_json());
        let error = Reply::status(401, "nope").into_response();
        assert!(!error.is_success());
    }

    #[test]
    fn test_header_map_rejects_bad_names() {
        let mut request = HttpRequest::post("http://x", Default::default(), serde_json::json!({}));
        request
            .headers
            .insert("bad header".to_string(), "v".to_string());
        assert!(matches!(header_map(&request), Err(ChatError::Network(_))));
    }

    #[tokio::test]
    async fn test_read_timeout_fails_stalled_body() {
        let response = Reply::sse(&["data: x\n"])
            .stalled()
            .into_response()
            .with_read_timeout(Duration::from_millis(20));
        let mut body = response.body;
        assert_eq!(&body.next().await.unwrap().unwrap()[..], b"data: x\n");
        assert!(matches!(body.next().await, Some(Err(ChatError::Network(_)))));
        assert!(body.next().await.is_none());
    }

    #[tokio::test]
    async fn test_read_timeout_passes_complete_body() {
        let response = Reply::json("{\"result\":\"ok\"}")
            .into_response()
            .with_read_timeout(Duration::from_millis(20));
        assert_eq!(response.text().await.unwrap(), "{\"result\":\"ok\"}");
    }
}
