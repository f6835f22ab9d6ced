//! Claude API client.
//!
//! Provides both streaming and non-streaming access to the Anthropic Messages
//! API.

use std::sync::Arc;

use async_stream::stream;
use futures::Stream;
use reqwest::header::{CONTENT_TYPE, HeaderMap, HeaderValue};
use secrecy::ExposeSecret;
use tracing::instrument;

use crate::config::ClaudeConfig;

use super::error::{ApiErrorResponse, ClaudeError};
use super::types::{ChatRequest, ChatResponse, Message, StreamEvent, Tool};

const ANTHROPIC_API_URL: &str = "https://api.anthropic.com/v1/messages";
const ANTHROPIC_VERSION: &str = "2023-06-01";
const DEFAULT_MAX_TOKENS: u32 = 4096;

/// Claude API client.
///
/// Cheap to clone; clones share one connection pool.
#[derive(Clone)]
pub struct ClaudeClient {
    inner: Arc<ClaudeClientInner>,
}

struct ClaudeClientInner {
    client: reqwest::Client,
    model: String,
}

impl ClaudeClient {
    /// Create a new Claude client.
    ///
    /// # Errors
    ///
    /// Returns `ClaudeError::InvalidConfig` if the API key cannot be sent as a
    /// header, or `ClaudeError::Http` if the HTTP client cannot be built.
    pub fn new(config: &ClaudeConfig) -> Result<Self, ClaudeError> {
        let mut api_key = HeaderValue::from_str(config.api_key.expose_secret())
            .map_err(|_| ClaudeError::InvalidConfig("API key is not a valid header".to_string()))?;
        api_key.set_sensitive(true);

        let mut headers = HeaderMap::new();
        headers.insert(CONTENT_TYPE, HeaderValue::from_static("application/json"));
        headers.insert("x-api-key", api_key);
        headers.insert(
            "anthropic-version",
            HeaderValue::from_static(ANTHROPIC_VERSION),
        );

        let client = reqwest::Client::builder()
            .default_headers(headers)
            .build()?;

        Ok(Self {
            inner: Arc::new(ClaudeClientInner {
                client,
                model: config.model.clone(),
            }),
        })
    }

    /// The model this client sends requests to.
    #[must_use]
    pub fn model(&self) -> &str {
        &self.inner.model
    }

    /// Send a chat request and get a complete response.
    ///
    /// # Errors
    ///
    /// Returns an error if the API request fails or returns an error response.
    #[instrument(skip(self, messages, system, tools), fields(model = %self.inner.model))]
    pub async fn chat(
        &self,
        messages: Vec<Message>,
        system: Option<String>,
        tools: Option<Vec<Tool>>,
    ) -> Result<ChatResponse, ClaudeError> {
        let request = self.request(messages, system, tools, None);

        let response = self
            .inner
            .client
            .post(ANTHROPIC_API_URL)
            .json(&request)
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            return Err(handle_error_status(status, response).await);
        }

        let body = response.text().await?;
        serde_json::from_str(&body)
            .map_err(|e| ClaudeError::Parse(format!("Failed to parse response: {e}")))
    }

    /// Send a chat request and get a stream of events.
    ///
    /// # Errors
    ///
    /// Returns an error if the initial request fails or is rejected.
    #[instrument(skip(self, messages, system, tools), fields(model = %self.inner.model))]
    pub async fn chat_stream(
        &self,
        messages: Vec<Message>,
        system: Option<String>,
        tools: Option<Vec<Tool>>,
    ) -> Result<impl Stream<Item = Result<StreamEvent, ClaudeError>> + Send + use<>, ClaudeError>
    {
        let request = self.request(messages, system, tools, Some(true));

        let response = self
            .inner
            .client
            .post(ANTHROPIC_API_URL)
            .json(&request)
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            return Err(handle_error_status(status, response).await);
        }

        Ok(stream! {
            use futures::StreamExt;

            // Bytes, not text: a chunk boundary may split a UTF-8 sequence.
            let mut buffer: Vec<u8> = Vec::new();
            let mut byte_stream = std::pin::pin!(response.bytes_stream());

            while let Some(chunk_result) = byte_stream.next().await {
                match chunk_result {
                    Ok(chunk) => {
                        buffer.extend_from_slice(&chunk);

                        while let Some(event) = extract_sse_event(&mut buffer) {
                            if let Some(parsed) = parse_sse_event(&event) {
                                yield parsed;
                            }
                        }
                    }
                    Err(e) => {
                        yield Err(ClaudeError::Stream(e.to_string()));
                        break;
                    }
                }
            }
        })
    }

    fn request(
        &self,
        messages: Vec<Message>,
        system: Option<String>,
        tools: Option<Vec<Tool>>,
        stream: Option<bool>,
    ) -> ChatRequest {
        ChatRequest {
            model: self.inner.model.clone(),
            max_tokens: DEFAULT_MAX_TOKENS,
            messages,
            system,
            tools,
            stream,
        }
    }
}

/// Turn a non-success response into a `ClaudeError`.
async fn handle_error_status(
    status: reqwest::StatusCode,
    response: reqwest::Response,
) -> ClaudeError {
    if status == reqwest::StatusCode::TOO_MANY_REQUESTS {
        let retry_after = response
            .headers()
            .get("Retry-After")
            .and_then(|v| v.to_str().ok())
            .and_then(|s| s.parse().ok())
            .unwrap_or(60);
        return ClaudeError::RateLimited(retry_after);
    }

    if status == reqwest::StatusCode::UNAUTHORIZED {
        return ClaudeError::Unauthorized("Invalid API key".to_string());
    }

    if status.as_u16() == 529 {
        return ClaudeError::Overloaded;
    }

    match response.text().await {
        Ok(body) => serde_json::from_str::<ApiErrorResponse>(&body).map_or_else(
            |_| ClaudeError::Api {
                error_type: format!("http_{}", status.as_u16()),
                message: body,
            },
            |api_error| api_error.error.into(),
        ),
        Err(e) => ClaudeError::Http(e),
    }
}

/// Extract a complete SSE event from the buffer.
///
/// Returns `Some(event)` if a complete event was found (and removes it from
/// the buffer), or `None` if no complete event is available yet.
fn extract_sse_event(buffer: &mut Vec<u8>) -> Option<String> {
    let idx = buffer.windows(2).position(|w| w == b"\n\n")?;
    let rest = buffer.split_off(idx + 2);
    let mut event = std::mem::replace(buffer, rest);
    event.truncate(idx);
    Some(String::from_utf8_lossy(&event).into_owned())
}

/// Parse an SSE event string into a `StreamEvent`.
fn parse_sse_event(event: &str) -> Option<Result<StreamEvent, ClaudeError>> {
    let data = event
        .lines()
        .filter_map(|line| line.strip_prefix("data:"))
        .map(str::trim_start)
        .next_back()?;

    if data.is_empty() || data == "[DONE]" {
        return None;
    }

    Some(
        serde_json::from_str::<StreamEvent>(data)
            .map_err(|e| ClaudeError::Parse(format!("Failed to parse stream event: {e}"))),
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_extract_sse_event() {
        let mut buffer =
            b"event: message_start\ndata: {}\n\nevent: ping\ndata: {}\n\n".to_vec();

        let first = extract_sse_event(&mut buffer).expect("first event");
        assert!(first.contains("message_start"));

        let second = extract_sse_event(&mut buffer).expect("second event");
        assert!(second.contains("ping"));

        assert!(extract_sse_event(&mut buffer).is_none());
        assert!(buffer.is_empty());
    }

    #[test]
    fn test_extract_sse_event_incomplete() {
        let mut buffer = b"event: message_start\ndata: {\"partial".to_vec();
        assert!(extract_sse_event(&mut buffer).is_none());
        assert_eq!(buffer, b"event: message_start\ndata: {\"partial");
    }

    #[test]
    fn test_extract_sse_event_split_utf8() {
        // "é" is two bytes; deliver them in separate chunks.
        let text = "data: {\"type\":\"content_block_delta\",\"index\":0,\"delta\":{\"type\":\"text_delta\",\"text\":\"purée\"}}\n\n";
        let bytes = text.as_bytes();
        let split = text.find('é').expect("accent") + 1;

        let mut buffer = bytes[..split].to_vec();
        assert!(extract_sse_event(&mut buffer).is_none());

        buffer.extend_from_slice(&bytes[split..]);
        let event = extract_sse_event(&mut buffer).expect("event");
        assert!(event.contains("purée"));
    }

    #[test]
    fn test_parse_sse_event_ping() {
        let event = "event: ping\ndata: {\"type\":\"ping\"}";
        let parsed = parse_sse_event(event)
            .expect("no result")
            .expect("parse error");
        assert!(matches!(parsed, StreamEvent::Ping));
    }

    #[test]
    fn test_parse_sse_event_without_data() {
        assert!(parse_sse_event("").is_none());
        assert!(parse_sse_event("event: ping").is_none());
    }

    #[test]
    fn test_parse_sse_event_invalid_json() {
        let parsed = parse_sse_event("data: {not json").expect("result");
        assert!(matches!(parsed, Err(ClaudeError::Parse(_))));
    }

    #[test]
    fn test_claude_client_is_clone_send_sync() {
        fn assert_traits<T: Clone + Send + Sync>() {}
        assert_traits::<ClaudeClient>();
    }
}
