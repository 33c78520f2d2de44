//! LLM provider client.
//!
//! Speaks an Anthropic-style `/v1/messages` API in two modes: a streaming
//! call that forwards SSE events to a caller-supplied callback (used by
//! `parse-prd` to drive the live tracker), and a plain completion call
//! (used by `expand`, where streaming buys nothing).
//!
//! The client owns only HTTP mechanics and wire decoding. What to do with
//! the text deltas is entirely the caller's business.

use crate::errors::ProviderError;
use futures_util::StreamExt;
use regex::Regex;
use serde::Deserialize;
use serde_json::json;
use std::sync::LazyLock;

/// Environment variable holding the API key.
pub const API_KEY_ENV: &str = "TASKMASTER_API_KEY";

const DEFAULT_BASE_URL: &str = "https://api.anthropic.com";
const API_VERSION: &str = "2023-06-01";

static FENCED_JSON_REGEX: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?s)```(?:json)?\s*(\{.*?\})\s*```").unwrap());

/// Model settings for one client instance.
#[derive(Debug, Clone)]
pub struct ProviderConfig {
    pub model: String,
    pub base_url: String,
    pub max_tokens: u32,
    pub temperature: f32,
}

impl Default for ProviderConfig {
    fn default() -> Self {
        Self {
            model: "claude-sonnet-4-20250514".to_string(),
            base_url: DEFAULT_BASE_URL.to_string(),
            max_tokens: 8192,
            temperature: 0.2,
        }
    }
}

/// Decoded stream events surfaced to the callback.
#[derive(Debug, Clone, PartialEq)]
pub enum StreamEvent {
    /// A fragment of assistant text.
    TextDelta(String),
    /// Exact token counts from provider usage metadata. Either side may be
    /// zero when the event only reports one direction.
    Usage {
        input_tokens: usize,
        output_tokens: usize,
    },
    /// The message finished normally.
    Stop,
}

/// Wire shapes for the provider's SSE event stream.
#[derive(Debug, Deserialize)]
#[serde(tag = "type")]
enum WireEvent {
    #[serde(rename = "message_start")]
    MessageStart { message: WireMessageStart },

    #[serde(rename = "content_block_delta")]
    ContentBlockDelta { delta: WireDelta },

    #[serde(rename = "message_delta")]
    MessageDelta {
        #[serde(default)]
        usage: Option<WireUsage>,
    },

    #[serde(rename = "message_stop")]
    MessageStop,

    #[serde(rename = "error")]
    Error { error: WireError },

    #[serde(other)]
    Ignored,
}

#[derive(Debug, Deserialize)]
struct WireMessageStart {
    #[serde(default)]
    usage: Option<WireUsage>,
}

#[derive(Debug, Deserialize)]
#[serde(tag = "type")]
enum WireDelta {
    #[serde(rename = "text_delta")]
    Text { text: String },
    #[serde(other)]
    Other,
}

#[derive(Debug, Default, Deserialize)]
struct WireUsage {
    #[serde(default)]
    input_tokens: usize,
    #[serde(default)]
    output_tokens: usize,
}

#[derive(Debug, Deserialize)]
struct WireError {
    #[serde(default)]
    message: String,
}

/// Non-streaming response body.
#[derive(Debug, Deserialize)]
struct CompletionResponse {
    #[serde(default)]
    content: Vec<CompletionBlock>,
}

#[derive(Debug, Deserialize)]
struct CompletionBlock {
    #[serde(default)]
    text: String,
}

/// HTTP client for the LLM provider.
pub struct LlmClient {
    http: reqwest::Client,
    api_key: String,
    config: ProviderConfig,
}

impl LlmClient {
    /// Build a client with the key from `TASKMASTER_API_KEY`.
    pub fn from_env(config: ProviderConfig) -> Result<Self, ProviderError> {
        let api_key = std::env::var(API_KEY_ENV).map_err(|_| ProviderError::MissingApiKey)?;
        Ok(Self {
            http: reqwest::Client::new(),
            api_key,
            config,
        })
    }

    fn request(&self, system: &str, user: &str, stream: bool) -> reqwest::RequestBuilder {
        self.http
            .post(format!("{}/v1/messages", self.config.base_url))
            .header("x-api-key", &self.api_key)
            .header("anthropic-version", API_VERSION)
            .json(&json!({
                "model": self.config.model,
                "max_tokens": self.config.max_tokens,
                "temperature": self.config.temperature,
                "stream": stream,
                "system": system,
                "messages": [{"role": "user", "content": user}],
            }))
    }

    /// Stream a completion, invoking `on_event` for each decoded event in
    /// arrival order. Returns after `message_stop` or when the connection
    /// closes.
    pub async fn stream_completion(
        &self,
        system: &str,
        user: &str,
        mut on_event: impl FnMut(StreamEvent),
    ) -> Result<(), ProviderError> {
        let response = self.request(system, user, true).send().await?;

        let status = response.status();
        if !status.is_success() {
            let message = response.text().await.unwrap_or_default();
            return Err(ProviderError::Api {
                status: status.as_u16(),
                message,
            });
        }

        let mut body = response.bytes_stream();
        let mut buffer = String::new();
        let mut stopped = false;

        while let Some(chunk) = body.next().await {
            let chunk = chunk?;
            buffer.push_str(&String::from_utf8_lossy(&chunk));

            for event in drain_sse_events(&mut buffer) {
                match decode_event(event)? {
                    Some(StreamEvent::Stop) => {
                        stopped = true;
                        on_event(StreamEvent::Stop);
                    }
                    Some(decoded) => on_event(decoded),
                    None => {}
                }
            }
        }

        if !stopped {
            return Err(ProviderError::StreamInterrupted(
                "connection closed before message_stop".to_string(),
            ));
        }
        Ok(())
    }

    /// One-shot completion returning the concatenated assistant text.
    pub async fn complete(&self, system: &str, user: &str) -> Result<String, ProviderError> {
        let response = self.request(system, user, false).send().await?;

        let status = response.status();
        if !status.is_success() {
            let message = response.text().await.unwrap_or_default();
            return Err(ProviderError::Api {
                status: status.as_u16(),
                message,
            });
        }

        let body: CompletionResponse = response.json().await?;
        let text: String = body.content.into_iter().map(|b| b.text).collect();
        if text.trim().is_empty() {
            return Err(ProviderError::EmptyResponse);
        }
        Ok(text)
    }
}

/// Split complete SSE events (terminated by a blank line) off the front of
/// `buffer`, returning their `data:` payloads. Incomplete trailing data
/// stays in the buffer.
fn drain_sse_events(buffer: &mut String) -> Vec<String> {
    let mut payloads = Vec::new();

    while let Some(end) = buffer.find("\n\n") {
        let event: String = buffer.drain(..end + 2).collect();
        for line in event.lines() {
            if let Some(data) = line.strip_prefix("data: ") {
                payloads.push(data.to_string());
            }
        }
    }

    payloads
}

/// Decode one SSE payload into a stream event. Unknown event types and
/// non-text deltas decode to `None`; provider errors become `Err`.
fn decode_event(payload: String) -> Result<Option<StreamEvent>, ProviderError> {
    let Ok(event) = serde_json::from_str::<WireEvent>(&payload) else {
        // Tolerate payloads we don't model, e.g. future event types.
        return Ok(None);
    };

    Ok(match event {
        WireEvent::MessageStart { message } => message.usage.map(|u| StreamEvent::Usage {
            input_tokens: u.input_tokens,
            output_tokens: u.output_tokens,
        }),
        WireEvent::ContentBlockDelta { delta } => match delta {
            WireDelta::Text { text } => Some(StreamEvent::TextDelta(text)),
            WireDelta::Other => None,
        },
        WireEvent::MessageDelta { usage } => usage.map(|u| StreamEvent::Usage {
            input_tokens: u.input_tokens,
            output_tokens: u.output_tokens,
        }),
        WireEvent::MessageStop => Some(StreamEvent::Stop),
        WireEvent::Error { error } => {
            return Err(ProviderError::StreamInterrupted(error.message));
        }
        WireEvent::Ignored => None,
    })
}

/// Extract a JSON object from model output that may wrap it in prose or a
/// fenced code block. Tries the fence first, then falls back to
/// brace-counting for the outermost object.
pub fn extract_json_payload(text: &str) -> Option<String> {
    if let Some(cap) = FENCED_JSON_REGEX.captures(text) {
        return Some(cap[1].trim().to_string());
    }
    extract_json_object(text)
}

/// Find the outermost balanced JSON object in `text` by brace counting.
fn extract_json_object(text: &str) -> Option<String> {
    let start = text.find('{')?;
    let mut depth = 0;
    let mut end = start;

    for (i, ch) in text[start..].char_indices() {
        match ch {
            '{' => depth += 1,
            '}' => {
                depth -= 1;
                if depth == 0 {
                    end = start + i + 1;
                    break;
                }
            }
            _ => {}
        }
    }

    if depth == 0 && end > start {
        Some(text[start..end].to_string())
    } else {
        None
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn drain_all(raw: &str) -> Vec<StreamEvent> {
        let mut buffer = raw.to_string();
        drain_sse_events(&mut buffer)
            .into_iter()
            .filter_map(|p| decode_event(p).unwrap())
            .collect()
    }

    // =========================================
    // SSE framing tests
    // =========================================

    #[test]
    fn test_drain_splits_complete_events() {
        let mut buffer = "event: a\ndata: {\"x\":1}\n\ndata: {\"y\":2}\n\ndata: partial".to_string();
        let payloads = drain_sse_events(&mut buffer);
        assert_eq!(payloads, vec!["{\"x\":1}", "{\"y\":2}"]);
        assert_eq!(buffer, "data: partial");
    }

    #[test]
    fn test_drain_keeps_incomplete_event() {
        let mut buffer = "data: {\"half\"".to_string();
        assert!(drain_sse_events(&mut buffer).is_empty());
        assert_eq!(buffer, "data: {\"half\"");
    }

    // =========================================
    // Event decoding tests
    // =========================================

    #[test]
    fn test_decode_text_delta() {
        let events = drain_all(
            "event: content_block_delta\n\
             data: {\"type\":\"content_block_delta\",\"index\":0,\"delta\":{\"type\":\"text_delta\",\"text\":\"hello\"}}\n\n",
        );
        assert_eq!(events, vec![StreamEvent::TextDelta("hello".to_string())]);
    }

    #[test]
    fn test_decode_usage_from_message_delta() {
        let events = drain_all(
            "data: {\"type\":\"message_delta\",\"delta\":{},\"usage\":{\"output_tokens\":321}}\n\n",
        );
        assert_eq!(
            events,
            vec![StreamEvent::Usage {
                input_tokens: 0,
                output_tokens: 321
            }]
        );
    }

    #[test]
    fn test_decode_usage_from_message_start() {
        let events = drain_all(
            "data: {\"type\":\"message_start\",\"message\":{\"usage\":{\"input_tokens\":88,\"output_tokens\":1}}}\n\n",
        );
        assert_eq!(
            events,
            vec![StreamEvent::Usage {
                input_tokens: 88,
                output_tokens: 1
            }]
        );
    }

    #[test]
    fn test_decode_message_stop() {
        let events = drain_all("data: {\"type\":\"message_stop\"}\n\n");
        assert_eq!(events, vec![StreamEvent::Stop]);
    }

    #[test]
    fn test_unknown_event_types_ignored() {
        let events = drain_all(
            "data: {\"type\":\"ping\"}\n\n\
             data: {\"type\":\"content_block_start\",\"index\":0,\"content_block\":{\"type\":\"text\",\"text\":\"\"}}\n\n",
        );
        assert!(events.is_empty());
    }

    #[test]
    fn test_error_event_becomes_stream_error() {
        let mut buffer =
            "data: {\"type\":\"error\",\"error\":{\"type\":\"overloaded_error\",\"message\":\"overloaded\"}}\n\n"
                .to_string();
        let payloads = drain_sse_events(&mut buffer);
        let err = decode_event(payloads.into_iter().next().unwrap()).unwrap_err();
        assert!(err.to_string().contains("overloaded"));
    }

    // =========================================
    // JSON payload extraction tests
    // =========================================

    #[test]
    fn test_extract_fenced_json() {
        let text = "Here are the subtasks:\n```json\n{\"subtasks\": []}\n```\nDone.";
        assert_eq!(
            extract_json_payload(text).as_deref(),
            Some("{\"subtasks\": []}")
        );
    }

    #[test]
    fn test_extract_bare_json_object() {
        let text = "Sure! {\"subtasks\": [{\"id\": 1}]} hope that helps";
        assert_eq!(
            extract_json_payload(text).as_deref(),
            Some("{\"subtasks\": [{\"id\": 1}]}")
        );
    }

    #[test]
    fn test_extract_unclosed_object_is_none() {
        assert!(extract_json_payload("{\"never\": \"closed\"").is_none());
        assert!(extract_json_payload("no json at all").is_none());
    }
}
