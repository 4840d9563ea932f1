//! Anthropic Messages API backend. One HTTP attempt per `complete` call;
//! retries belong to `OracleClient`.

use async_trait::async_trait;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use super::{CompletionBackend, CompletionRequest, OracleError};

const ANTHROPIC_API_URL: &str = "https://api.anthropic.com/v1/messages";
const ANTHROPIC_VERSION: &str = "2023-06-01";
/// The model used for all oracle calls.
/// This is intentionally hardcoded to prevent accidental drift.
pub const MODEL: &str = "claude-sonnet-4-5";

#[derive(Debug, Serialize)]
struct MessagesRequest<'a> {
    model: &'a str,
    max_tokens: u32,
    system: &'a str,
    messages: [Message<'a>; 1],
}

#[derive(Debug, Serialize)]
struct Message<'a> {
    role: &'a str,
    content: &'a str,
}

#[derive(Debug, Deserialize)]
struct MessagesResponse {
    content: Vec<ContentBlock>,
    usage: Usage,
}

#[derive(Debug, Deserialize)]
struct ContentBlock {
    #[serde(rename = "type")]
    block_type: String,
    text: Option<String>,
}

#[derive(Debug, Deserialize)]
struct Usage {
    input_tokens: u32,
    output_tokens: u32,
}

impl MessagesResponse {
    /// Concatenates every text block, in order.
    fn into_text(self) -> String {
        self.content
            .into_iter()
            .filter(|b| b.block_type == "text")
            .filter_map(|b| b.text)
            .collect::<Vec<_>>()
            .join("")
    }
}

#[derive(Debug, Deserialize)]
struct ApiErrorEnvelope {
    error: ApiErrorBody,
}

#[derive(Debug, Deserialize)]
struct ApiErrorBody {
    message: String,
}

#[derive(Clone)]
pub struct AnthropicBackend {
    client: Client,
    api_key: String,
}

impl AnthropicBackend {
    pub fn new(api_key: String) -> Result<Self, OracleError> {
        // Per-attempt deadlines are enforced by OracleClient
        let client = Client::builder().build()?;
        Ok(Self { client, api_key })
    }
}

#[async_trait]
impl CompletionBackend for AnthropicBackend {
    async fn complete(&self, request: &CompletionRequest) -> Result<String, OracleError> {
        let body = MessagesRequest {
            model: MODEL,
            max_tokens: request.max_tokens,
            system: request.system,
            messages: [Message {
                role: "user",
                content: &request.prompt,
            }],
        };

        let response = self
            .client
            .post(ANTHROPIC_API_URL)
            .header("x-api-key", &self.api_key)
            .header("anthropic-version", ANTHROPIC_VERSION)
            .header("content-type", "application/json")
            .json(&body)
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            let raw = response.text().await.unwrap_or_default();
            if status.as_u16() == 429 || status.is_server_error() {
                warn!("LLM API returned {}: {}", status, raw);
            }
            let message = serde_json::from_str::<ApiErrorEnvelope>(&raw)
                .map(|e| e.error.message)
                .unwrap_or(raw);
            return Err(OracleError::Api {
                status: status.as_u16(),
                message,
            });
        }

        let parsed: MessagesResponse = response.json().await?;
        debug!(
            "{}: input_tokens={}, output_tokens={}",
            request.label, parsed.usage.input_tokens, parsed.usage.output_tokens
        );

        let text = parsed.into_text();
        if text.trim().is_empty() {
            return Err(OracleError::EmptyContent);
        }
        Ok(text)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_response_text_joins_text_blocks_only() {
        let raw = r#"{
            "content": [
                {"type": "text", "text": "{\"a\": "},
                {"type": "tool_use"},
                {"type": "text", "text": "1}"}
            ],
            "usage": {"input_tokens": 10, "output_tokens": 4}
        }"#;
        let parsed: MessagesResponse = serde_json::from_str(raw).unwrap();
        assert_eq!(parsed.into_text(), r#"{"a": 1}"#);
    }

    #[test]
    fn test_error_envelope_message_is_extracted() {
        let raw = r#"{"type":"error","error":{"type":"overloaded_error","message":"Overloaded"}}"#;
        let parsed: ApiErrorEnvelope = serde_json::from_str(raw).unwrap();
        assert_eq!(parsed.error.message, "Overloaded");
    }
}
