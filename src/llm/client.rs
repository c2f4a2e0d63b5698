//! Anthropic Messages API client.
//!
//! A thin request/response wrapper: no retries, no validation of the
//! generated text. Formatting contracts (two code blocks, JSON arrays)
//! are enforced by prompt instruction only and re-checked downstream by
//! strict parsers, never assumed here.

use std::time::Duration;

use async_trait::async_trait;
use reqwest::Client;
use serde::{Deserialize, Serialize};

use crate::error::LlmError;

/// Model used for every pipeline step.
pub const DEFAULT_MODEL: &str = "claude-sonnet-4-20250514";

/// Protocol version header required by the Messages API.
const ANTHROPIC_VERSION: &str = "2023-06-01";

/// A message in a conversation with the LLM.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Message {
    /// Role of the message sender ("user" or "assistant").
    pub role: String,
    /// Content of the message.
    pub content: String,
}

impl Message {
    /// Create a new user message.
    pub fn user(content: impl Into<String>) -> Self {
        Self {
            role: "user".to_string(),
            content: content.into(),
        }
    }

    /// Create a new assistant message.
    pub fn assistant(content: impl Into<String>) -> Self {
        Self {
            role: "assistant".to_string(),
            content: content.into(),
        }
    }
}

/// Request for text generation.
///
/// The system prompt is a top-level field rather than a message, matching
/// the Messages API wire format.
#[derive(Debug, Clone, Serialize)]
pub struct CompletionRequest {
    /// Model identifier; empty selects the client's default model.
    pub model: String,
    /// System / persona instruction.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub system: Option<String>,
    /// Conversation messages.
    pub messages: Vec<Message>,
    /// Maximum number of tokens to generate.
    pub max_tokens: u32,
    /// Sampling temperature (0.0 - 1.0).
    #[serde(skip_serializing_if = "Option::is_none")]
    pub temperature: Option<f64>,
}

impl CompletionRequest {
    /// Create a new request with a system prompt and messages.
    pub fn new(system: impl Into<String>, messages: Vec<Message>) -> Self {
        Self {
            model: String::new(),
            system: Some(system.into()),
            messages,
            max_tokens: 4000,
            temperature: None,
        }
    }

    /// Set the model for this request.
    pub fn with_model(mut self, model: impl Into<String>) -> Self {
        self.model = model.into();
        self
    }

    /// Set the max tokens for this request.
    pub fn with_max_tokens(mut self, max_tokens: u32) -> Self {
        self.max_tokens = max_tokens;
        self
    }

    /// Set the temperature for this request.
    pub fn with_temperature(mut self, temperature: f64) -> Self {
        self.temperature = Some(temperature);
        self
    }
}

/// A single content block in a completion.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ContentBlock {
    /// Block type (e.g. "text").
    #[serde(rename = "type")]
    pub kind: String,
    /// Text payload for text blocks.
    #[serde(default)]
    pub text: String,
}

impl ContentBlock {
    /// Create a text content block.
    pub fn text(text: impl Into<String>) -> Self {
        Self {
            kind: "text".to_string(),
            text: text.into(),
        }
    }
}

/// Token usage statistics for a completion.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Usage {
    /// Number of tokens in the prompt.
    pub input_tokens: u32,
    /// Number of tokens generated.
    pub output_tokens: u32,
}

/// Response from a completion request.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Completion {
    /// Unique identifier for this completion.
    pub id: String,
    /// Model that generated this completion.
    pub model: String,
    /// Generated content blocks.
    pub content: Vec<ContentBlock>,
    /// Reason the generation stopped (e.g. "end_turn", "max_tokens").
    #[serde(default)]
    pub stop_reason: Option<String>,
    /// Token usage statistics.
    #[serde(default)]
    pub usage: Usage,
}

impl Completion {
    /// Get the text of the first text block, if any.
    pub fn first_text(&self) -> Option<&str> {
        self.content
            .iter()
            .find(|b| b.kind == "text")
            .map(|b| b.text.as_str())
    }
}

/// Trait for LLM providers that can generate text.
#[async_trait]
pub trait LlmProvider: Send + Sync {
    /// Generate a completion for the given request.
    async fn complete(&self, request: CompletionRequest) -> Result<Completion, LlmError>;
}

/// Client for the Anthropic Messages API.
pub struct AnthropicClient {
    /// Base URL for the API.
    api_base: String,
    /// API key used for authentication.
    api_key: String,
    /// Default model to use when a request leaves the model empty.
    default_model: String,
    /// HTTP client for making API requests.
    http_client: Client,
}

impl AnthropicClient {
    /// Create a new client with the default API base and model.
    ///
    /// The key comes from [`crate::config::resolve_api_key`]; credential
    /// resolution failures happen at startup, before any client exists.
    pub fn new(api_key: impl Into<String>) -> Self {
        Self::with_base("https://api.anthropic.com", api_key)
    }

    /// Create a new client against a custom API base URL.
    pub fn with_base(api_base: impl Into<String>, api_key: impl Into<String>) -> Self {
        Self {
            api_base: api_base.into(),
            api_key: api_key.into(),
            default_model: DEFAULT_MODEL.to_string(),
            http_client: Client::builder()
                .timeout(Duration::from_secs(120))
                .build()
                .expect("Failed to build HTTP client"),
        }
    }

    /// Get the API base URL.
    pub fn api_base(&self) -> &str {
        &self.api_base
    }

    /// Get the default model.
    pub fn default_model(&self) -> &str {
        &self.default_model
    }
}

/// Error response from the API.
#[derive(Debug, Deserialize)]
struct ApiErrorResponse {
    error: ApiErrorDetail,
}

/// Error detail from the API.
#[derive(Debug, Deserialize)]
#[allow(dead_code)] // Fields kept for complete API error deserialization
struct ApiErrorDetail {
    message: String,
    #[serde(rename = "type")]
    error_type: Option<String>,
}

#[async_trait]
impl LlmProvider for AnthropicClient {
    async fn complete(&self, request: CompletionRequest) -> Result<Completion, LlmError> {
        let mut request = request;
        if request.model.is_empty() {
            request.model = self.default_model.clone();
        }

        let url = format!("{}/v1/messages", self.api_base);

        let http_response = self
            .http_client
            .post(&url)
            .header("Content-Type", "application/json")
            .header("x-api-key", &self.api_key)
            .header("anthropic-version", ANTHROPIC_VERSION)
            .json(&request)
            .send()
            .await
            .map_err(|e| LlmError::RequestFailed(e.to_string()))?;

        let status = http_response.status();

        if !status.is_success() {
            let status_code = status.as_u16();

            let error_text = http_response
                .text()
                .await
                .unwrap_or_else(|_| "Failed to read error response".to_string());

            if let Ok(error_response) = serde_json::from_str::<ApiErrorResponse>(&error_text) {
                if status_code == 429 {
                    return Err(LlmError::RateLimited(error_response.error.message));
                }

                return Err(LlmError::ApiError {
                    code: status_code,
                    message: error_response.error.message,
                });
            }

            return Err(LlmError::ApiError {
                code: status_code,
                message: error_text,
            });
        }

        let completion: Completion = http_response
            .json()
            .await
            .map_err(|e| LlmError::ParseError(format!("Failed to parse API response: {}", e)))?;

        tracing::debug!(
            model = %completion.model,
            input_tokens = completion.usage.input_tokens,
            output_tokens = completion.usage.output_tokens,
            stop_reason = ?completion.stop_reason,
            "Completion received"
        );

        Ok(completion)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_message_constructors() {
        let user = Message::user("hello");
        assert_eq!(user.role, "user");
        assert_eq!(user.content, "hello");

        let assistant = Message::assistant("hi");
        assert_eq!(assistant.role, "assistant");
    }

    #[test]
    fn test_request_builder() {
        let request = CompletionRequest::new("persona", vec![Message::user("go")])
            .with_temperature(0.2)
            .with_max_tokens(1000)
            .with_model("test-model");

        assert_eq!(request.system.as_deref(), Some("persona"));
        assert_eq!(request.temperature, Some(0.2));
        assert_eq!(request.max_tokens, 1000);
        assert_eq!(request.model, "test-model");
    }

    #[test]
    fn test_request_serialization_skips_empty_fields() {
        let request = CompletionRequest::new("sys", vec![Message::user("hi")]);
        let json = serde_json::to_value(&request).expect("serialize");
        assert!(json.get("temperature").is_none());
        assert_eq!(json["system"], "sys");
        assert_eq!(json["max_tokens"], 4000);
    }

    #[test]
    fn test_completion_first_text() {
        let completion = Completion {
            id: "msg_1".to_string(),
            model: "m".to_string(),
            content: vec![ContentBlock::text("the answer")],
            stop_reason: Some("end_turn".to_string()),
            usage: Usage::default(),
        };
        assert_eq!(completion.first_text(), Some("the answer"));
    }

    #[test]
    fn test_completion_deserializes_wire_format() {
        let raw = r#"{
            "id": "msg_abc",
            "model": "claude-sonnet-4-20250514",
            "content": [{"type": "text", "text": "module and_gate;"}],
            "stop_reason": "end_turn",
            "usage": {"input_tokens": 12, "output_tokens": 34}
        }"#;
        let completion: Completion = serde_json::from_str(raw).expect("deserialize");
        assert_eq!(completion.first_text(), Some("module and_gate;"));
        assert_eq!(completion.usage.output_tokens, 34);
    }

    #[test]
    fn test_client_defaults() {
        let client = AnthropicClient::new("sk-test");
        assert_eq!(client.api_base(), "https://api.anthropic.com");
        assert_eq!(client.default_model(), DEFAULT_MODEL);
    }
}
