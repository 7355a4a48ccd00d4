use async_trait::async_trait;
use log::error;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::time::Duration;

use crate::errors::ProviderError;
use crate::providers::Provider;

/// Anthropic client for interacting with Anthropic API
pub struct Anthropic {
    /// HTTP client for API requests
    client: Client,
    /// API key for authentication
    api_key: String,
    /// API endpoint URL (optional, defaults to public API)
    endpoint: String,
    /// Maximum number of retry attempts
    max_retries: u32,
    /// Base backoff time in milliseconds for exponential backoff
    backoff_base_ms: u64,
}

impl fmt::Debug for Anthropic {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        // api_key stays out of debug output
        f.debug_struct("Anthropic")
            .field("endpoint", &self.endpoint)
            .field("max_retries", &self.max_retries)
            .finish_non_exhaustive()
    }
}

/// Anthropic message request
#[derive(Debug, Serialize)]
pub struct AnthropicRequest {
    /// The model to use
    model: String,

    /// The messages for the conversation
    messages: Vec<AnthropicMessage>,

    /// System prompt to guide the AI
    #[serde(skip_serializing_if = "Option::is_none")]
    system: Option<String>,

    /// Temperature for generation
    #[serde(skip_serializing_if = "Option::is_none")]
    temperature: Option<f32>,

    /// Maximum number of tokens to generate
    max_tokens: u32,
}

/// Anthropic message format
#[derive(Debug, Serialize, Deserialize)]
pub struct AnthropicMessage {
    /// Role of the message sender (user, assistant)
    pub role: String,

    /// Content of the message
    pub content: String,
}

/// Token usage information
#[derive(Debug, Deserialize)]
pub struct TokenUsage {
    /// Number of input tokens
    pub input_tokens: u64,
    /// Number of output tokens
    pub output_tokens: u64,
}

/// Anthropic response
#[derive(Debug, Deserialize)]
pub struct AnthropicResponse {
    /// The content of the response
    pub content: Vec<AnthropicContent>,
    /// Token usage information
    pub usage: TokenUsage,
}

/// Individual content block in an Anthropic response
#[derive(Debug, Deserialize)]
pub struct AnthropicContent {
    /// The type of content
    #[serde(rename = "type")]
    pub content_type: String,

    /// The actual text content
    #[serde(default)]
    pub text: String,
}

impl AnthropicRequest {
    /// Create a new Anthropic request
    pub fn new(model: impl Into<String>, max_tokens: u32) -> Self {
        Self {
            model: model.into(),
            messages: Vec::new(),
            system: None,
            temperature: None,
            max_tokens,
        }
    }

    /// Add a message to the request
    pub fn add_message(mut self, role: impl Into<String>, content: impl Into<String>) -> Self {
        self.messages.push(AnthropicMessage {
            role: role.into(),
            content: content.into(),
        });
        self
    }

    /// Set the system prompt
    pub fn system(mut self, system: impl Into<String>) -> Self {
        self.system = Some(system.into());
        self
    }

    /// Set the temperature
    pub fn temperature(mut self, temperature: f32) -> Self {
        self.temperature = Some(temperature);
        self
    }
}

impl Anthropic {
    /// Create a new Anthropic client with default retry settings
    pub fn new(api_key: impl Into<String>, endpoint: impl Into<String>) -> Self {
        Self::new_with_config(api_key, endpoint, 3, 1000, 60)
    }

    /// Create a new Anthropic client with retry and timeout configuration
    pub fn new_with_config(
        api_key: impl Into<String>,
        endpoint: impl Into<String>,
        max_retries: u32,
        backoff_base_ms: u64,
        timeout_secs: u64,
    ) -> Self {
        Self {
            client: Client::builder()
                .timeout(Duration::from_secs(timeout_secs))
                .pool_idle_timeout(Duration::from_secs(90))
                .tcp_keepalive(Duration::from_secs(60))
                .build()
                .unwrap_or_default(),
            api_key: api_key.into(),
            endpoint: endpoint.into(),
            max_retries,
            backoff_base_ms,
        }
    }

    fn messages_url(&self) -> String {
        if self.endpoint.is_empty() {
            "https://api.anthropic.com/v1/messages".to_string()
        } else {
            format!("{}/v1/messages", self.endpoint.trim_end_matches('/'))
        }
    }

    async fn send_once(&self, request: &AnthropicRequest) -> Result<AnthropicResponse, SendError> {
        let response = self
            .client
            .post(self.messages_url())
            .header("Content-Type", "application/json")
            .header("x-api-key", &self.api_key)
            .header("anthropic-version", "2023-06-01")
            .json(request)
            .send()
            .await
            .map_err(|e| {
                if e.is_timeout() || e.is_connect() {
                    SendError::Retry(ProviderError::ConnectionError(e.to_string()))
                } else {
                    SendError::Retry(ProviderError::RequestFailed(e.to_string()))
                }
            })?;

        let status = response.status();
        if status.is_success() {
            return response.json::<AnthropicResponse>().await.map_err(|e| {
                SendError::Fatal(ProviderError::ParseError(format!(
                    "Failed to parse Anthropic API response: {e}"
                )))
            });
        }

        let error_text = response
            .text()
            .await
            .unwrap_or_else(|_| "Failed to get error response text".to_string());
        let status_code = status.as_u16();

        if status_code == 429 {
            Err(SendError::Retry(ProviderError::RateLimitExceeded(
                error_text,
            )))
        } else if status.is_server_error() {
            Err(SendError::Retry(ProviderError::ApiError {
                status_code,
                message: error_text,
            }))
        } else if status_code == 401 || status_code == 403 {
            Err(SendError::Fatal(ProviderError::AuthenticationError(
                error_text,
            )))
        } else {
            Err(SendError::Fatal(ProviderError::ApiError {
                status_code,
                message: error_text,
            }))
        }
    }
}

/// Whether a failed request is worth another attempt
enum SendError {
    Retry(ProviderError),
    Fatal(ProviderError),
}

#[async_trait]
impl Provider for Anthropic {
    type Request = AnthropicRequest;
    type Response = AnthropicResponse;

    async fn complete(&self, request: Self::Request) -> Result<Self::Response, ProviderError> {
        let mut attempt = 0;
        let mut last_error: Option<ProviderError> = None;

        while attempt <= self.max_retries {
            match self.send_once(&request).await {
                Ok(response) => return Ok(response),
                Err(SendError::Fatal(e)) => {
                    error!("Anthropic API request failed: {}", e);
                    return Err(e);
                }
                Err(SendError::Retry(e)) => {
                    error!(
                        "Anthropic API error: {} - attempt {}/{}",
                        e,
                        attempt + 1,
                        self.max_retries + 1
                    );
                    last_error = Some(e);
                }
            }

            attempt += 1;
            if attempt <= self.max_retries {
                let backoff_ms = self.backoff_base_ms * (1u64 << (attempt - 1));
                tokio::time::sleep(Duration::from_millis(backoff_ms)).await;
            }
        }

        Err(last_error.unwrap_or_else(|| {
            ProviderError::RequestFailed(format!(
                "Anthropic API request failed after {} attempts",
                self.max_retries + 1
            ))
        }))
    }

    async fn test_connection(&self, model: &str) -> Result<(), ProviderError> {
        let request = AnthropicRequest::new(model, 10).add_message("user", "Hello");
        self.complete(request).await?;
        Ok(())
    }

    fn extract_text(response: &Self::Response) -> String {
        response
            .content
            .iter()
            .filter(|c| c.content_type == "text")
            .map(|c| c.text.clone())
            .collect()
    }

    fn extract_token_usage(response: &Self::Response) -> Option<u64> {
        Some(response.usage.input_tokens + response.usage.output_tokens)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_messagesUrl_defaultEndpoint() {
        let client = Anthropic::new("key", "");
        assert_eq!(client.messages_url(), "https://api.anthropic.com/v1/messages");
    }

    #[test]
    fn test_messagesUrl_customEndpoint_trimsTrailingSlash() {
        let client = Anthropic::new("key", "https://proxy.example.com/");
        assert_eq!(client.messages_url(), "https://proxy.example.com/v1/messages");
    }

    #[test]
    fn test_extractText_concatenatesTextBlocks() {
        let response: AnthropicResponse = serde_json::from_str(
            r#"{"content":[{"type":"text","text":"第一"},{"type":"tool_use"},{"type":"text","text":"第二"}],
                "usage":{"input_tokens":5,"output_tokens":7}}"#,
        )
        .unwrap();

        assert_eq!(Anthropic::extract_text(&response), "第一第二");
        assert_eq!(Anthropic::extract_token_usage(&response), Some(12));
    }

    #[test]
    fn test_requestSerialization_omitsUnsetSystem() {
        let request = AnthropicRequest::new("claude-3-haiku", 512).add_message("user", "hi");
        let json = serde_json::to_string(&request).unwrap();

        assert!(json.contains("\"max_tokens\":512"));
        assert!(!json.contains("system"));
        assert!(!json.contains("temperature"));
    }
}
