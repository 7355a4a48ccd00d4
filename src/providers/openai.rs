use async_trait::async_trait;
use log::error;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::time::Duration;

use crate::errors::ProviderError;
use crate::providers::Provider;

/// OpenAI-format chat-completions client
///
/// Speaks the chat-completions wire format shared by OpenAI, DeepSeek,
/// Moonshot, SiliconFlow, Doubao and other compatible gateways. The
/// endpoint decides which service is reached.
pub struct OpenAIFormat {
    /// HTTP client for API requests
    client: Client,
    /// API key for bearer authentication
    api_key: String,
    /// Base URL of the service, e.g. "https://api.deepseek.com/v1"
    endpoint: String,
    /// Maximum number of retry attempts
    max_retries: u32,
    /// Base backoff time in milliseconds for exponential backoff
    backoff_base_ms: u64,
}

impl fmt::Debug for OpenAIFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        // api_key stays out of debug output
        f.debug_struct("OpenAIFormat")
            .field("endpoint", &self.endpoint)
            .field("max_retries", &self.max_retries)
            .finish_non_exhaustive()
    }
}

/// Chat message object
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChatMessage {
    /// Role of the message sender (system, user, assistant)
    pub role: String,
    /// Content of the message
    pub content: String,
}

/// Requested response format, used to force JSON-object output
#[derive(Debug, Serialize)]
pub struct ResponseFormat {
    /// Format type, e.g. "json_object"
    #[serde(rename = "type")]
    pub format_type: String,
}

/// Chat-completions request
#[derive(Debug, Serialize)]
pub struct ChatRequest {
    /// The model to use
    model: String,

    /// The messages for the conversation
    messages: Vec<ChatMessage>,

    /// Temperature for generation
    #[serde(skip_serializing_if = "Option::is_none")]
    temperature: Option<f32>,

    /// Maximum number of tokens to generate
    #[serde(skip_serializing_if = "Option::is_none")]
    max_tokens: Option<u32>,

    /// Response format constraint
    #[serde(skip_serializing_if = "Option::is_none")]
    response_format: Option<ResponseFormat>,

    /// Whether to stream the response
    #[serde(skip_serializing_if = "Option::is_none")]
    stream: Option<bool>,
}

impl ChatRequest {
    /// Create a new chat-completions request
    pub fn new(model: impl Into<String>) -> Self {
        Self {
            model: model.into(),
            messages: Vec::new(),
            temperature: None,
            max_tokens: None,
            response_format: None,
            stream: Some(false),
        }
    }

    /// Add a message to the request
    pub fn add_message(mut self, role: impl Into<String>, content: impl Into<String>) -> Self {
        self.messages.push(ChatMessage {
            role: role.into(),
            content: content.into(),
        });
        self
    }

    /// Set the temperature
    pub fn temperature(mut self, temperature: f32) -> Self {
        self.temperature = Some(temperature);
        self
    }

    /// Set the maximum number of tokens to generate
    pub fn max_tokens(mut self, max_tokens: u32) -> Self {
        self.max_tokens = Some(max_tokens);
        self
    }

    /// Force a JSON-object response
    pub fn json_mode(mut self) -> Self {
        self.response_format = Some(ResponseFormat {
            format_type: "json_object".to_string(),
        });
        self
    }
}

/// One completion choice in a chat response
#[derive(Debug, Deserialize)]
pub struct ChatChoice {
    /// The generated message
    pub message: ChatMessage,
    /// Why generation stopped
    #[serde(default)]
    pub finish_reason: Option<String>,
}

/// Token usage information
#[derive(Debug, Deserialize)]
pub struct ChatUsage {
    /// Number of prompt tokens
    #[serde(default)]
    pub prompt_tokens: u64,
    /// Number of completion tokens
    #[serde(default)]
    pub completion_tokens: u64,
    /// Total number of tokens
    #[serde(default)]
    pub total_tokens: u64,
}

/// Chat-completions response
#[derive(Debug, Deserialize)]
pub struct ChatResponse {
    /// The completion choices
    pub choices: Vec<ChatChoice>,
    /// Token usage information, when the gateway reports it
    #[serde(default)]
    pub usage: Option<ChatUsage>,
}

impl OpenAIFormat {
    /// Create a new client with default retry settings
    pub fn new(api_key: impl Into<String>, endpoint: impl Into<String>) -> Self {
        Self::new_with_config(api_key, endpoint, 3, 1000, 30)
    }

    /// Create a new client with retry and timeout configuration
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

    fn chat_completions_url(&self) -> String {
        format!("{}/chat/completions", self.endpoint.trim_end_matches('/'))
    }

    async fn send_once(&self, request: &ChatRequest) -> Result<ChatResponse, RequestOutcome> {
        let response = self
            .client
            .post(self.chat_completions_url())
            .bearer_auth(&self.api_key)
            .json(request)
            .send()
            .await
            .map_err(|e| {
                if e.is_timeout() || e.is_connect() {
                    RequestOutcome::Retry(ProviderError::ConnectionError(e.to_string()))
                } else {
                    RequestOutcome::Retry(ProviderError::RequestFailed(e.to_string()))
                }
            })?;

        let status = response.status();
        if status.is_success() {
            return response.json::<ChatResponse>().await.map_err(|e| {
                RequestOutcome::Fatal(ProviderError::ParseError(format!(
                    "Failed to parse chat-completions response: {e}"
                )))
            });
        }

        let error_text = response
            .text()
            .await
            .unwrap_or_else(|_| "Failed to get error response text".to_string());
        let status_code = status.as_u16();

        if status_code == 429 {
            Err(RequestOutcome::Retry(ProviderError::RateLimitExceeded(
                error_text,
            )))
        } else if status.is_server_error() {
            Err(RequestOutcome::Retry(ProviderError::ApiError {
                status_code,
                message: error_text,
            }))
        } else if status_code == 401 || status_code == 403 {
            Err(RequestOutcome::Fatal(ProviderError::AuthenticationError(
                error_text,
            )))
        } else {
            Err(RequestOutcome::Fatal(ProviderError::ApiError {
                status_code,
                message: error_text,
            }))
        }
    }
}

/// Whether a failed request is worth another attempt
enum RequestOutcome {
    Retry(ProviderError),
    Fatal(ProviderError),
}

#[async_trait]
impl Provider for OpenAIFormat {
    type Request = ChatRequest;
    type Response = ChatResponse;

    async fn complete(&self, request: Self::Request) -> Result<Self::Response, ProviderError> {
        let mut attempt = 0;
        let mut last_error: Option<ProviderError> = None;

        while attempt <= self.max_retries {
            match self.send_once(&request).await {
                Ok(response) => return Ok(response),
                Err(RequestOutcome::Fatal(e)) => {
                    error!("Chat-completions request failed: {}", e);
                    return Err(e);
                }
                Err(RequestOutcome::Retry(e)) => {
                    error!(
                        "Chat-completions request error: {} - attempt {}/{}",
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
                "Chat-completions request failed after {} attempts",
                self.max_retries + 1
            ))
        }))
    }

    async fn test_connection(&self, model: &str) -> Result<(), ProviderError> {
        let request = ChatRequest::new(model)
            .add_message("user", "Hello")
            .max_tokens(10);
        self.complete(request).await?;
        Ok(())
    }

    fn extract_text(response: &Self::Response) -> String {
        response
            .choices
            .first()
            .map(|choice| choice.message.content.clone())
            .unwrap_or_default()
    }

    fn extract_token_usage(response: &Self::Response) -> Option<u64> {
        response.usage.as_ref().map(|usage| {
            if usage.total_tokens > 0 {
                usage.total_tokens
            } else {
                usage.prompt_tokens + usage.completion_tokens
            }
        })
    }
}
