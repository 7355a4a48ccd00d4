/*!
 * Mock provider implementations for testing.
 *
 * These mocks implement the [`Provider`] trait over the real request and
 * response types, so trait-level behavior (text extraction, token
 * accounting, error surfaces) can be exercised without a network.
 */

use std::collections::VecDeque;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Mutex;

use async_trait::async_trait;

use transmark::errors::ProviderError;
use transmark::providers::anthropic::{AnthropicContent, AnthropicRequest, AnthropicResponse, TokenUsage};
use transmark::providers::openai::{ChatChoice, ChatMessage, ChatRequest, ChatResponse, ChatUsage};
use transmark::providers::Provider;

/// Which error a failing mock should surface
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MockErrorType {
    Auth,
    Connection,
    RateLimit,
    Api,
}

impl MockErrorType {
    pub fn to_error(self) -> ProviderError {
        match self {
            Self::Auth => ProviderError::AuthenticationError("invalid api key".to_string()),
            Self::Connection => ProviderError::ConnectionError("connection refused".to_string()),
            Self::RateLimit => ProviderError::RateLimitExceeded("too many requests".to_string()),
            Self::Api => ProviderError::ApiError {
                status_code: 500,
                message: "internal server error".to_string(),
            },
        }
    }
}

/// Call counter plus a copy of the last user prompt seen
#[derive(Debug, Default)]
pub struct ApiCallTracker {
    calls: AtomicUsize,
    last_user_prompt: Mutex<Option<String>>,
}

impl ApiCallTracker {
    pub fn record(&self, user_prompt: Option<String>) {
        self.calls.fetch_add(1, Ordering::SeqCst);
        if let Ok(mut last) = self.last_user_prompt.lock() {
            *last = user_prompt;
        }
    }

    pub fn call_count(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    pub fn last_user_prompt(&self) -> Option<String> {
        self.last_user_prompt.lock().ok().and_then(|g| g.clone())
    }
}

/// Mock chat-completions provider with scripted responses
#[derive(Debug, Default)]
pub struct MockChatProvider {
    scripted: Mutex<VecDeque<String>>,
    failure: Option<MockErrorType>,
    pub tracker: ApiCallTracker,
}

impl MockChatProvider {
    /// A provider that answers the scripted payloads in order
    pub fn with_responses<I, S>(responses: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            scripted: Mutex::new(responses.into_iter().map(Into::into).collect()),
            failure: None,
            tracker: ApiCallTracker::default(),
        }
    }

    /// A provider that fails every call with the given error
    pub fn failing(error_type: MockErrorType) -> Self {
        Self {
            scripted: Mutex::new(VecDeque::new()),
            failure: Some(error_type),
            tracker: ApiCallTracker::default(),
        }
    }

    fn next_payload(&self) -> Option<String> {
        self.scripted.lock().ok().and_then(|mut q| q.pop_front())
    }
}

/// Pull the last user-role message out of a serialized chat request
fn last_user_message(request: &ChatRequest) -> Option<String> {
    let value = serde_json::to_value(request).ok()?;
    value
        .get("messages")?
        .as_array()?
        .iter()
        .rev()
        .find(|m| m.get("role").and_then(|r| r.as_str()) == Some("user"))?
        .get("content")?
        .as_str()
        .map(str::to_string)
}

#[async_trait]
impl Provider for MockChatProvider {
    type Request = ChatRequest;
    type Response = ChatResponse;

    async fn complete(&self, request: Self::Request) -> Result<Self::Response, ProviderError> {
        self.tracker.record(last_user_message(&request));
        if let Some(error_type) = self.failure {
            return Err(error_type.to_error());
        }
        let content = self.next_payload().ok_or_else(|| {
            ProviderError::RequestFailed("mock provider ran out of scripted responses".to_string())
        })?;
        Ok(ChatResponse {
            choices: vec![ChatChoice {
                message: ChatMessage {
                    role: "assistant".to_string(),
                    content,
                },
                finish_reason: Some("stop".to_string()),
            }],
            usage: Some(ChatUsage {
                prompt_tokens: 12,
                completion_tokens: 8,
                total_tokens: 20,
            }),
        })
    }

    async fn test_connection(&self, _model: &str) -> Result<(), ProviderError> {
        match self.failure {
            Some(error_type) => Err(error_type.to_error()),
            None => Ok(()),
        }
    }

    fn extract_text(response: &Self::Response) -> String {
        response
            .choices
            .first()
            .map(|choice| choice.message.content.clone())
            .unwrap_or_default()
    }

    fn extract_token_usage(response: &Self::Response) -> Option<u64> {
        response.usage.as_ref().map(|usage| usage.total_tokens)
    }
}

/// Mock Anthropic provider answering a single fixed payload
#[derive(Debug)]
pub struct MockAnthropicProvider {
    payload: String,
    pub tracker: ApiCallTracker,
}

impl MockAnthropicProvider {
    pub fn with_payload(payload: impl Into<String>) -> Self {
        Self {
            payload: payload.into(),
            tracker: ApiCallTracker::default(),
        }
    }
}

#[async_trait]
impl Provider for MockAnthropicProvider {
    type Request = AnthropicRequest;
    type Response = AnthropicResponse;

    async fn complete(&self, _request: Self::Request) -> Result<Self::Response, ProviderError> {
        self.tracker.record(None);
        Ok(AnthropicResponse {
            content: vec![AnthropicContent {
                content_type: "text".to_string(),
                text: self.payload.clone(),
            }],
            usage: TokenUsage {
                input_tokens: 5,
                output_tokens: 7,
            },
        })
    }

    async fn test_connection(&self, _model: &str) -> Result<(), ProviderError> {
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
