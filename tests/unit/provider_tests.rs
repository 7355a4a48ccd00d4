use crate::common::mock_providers::{MockAnthropicProvider, MockChatProvider, MockErrorType};
use crate::common::structured_payload;

use transmark::errors::ProviderError;
use transmark::providers::anthropic::AnthropicRequest;
use transmark::providers::openai::ChatRequest;
use transmark::providers::Provider;

#[tokio::test]
async fn test_mockChatProvider_scriptedResponses_shouldAnswerInOrder() {
    let provider = MockChatProvider::with_responses([
        structured_payload("第一段", &[]),
        structured_payload("第二段", &[]),
    ]);

    let first = provider
        .complete(ChatRequest::new("gpt-4o-mini").add_message("user", "one"))
        .await
        .unwrap();
    let second = provider
        .complete(ChatRequest::new("gpt-4o-mini").add_message("user", "two"))
        .await
        .unwrap();

    assert!(MockChatProvider::extract_text(&first).contains("第一段"));
    assert!(MockChatProvider::extract_text(&second).contains("第二段"));
    assert_eq!(provider.tracker.call_count(), 2);
    assert_eq!(provider.tracker.last_user_prompt().as_deref(), Some("two"));
}

#[tokio::test]
async fn test_mockChatProvider_exhaustedScript_shouldFail() {
    let provider = MockChatProvider::with_responses(Vec::<String>::new());

    let result = provider
        .complete(ChatRequest::new("gpt-4o-mini").add_message("user", "hi"))
        .await;
    assert!(matches!(result, Err(ProviderError::RequestFailed(_))));
}

#[tokio::test]
async fn test_mockChatProvider_failureModes_shouldMapToProviderErrors() {
    let cases = [
        (MockErrorType::Auth, "Authentication error"),
        (MockErrorType::Connection, "Connection error"),
        (MockErrorType::RateLimit, "Rate limit exceeded"),
        (MockErrorType::Api, "API responded with error: 500"),
    ];

    for (error_type, expected) in cases {
        let provider = MockChatProvider::failing(error_type);
        let error = provider
            .complete(ChatRequest::new("gpt-4o-mini").add_message("user", "hi"))
            .await
            .unwrap_err();
        assert!(
            error.to_string().contains(expected),
            "{error_type:?}: {error}"
        );
        assert!(provider.test_connection("gpt-4o-mini").await.is_err());
    }
}

#[test]
fn test_mockChatProvider_tokenUsage_shouldComeFromResponse() {
    let provider = MockChatProvider::with_responses([structured_payload("译文", &[])]);
    let response = tokio_test::block_on(
        provider.complete(ChatRequest::new("gpt-4o-mini").add_message("user", "hi")),
    )
    .unwrap();

    assert_eq!(MockChatProvider::extract_token_usage(&response), Some(20));
}

#[tokio::test]
async fn test_mockAnthropicProvider_extractors_shouldSumTokens() {
    let provider = MockAnthropicProvider::with_payload(structured_payload("译文", &[]));
    let response = provider
        .complete(AnthropicRequest::new("claude-3-haiku", 1024).add_message("user", "hi"))
        .await
        .unwrap();

    assert!(MockAnthropicProvider::extract_text(&response).contains("译文"));
    assert_eq!(MockAnthropicProvider::extract_token_usage(&response), Some(12));
    assert_eq!(provider.tracker.call_count(), 1);
}
