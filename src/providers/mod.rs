/*!
 * Provider implementations for different translation services.
 *
 * This module contains client implementations for the supported LLM
 * providers:
 * - OpenAI-format: chat-completions clients (OpenAI, DeepSeek, Moonshot,
 *   SiliconFlow, Doubao and other compatible gateways, chosen by endpoint)
 * - Anthropic: Anthropic messages API integration
 */

use async_trait::async_trait;
use std::fmt::Debug;

use crate::errors::ProviderError;

/// Common trait for all LLM providers
///
/// This trait defines the interface that all provider implementations must follow,
/// allowing them to be used interchangeably in the translation service.
#[async_trait]
pub trait Provider: Send + Sync + Debug {
    /// The request type for this provider
    type Request: Send + Sync;

    /// The response type for this provider
    type Response: Send + Sync;

    /// Complete a request using this provider
    ///
    /// # Arguments
    /// * `request` - The request to complete
    ///
    /// # Returns
    /// * `Result<Self::Response, ProviderError>` - The response from the provider or an error
    async fn complete(&self, request: Self::Request) -> Result<Self::Response, ProviderError>;

    /// Test the connection to the provider with a minimal request
    ///
    /// # Arguments
    /// * `model` - The model to probe
    ///
    /// # Returns
    /// * `Result<(), ProviderError>` - Ok if the connection is successful, or an error
    async fn test_connection(&self, model: &str) -> Result<(), ProviderError>;

    /// Extract text from the provider response
    ///
    /// # Arguments
    /// * `response` - The response from the provider
    ///
    /// # Returns
    /// * `String` - The extracted text
    fn extract_text(response: &Self::Response) -> String;

    /// Extract the total token count from the provider response, if reported
    fn extract_token_usage(response: &Self::Response) -> Option<u64>;
}

pub mod anthropic;
pub mod openai;
