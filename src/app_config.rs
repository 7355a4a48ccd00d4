use anyhow::{anyhow, Result};
use serde::{Deserialize, Serialize};
use std::default::Default;

/// Application configuration module
/// This module handles the application configuration including loading,
/// validating and saving configuration settings.
/// Represents the application configuration
#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct Config {
    /// Source language code (ISO)
    pub source_language: String,

    /// Target language code (ISO)
    pub target_language: String,

    /// Translation config
    pub translation: TranslationConfig,

    /// Document segmentation config
    #[serde(default)]
    pub segmentation: SegmentationConfig,

    /// Terminology matching config
    #[serde(default)]
    pub matching: MatchingConfig,

    /// Glossary persistence config
    #[serde(default)]
    pub glossary: GlossaryConfig,

    /// Whether translation runs segments concurrently
    #[serde(default = "default_true")]
    pub concurrent: bool,

    /// Consecutive failures tolerated in sequential mode before halting
    #[serde(default = "default_consecutive_failure_limit")]
    pub consecutive_failure_limit: u32,

    /// Log level
    #[serde(default)]
    pub log_level: LogLevel,
}

/// Translation provider type
#[derive(Debug, Serialize, Deserialize, Clone, PartialEq, Default)]
#[serde(rename_all = "lowercase")]
pub enum TranslationProvider {
    // @provider: OpenAI
    #[default]
    OpenAI,
    // @provider: DeepSeek (OpenAI-compatible gateway)
    DeepSeek,
    // @provider: Moonshot / Kimi (OpenAI-compatible gateway)
    Moonshot,
    // @provider: SiliconFlow (OpenAI-compatible gateway)
    SiliconFlow,
    // @provider: Doubao / Volcengine Ark (OpenAI-compatible gateway)
    Doubao,
    // @provider: Anthropic
    Anthropic,
}

impl TranslationProvider {
    // @returns: Capitalized provider name
    pub fn display_name(&self) -> &str {
        match self {
            Self::OpenAI => "OpenAI",
            Self::DeepSeek => "DeepSeek",
            Self::Moonshot => "Moonshot",
            Self::SiliconFlow => "SiliconFlow",
            Self::Doubao => "Doubao",
            Self::Anthropic => "Anthropic",
        }
    }

    // @returns: Lowercase provider identifier
    pub fn to_lowercase_string(&self) -> String {
        match self {
            Self::OpenAI => "openai".to_string(),
            Self::DeepSeek => "deepseek".to_string(),
            Self::Moonshot => "moonshot".to_string(),
            Self::SiliconFlow => "siliconflow".to_string(),
            Self::Doubao => "doubao".to_string(),
            Self::Anthropic => "anthropic".to_string(),
        }
    }

    /// Whether the provider speaks the OpenAI chat-completions wire format
    pub fn is_openai_compatible(&self) -> bool {
        !matches!(self, Self::Anthropic)
    }
}

// Implement Display trait for TranslationProvider
impl std::fmt::Display for TranslationProvider {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.to_lowercase_string())
    }
}

// Implement FromStr trait for TranslationProvider
impl std::str::FromStr for TranslationProvider {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.to_lowercase().as_str() {
            "openai" => Ok(Self::OpenAI),
            "deepseek" => Ok(Self::DeepSeek),
            "moonshot" | "kimi" => Ok(Self::Moonshot),
            "siliconflow" | "silicon" => Ok(Self::SiliconFlow),
            "doubao" => Ok(Self::Doubao),
            "anthropic" => Ok(Self::Anthropic),
            _ => Err(anyhow!("Invalid provider type: {}", s)),
        }
    }
}

/// Provider configuration wrapper
#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct ProviderConfig {
    // @field: Provider type identifier
    #[serde(rename = "type")]
    pub provider_type: String,

    // @field: Model name
    #[serde(default = "String::new")]
    pub model: String,

    // @field: API key
    #[serde(default = "String::new")]
    pub api_key: String,

    // @field: Service URL
    #[serde(default = "String::new")]
    pub endpoint: String,

    // @field: Max concurrent requests
    #[serde(default = "default_concurrent_requests")]
    pub concurrent_requests: usize,

    // @field: Max segment chars per request
    #[serde(default = "default_max_chars_per_request")]
    pub max_chars_per_request: usize,

    // @field: Timeout seconds
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,
}

impl ProviderConfig {
    // @param provider_type: Provider enum
    // @returns: Provider config with defaults
    pub fn new(provider_type: TranslationProvider) -> Self {
        let (endpoint, model, max_chars, timeout) = match provider_type {
            TranslationProvider::OpenAI => (
                default_openai_endpoint(),
                default_openai_model(),
                default_max_chars_per_request(),
                default_timeout_secs(),
            ),
            TranslationProvider::DeepSeek => (
                default_deepseek_endpoint(),
                default_deepseek_model(),
                default_max_chars_per_request(),
                default_timeout_secs(),
            ),
            TranslationProvider::Moonshot => (
                default_moonshot_endpoint(),
                default_moonshot_model(),
                default_max_chars_per_request(),
                default_timeout_secs(),
            ),
            TranslationProvider::SiliconFlow => (
                default_siliconflow_endpoint(),
                default_siliconflow_model(),
                default_max_chars_per_request(),
                default_timeout_secs(),
            ),
            TranslationProvider::Doubao => (
                default_doubao_endpoint(),
                default_doubao_model(),
                default_max_chars_per_request(),
                default_timeout_secs(),
            ),
            TranslationProvider::Anthropic => (
                default_anthropic_endpoint(),
                default_anthropic_model(),
                default_anthropic_max_chars_per_request(),
                default_anthropic_timeout_secs(),
            ),
        };
        Self {
            provider_type: provider_type.to_lowercase_string(),
            model,
            api_key: String::new(),
            endpoint,
            concurrent_requests: default_concurrent_requests(),
            max_chars_per_request: max_chars,
            timeout_secs: timeout,
        }
    }
}

/// Translation service configuration
#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct TranslationConfig {
    /// Translation provider to use
    #[serde(default)]
    pub provider: TranslationProvider,

    /// Available translation providers
    #[serde(default)]
    pub available_providers: Vec<ProviderConfig>,

    /// Common translation settings
    #[serde(default)]
    pub common: TranslationCommonConfig,
}

/// Common translation settings applicable to all providers
#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct TranslationCommonConfig {
    /// System prompt template for translation
    /// Placeholders: {source_language}, {target_language}
    #[serde(default = "default_system_prompt")]
    pub system_prompt_template: String,

    /// Requests per minute across the whole run; None disables the limiter
    #[serde(default)]
    pub rate_limit_rpm: Option<u32>,

    /// Retry count for failed segment translations
    #[serde(default = "default_retry_count")]
    pub retry_count: u32,

    /// Base backoff in milliseconds; attempt N waits N * base
    #[serde(default = "default_retry_backoff_base_ms")]
    pub retry_backoff_base_ms: u64,

    /// Repair attempts for malformed structured responses
    #[serde(default = "default_repair_attempts")]
    pub repair_attempts: u32,

    /// Whether terminology conflicts trigger a rewrite pass
    #[serde(default = "default_true")]
    pub rewrite_on_conflict: bool,

    /// Temperature parameter for text generation (0.0 to 1.0)
    /// Lower values make output more deterministic, higher values more creative
    #[serde(default = "default_temperature")]
    pub temperature: f32,
}

impl Default for TranslationCommonConfig {
    fn default() -> Self {
        Self {
            system_prompt_template: default_system_prompt(),
            rate_limit_rpm: None,
            retry_count: default_retry_count(),
            retry_backoff_base_ms: default_retry_backoff_base_ms(),
            repair_attempts: default_repair_attempts(),
            rewrite_on_conflict: true,
            temperature: default_temperature(),
        }
    }
}

/// Configuration for document segmentation
#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct SegmentationConfig {
    /// Preferred upper bound on segment characters
    #[serde(default = "default_max_chunk_size")]
    pub max_chunk_size: usize,

    /// Lower bound under which segments become merge candidates
    #[serde(default = "default_min_chunk_size")]
    pub min_chunk_size: usize,

    /// Whether heading structure is tracked and replayed into the output
    #[serde(default = "default_true")]
    pub preserve_structure: bool,
}

impl Default for SegmentationConfig {
    fn default() -> Self {
        Self {
            max_chunk_size: default_max_chunk_size(),
            min_chunk_size: default_min_chunk_size(),
            preserve_structure: true,
        }
    }
}

/// Configuration for terminology matching
#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct MatchingConfig {
    /// Whether the typo-tolerant matching pass runs
    #[serde(default)]
    pub fuzzy_enabled: bool,

    /// Maximum edit distance accepted by the fuzzy pass
    #[serde(default = "default_fuzzy_max_distance")]
    pub fuzzy_max_distance: usize,
}

impl Default for MatchingConfig {
    fn default() -> Self {
        Self {
            fuzzy_enabled: false,
            fuzzy_max_distance: default_fuzzy_max_distance(),
        }
    }
}

/// Configuration for glossary persistence at run end
#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct GlossaryConfig {
    /// true: merge run terms into the base glossary snapshot;
    /// false: save run terms to a standalone file
    #[serde(default = "default_true")]
    pub merge_into_glossary: bool,
}

impl Default for GlossaryConfig {
    fn default() -> Self {
        Self {
            merge_into_glossary: true,
        }
    }
}

/// Log verbosity level
#[derive(Debug, Serialize, Deserialize, Clone, PartialEq, Default)]
#[serde(rename_all = "lowercase")]
pub enum LogLevel {
    Error,
    Warn,
    #[default]
    Info,
    Debug,
    Trace,
}

fn default_concurrent_requests() -> usize {
    4
}

fn default_max_chars_per_request() -> usize {
    4000
}

fn default_anthropic_max_chars_per_request() -> usize {
    8000
}

fn default_timeout_secs() -> u64 {
    30
}

fn default_anthropic_timeout_secs() -> u64 {
    60
}

fn default_retry_count() -> u32 {
    3
}

fn default_retry_backoff_base_ms() -> u64 {
    1000
}

fn default_repair_attempts() -> u32 {
    5
}

fn default_temperature() -> f32 {
    0.3
}

fn default_consecutive_failure_limit() -> u32 {
    3
}

fn default_max_chunk_size() -> usize {
    600
}

fn default_min_chunk_size() -> usize {
    300
}

fn default_fuzzy_max_distance() -> usize {
    1
}

fn default_true() -> bool {
    true
}

fn default_openai_endpoint() -> String {
    "https://api.openai.com/v1".to_string()
}

fn default_deepseek_endpoint() -> String {
    "https://api.deepseek.com/v1".to_string()
}

fn default_moonshot_endpoint() -> String {
    "https://api.moonshot.cn/v1".to_string()
}

fn default_siliconflow_endpoint() -> String {
    "https://api.siliconflow.cn/v1".to_string()
}

fn default_doubao_endpoint() -> String {
    "https://ark.cn-beijing.volces.com/api/v3".to_string()
}

fn default_anthropic_endpoint() -> String {
    "https://api.anthropic.com".to_string()
}

fn default_openai_model() -> String {
    "gpt-4o-mini".to_string()
}

fn default_deepseek_model() -> String {
    "deepseek-chat".to_string()
}

fn default_moonshot_model() -> String {
    "kimi-k2-turbo-preview".to_string()
}

fn default_siliconflow_model() -> String {
    "deepseek-ai/DeepSeek-V2.5".to_string()
}

fn default_doubao_model() -> String {
    "doubao-seed-1-6-251015".to_string()
}

fn default_anthropic_model() -> String {
    "claude-3-haiku".to_string()
}

fn default_system_prompt() -> String {
    "You are a professional translator. Translate from {source_language} to {target_language}. Preserve Markdown formatting, keep terminology consistent with the provided glossary, and maintain the original meaning and tone.".to_string()
}

impl Config {
    /// Validate the configuration for consistency and required values
    pub fn validate(&self) -> Result<()> {
        // Validate languages
        let _source_name = crate::language_utils::get_language_name(&self.source_language)?;
        let _target_name = crate::language_utils::get_language_name(&self.target_language)?;
        if crate::language_utils::language_codes_match(&self.source_language, &self.target_language)
        {
            return Err(anyhow!(
                "Source and target languages are both '{}'",
                self.source_language
            ));
        }

        // All supported providers are remote services and need a key
        let api_key = self.translation.get_api_key();
        if api_key.is_empty() {
            return Err(anyhow!(
                "Translation API key is required for {} provider",
                self.translation.provider.display_name()
            ));
        }

        let endpoint = self.translation.get_endpoint();
        url::Url::parse(&endpoint)
            .map_err(|e| anyhow!("Invalid endpoint URL '{}': {}", endpoint, e))?;

        if self.segmentation.max_chunk_size == 0 {
            return Err(anyhow!("segmentation.max_chunk_size must be positive"));
        }
        if self.segmentation.min_chunk_size > self.segmentation.max_chunk_size {
            return Err(anyhow!(
                "segmentation.min_chunk_size ({}) exceeds max_chunk_size ({})",
                self.segmentation.min_chunk_size,
                self.segmentation.max_chunk_size
            ));
        }

        Ok(())
    }
}

/// Default implementation for Config
impl Default for Config {
    fn default() -> Self {
        Config {
            source_language: "en".to_string(),
            target_language: "zh".to_string(),
            translation: TranslationConfig::default(),
            segmentation: SegmentationConfig::default(),
            matching: MatchingConfig::default(),
            glossary: GlossaryConfig::default(),
            concurrent: true,
            consecutive_failure_limit: default_consecutive_failure_limit(),
            log_level: LogLevel::default(),
        }
    }
}

impl TranslationConfig {
    pub fn optimal_concurrent_requests(&self) -> usize {
        // Check if the provider exists in the available_providers
        if let Some(provider_config) = self.get_active_provider_config() {
            return provider_config.concurrent_requests;
        }

        // Default fallback
        default_concurrent_requests()
    }

    /// Get the active provider configuration from the available_providers array
    pub fn get_active_provider_config(&self) -> Option<&ProviderConfig> {
        let provider_str = self.provider.to_lowercase_string();
        self.available_providers
            .iter()
            .find(|p| p.provider_type == provider_str)
    }

    /// Get a specific provider configuration by type for testing
    pub fn get_provider_config(&self, provider_type: &TranslationProvider) -> Option<&ProviderConfig> {
        let provider_str = provider_type.to_lowercase_string();
        self.available_providers
            .iter()
            .find(|p| p.provider_type == provider_str)
    }

    /// Get the model for the active provider
    pub fn get_model(&self) -> String {
        if let Some(provider_config) = self.get_active_provider_config() {
            if !provider_config.model.is_empty() {
                return provider_config.model.clone();
            }
        }

        // Default fallback based on provider type
        match self.provider {
            TranslationProvider::OpenAI => default_openai_model(),
            TranslationProvider::DeepSeek => default_deepseek_model(),
            TranslationProvider::Moonshot => default_moonshot_model(),
            TranslationProvider::SiliconFlow => default_siliconflow_model(),
            TranslationProvider::Doubao => default_doubao_model(),
            TranslationProvider::Anthropic => default_anthropic_model(),
        }
    }

    /// Get the API key for the active provider
    pub fn get_api_key(&self) -> String {
        if let Some(provider_config) = self.get_active_provider_config() {
            if !provider_config.api_key.is_empty() {
                return provider_config.api_key.clone();
            }
        }

        String::new()
    }

    /// Get the endpoint for the active provider
    pub fn get_endpoint(&self) -> String {
        if let Some(provider_config) = self.get_active_provider_config() {
            if !provider_config.endpoint.is_empty() {
                return provider_config.endpoint.clone();
            }
        }

        // Default fallback based on provider type
        match self.provider {
            TranslationProvider::OpenAI => default_openai_endpoint(),
            TranslationProvider::DeepSeek => default_deepseek_endpoint(),
            TranslationProvider::Moonshot => default_moonshot_endpoint(),
            TranslationProvider::SiliconFlow => default_siliconflow_endpoint(),
            TranslationProvider::Doubao => default_doubao_endpoint(),
            TranslationProvider::Anthropic => default_anthropic_endpoint(),
        }
    }

    /// Get the max chars per request for the active provider
    pub fn get_max_chars_per_request(&self) -> usize {
        if let Some(provider_config) = self.get_active_provider_config() {
            if provider_config.max_chars_per_request > 0 {
                return provider_config.max_chars_per_request;
            }
        }

        // Default fallback
        default_max_chars_per_request()
    }

    /// Get the request timeout for the active provider
    pub fn get_timeout_secs(&self) -> u64 {
        if let Some(provider_config) = self.get_active_provider_config() {
            if provider_config.timeout_secs > 0 {
                return provider_config.timeout_secs;
            }
        }

        match self.provider {
            TranslationProvider::Anthropic => default_anthropic_timeout_secs(),
            _ => default_timeout_secs(),
        }
    }
}

impl Default for TranslationConfig {
    fn default() -> Self {
        let mut config = Self {
            provider: TranslationProvider::default(),
            available_providers: Vec::new(),
            common: TranslationCommonConfig::default(),
        };

        // Add default providers
        config.available_providers.push(ProviderConfig::new(TranslationProvider::OpenAI));
        config.available_providers.push(ProviderConfig::new(TranslationProvider::DeepSeek));
        config.available_providers.push(ProviderConfig::new(TranslationProvider::Moonshot));
        config.available_providers.push(ProviderConfig::new(TranslationProvider::SiliconFlow));
        config.available_providers.push(ProviderConfig::new(TranslationProvider::Doubao));
        config.available_providers.push(ProviderConfig::new(TranslationProvider::Anthropic));

        config
    }
}
