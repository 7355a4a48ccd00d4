use std::str::FromStr;

use transmark::app_config::{Config, TranslationProvider};

fn config_with_api_key(key: &str) -> Config {
    let mut config = Config::default();
    let provider = config.translation.provider.to_lowercase_string();
    for entry in &mut config.translation.available_providers {
        if entry.provider_type == provider {
            entry.api_key = key.to_string();
        }
    }
    config
}

#[test]
fn test_config_defaults_shouldBeConsistent() {
    let config = Config::default();

    assert_eq!(config.source_language, "en");
    assert_eq!(config.target_language, "zh");
    assert!(config.concurrent);
    assert_eq!(config.consecutive_failure_limit, 3);
    assert_eq!(config.segmentation.max_chunk_size, 600);
    assert_eq!(config.segmentation.min_chunk_size, 300);
    assert!(config.segmentation.preserve_structure);
    assert!(!config.matching.fuzzy_enabled);
    assert!(config.glossary.merge_into_glossary);
    assert_eq!(config.translation.common.retry_count, 3);
    assert_eq!(config.translation.common.repair_attempts, 5);
    assert!(config.translation.common.rate_limit_rpm.is_none());
    assert!(config.translation.common.rewrite_on_conflict);
}

#[test]
fn test_validate_missingApiKey_shouldFail() {
    let config = Config::default();
    let error = config.validate().unwrap_err().to_string();

    assert!(error.contains("API key"));
    assert!(error.contains("OpenAI"));
}

#[test]
fn test_validate_withApiKey_shouldPass() {
    let config = config_with_api_key("sk-test");
    assert!(config.validate().is_ok());
}

#[test]
fn test_validate_sameLanguages_shouldFail() {
    let mut config = config_with_api_key("sk-test");
    config.target_language = "en".to_string();

    let error = config.validate().unwrap_err().to_string();
    assert!(error.contains("both"));
}

#[test]
fn test_validate_equivalentLanguageCodes_shouldFail() {
    // "en" and "eng" are the same language in different ISO flavors
    let mut config = config_with_api_key("sk-test");
    config.target_language = "eng".to_string();

    assert!(config.validate().is_err());
}

#[test]
fn test_validate_invalidEndpoint_shouldFail() {
    let mut config = config_with_api_key("sk-test");
    for entry in &mut config.translation.available_providers {
        entry.endpoint = "not a url".to_string();
    }

    let error = config.validate().unwrap_err().to_string();
    assert!(error.contains("Invalid endpoint URL"));
}

#[test]
fn test_validate_minChunkAboveMax_shouldFail() {
    let mut config = config_with_api_key("sk-test");
    config.segmentation.max_chunk_size = 100;
    config.segmentation.min_chunk_size = 500;

    assert!(config.validate().is_err());
}

#[test]
fn test_provider_fromStr_acceptsAliases() {
    assert_eq!(
        TranslationProvider::from_str("kimi").unwrap(),
        TranslationProvider::Moonshot
    );
    assert_eq!(
        TranslationProvider::from_str("silicon").unwrap(),
        TranslationProvider::SiliconFlow
    );
    assert_eq!(
        TranslationProvider::from_str("ANTHROPIC").unwrap(),
        TranslationProvider::Anthropic
    );
    assert!(TranslationProvider::from_str("azure").is_err());
}

#[test]
fn test_provider_openaiCompatibility_excludesAnthropic() {
    assert!(TranslationProvider::DeepSeek.is_openai_compatible());
    assert!(TranslationProvider::Doubao.is_openai_compatible());
    assert!(!TranslationProvider::Anthropic.is_openai_compatible());
}

#[test]
fn test_translationConfig_getters_shouldFallBackPerProvider() {
    let mut config = Config::default();
    config.translation.provider = TranslationProvider::DeepSeek;

    assert_eq!(config.translation.get_model(), "deepseek-chat");
    assert_eq!(config.translation.get_endpoint(), "https://api.deepseek.com/v1");
    assert_eq!(config.translation.get_max_chars_per_request(), 4000);

    config.translation.provider = TranslationProvider::Anthropic;
    assert_eq!(config.translation.get_max_chars_per_request(), 8000);
    assert_eq!(config.translation.get_timeout_secs(), 60);
}

#[test]
fn test_translationConfig_modelOverride_shouldWinOverDefault() {
    let mut config = Config::default();
    for entry in &mut config.translation.available_providers {
        if entry.provider_type == "openai" {
            entry.model = "gpt-4o".to_string();
        }
    }

    assert_eq!(config.translation.get_model(), "gpt-4o");
}

#[test]
fn test_config_minimalJson_shouldApplyDefaults() {
    let json = r#"{
        "source_language": "en",
        "target_language": "zh",
        "translation": {}
    }"#;
    let config: Config = serde_json::from_str(json).unwrap();

    assert!(config.concurrent);
    assert_eq!(config.translation.provider, TranslationProvider::OpenAI);
    assert_eq!(config.translation.common.retry_count, 3);
    assert_eq!(config.segmentation.max_chunk_size, 600);
}

#[test]
fn test_config_jsonRoundTrip_preservesProviderChoice() {
    let mut config = Config::default();
    config.translation.provider = TranslationProvider::Moonshot;
    config.translation.common.rate_limit_rpm = Some(30);

    let json = serde_json::to_string(&config).unwrap();
    let reloaded: Config = serde_json::from_str(&json).unwrap();

    assert_eq!(reloaded.translation.provider, TranslationProvider::Moonshot);
    assert_eq!(reloaded.translation.common.rate_limit_rpm, Some(30));
}
