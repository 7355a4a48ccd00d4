/*!
 * # TransMark - Markdown translation with AI
 *
 * A Rust library for translating Markdown documents using LLM providers.
 *
 * ## Features
 *
 * - Split Markdown into translation-sized segments while preserving the
 *   heading hierarchy
 * - Translate segments with various AI providers:
 *   - OpenAI-format gateways (OpenAI, DeepSeek, Moonshot, SiliconFlow, Doubao)
 *   - Anthropic API
 * - Glossary-driven terminology consistency with conflict reconciliation
 * - Concurrent translation with strictly ordered output
 * - Resumable runs via an intermediate checkpoint file
 * - ISO 639-1 and ISO 639-2 language code support
 *
 * ## Architecture
 *
 * The library is organized in these main modules:
 * - `app_config`: Configuration management
 * - `document`: Markdown segmentation, merging and ordered output writing
 * - `glossary`: Authoritative terminology, matching and persistence
 * - `translation`: AI-powered translation pipeline:
 *   - `translation::core`: Provider selection, rate limiting and diagnostics
 *   - `translation::step`: The per-segment translation state machine
 *   - `translation::batch`: The concurrent scheduler and ordered flush
 *   - `translation::checkpoint`: Intermediate-state persistence
 * - `file_utils`: File system operations and run artifacts
 * - `app_controller`: Main application controller
 * - `language_utils`: ISO language code utilities
 * - `providers`: Client implementations for the LLM providers:
 *   - `providers::openai`: OpenAI-format chat-completions client
 *   - `providers::anthropic`: Anthropic API client
 * - `errors`: Custom error types for the application
 *
 * ## License
 *
 * This project is licensed under the MIT License
 */

// Global lints configuration
// These lints will be allowed but not auto-fixed
#![allow(clippy::uninlined_format_args)]
#![allow(clippy::redundant_closure_for_method_calls)]

// Public modules
pub mod app_config;
pub mod app_controller;
pub mod document;
pub mod errors;
pub mod file_utils;
pub mod glossary;
pub mod language_utils;
pub mod providers;
pub mod translation;

// Re-export main types for easier usage
pub use app_config::Config;
pub use document::{Merger, OutputWriter, Segment, Segmenter};
pub use errors::{AppError, GlossaryError, ProviderError, TranslationError};
pub use glossary::{AggregatedTerminology, Glossary, TermMatcher};
pub use language_utils::{get_language_name, language_codes_match, normalize_to_part2t};
pub use translation::TranslationService;
