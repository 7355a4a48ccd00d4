/*!
 * Segment translation pipeline.
 *
 * This module contains the outbound half of the application: the service
 * that talks to the LLM providers and the machinery that turns segments
 * into ordered, translated output. It is split into several submodules:
 *
 * - `core`: Provider selection, rate limiting, token accounting and the
 *   diagnostic probe
 * - `prompts`: Prompt templates and builders for every call kind
 * - `response`: Structured-response parsing, repair detection and
 *   best-effort recovery
 * - `step`: The per-segment state machine with retry, repair and
 *   terminology reconciliation
 * - `checkpoint`: Intermediate-state persistence for resumable runs
 * - `batch`: The concurrent scheduler and ordered flush
 */

// Re-export main types for easier usage
pub use self::batch::{BatchOutcome, BatchScheduler, DiagnosticsGate, OrderedFlush};
pub use self::checkpoint::{Checkpoint, CheckpointRecord, RecordStatus};
pub use self::core::{DiagnosticsReport, RateLimiter, TokenUsageStats, TranslationService};
pub use self::prompts::PromptTemplate;
pub use self::response::{parse_response, ParseFailure, ParsedResponse};
pub use self::step::{execute_translation_step, StepOutcome};

// Submodules
pub mod batch;
pub mod checkpoint;
pub mod core;
pub mod prompts;
pub mod response;
pub mod step;
