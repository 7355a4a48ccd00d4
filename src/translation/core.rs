/*!
 * Core translation service implementation.
 *
 * This module owns the outbound side of the pipeline: the provider client
 * selected from configuration, the shared requests-per-minute gate, token
 * accounting, and the diagnostic probe used by the failure policy.
 */

use anyhow::Result;
use log::{debug, error, info};
use parking_lot::Mutex;
use std::collections::VecDeque;
use std::sync::Arc;
use std::time::{Duration, Instant};

use crate::app_config::TranslationConfig;
use crate::errors::ProviderError;
use crate::providers::anthropic::{Anthropic, AnthropicRequest};
use crate::providers::openai::{ChatRequest, OpenAIFormat};
use crate::providers::Provider;
use crate::translation::prompts::PROBE_CASES;

/// Rolling window length of the rate limiter
const RATE_LIMIT_WINDOW: Duration = Duration::from_secs(60);

/// Output cap for Anthropic requests, which require an explicit maximum
const ANTHROPIC_MAX_OUTPUT_TOKENS: u32 = 4096;

/// System prompt for diagnostic probe calls
const PROBE_SYSTEM_PROMPT: &str =
    "You are a professional translator. Respond with a JSON object containing \
translation and new_terms fields.";

/// Sliding-window requests-per-minute gate shared by all workers.
///
/// A call that would exceed the cap sleeps until the oldest timestamp
/// ages out of the rolling window. Sleeping happens outside the lock so
/// waiting callers do not serialize each other.
#[derive(Debug)]
pub struct RateLimiter {
    /// Maximum calls per rolling window; zero disables the limiter
    limit: u32,
    /// Timestamps of calls inside the current window, oldest first
    window: Mutex<VecDeque<Instant>>,
}

impl RateLimiter {
    /// Create a rate limiter; `None` or zero disables throttling
    pub fn new(limit: Option<u32>) -> Self {
        Self {
            limit: limit.unwrap_or(0),
            window: Mutex::new(VecDeque::new()),
        }
    }

    /// Whether the limiter actually throttles
    pub fn is_enabled(&self) -> bool {
        self.limit > 0
    }

    /// Claim a slot, sleeping until one frees when the window is full
    pub async fn acquire(&self) {
        if self.limit == 0 {
            return;
        }
        loop {
            let wait = {
                let mut window = self.window.lock();
                let now = Instant::now();
                while window
                    .front()
                    .is_some_and(|t| now.duration_since(*t) >= RATE_LIMIT_WINDOW)
                {
                    window.pop_front();
                }
                if (window.len() as u32) < self.limit {
                    window.push_back(now);
                    None
                } else {
                    window
                        .front()
                        .map(|oldest| RATE_LIMIT_WINDOW.saturating_sub(now.duration_since(*oldest)))
                }
            };
            match wait {
                None => return,
                Some(delay) if delay.is_zero() => tokio::task::yield_now().await,
                Some(delay) => {
                    debug!("Rate limit reached, waiting {:.1}s", delay.as_secs_f64());
                    tokio::time::sleep(delay).await;
                }
            }
        }
    }
}

/// Token usage accumulated over one run
#[derive(Debug, Clone)]
pub struct TokenUsageStats {
    /// Total tokens reported by the service across all calls
    pub total_tokens: u64,
    /// Number of calls accounted for
    pub request_count: u64,
    /// Provider name for reporting
    pub provider: String,
    /// Model name for reporting
    pub model: String,
    /// When tracking started
    started_at: Instant,
}

impl TokenUsageStats {
    /// Create empty stats
    pub fn new() -> Self {
        Self::with_provider_info(String::new(), String::new())
    }

    /// Create empty stats carrying provider/model labels for the summary
    pub fn with_provider_info(provider: String, model: String) -> Self {
        Self {
            total_tokens: 0,
            request_count: 0,
            provider,
            model,
            started_at: Instant::now(),
        }
    }

    /// Record one call's token cost
    pub fn add_tokens(&mut self, tokens: u64) {
        self.total_tokens += tokens;
        self.request_count += 1;
    }

    /// Time since tracking started
    pub fn elapsed(&self) -> Duration {
        self.started_at.elapsed()
    }

    /// Average token throughput over the tracked period
    pub fn tokens_per_minute(&self) -> f64 {
        let minutes = self.elapsed().as_secs_f64() / 60.0;
        if minutes > 0.0 {
            self.total_tokens as f64 / minutes
        } else {
            0.0
        }
    }

    /// One-line human summary for the end of a run
    pub fn summary(&self) -> String {
        format!(
            "{}/{}: {} tokens over {} requests in {:.1}s ({:.0} tokens/min)",
            self.provider,
            self.model,
            self.total_tokens,
            self.request_count,
            self.elapsed().as_secs_f64(),
            self.tokens_per_minute()
        )
    }
}

impl Default for TokenUsageStats {
    fn default() -> Self {
        Self::new()
    }
}

/// The provider variant selected at construction from configuration
#[derive(Debug)]
pub enum TranslationProviderImpl {
    /// Any chat-completions gateway (OpenAI, DeepSeek, Moonshot,
    /// SiliconFlow, Doubao)
    OpenAIFormat(OpenAIFormat),
    /// Anthropic messages API
    Anthropic(Anthropic),
}

/// Outcome of one diagnostic probe case
#[derive(Debug, Clone)]
pub struct ProbeOutcome {
    /// Case label
    pub name: &'static str,
    /// Whether the call returned a response
    pub success: bool,
    /// Token cost of the call, when reported
    pub tokens: u64,
    /// Round-trip time of the call
    pub latency: Duration,
    /// Error text on failure
    pub error: Option<String>,
}

/// Aggregated result of the three-case connection probe
#[derive(Debug, Clone)]
pub struct DiagnosticsReport {
    /// Provider label
    pub provider: String,
    /// Model label
    pub model: String,
    /// Per-case outcomes in probe order
    pub cases: Vec<ProbeOutcome>,
}

impl DiagnosticsReport {
    /// Whether every probe case succeeded
    pub fn all_passed(&self) -> bool {
        self.cases.iter().all(|c| c.success)
    }

    /// Whether every probe case failed, indicating a systemic outage
    pub fn all_failed(&self) -> bool {
        !self.cases.is_empty() && self.cases.iter().all(|c| !c.success)
    }

    /// Log the report, one line per case
    pub fn log(&self) {
        info!(
            "Diagnostics for {}/{}: {}/{} probe cases passed",
            self.provider,
            self.model,
            self.cases.iter().filter(|c| c.success).count(),
            self.cases.len()
        );
        for case in &self.cases {
            match &case.error {
                None => info!(
                    "  probe '{}': ok in {:.2}s ({} tokens)",
                    case.name,
                    case.latency.as_secs_f64(),
                    case.tokens
                ),
                Some(error) => error!("  probe '{}': {}", case.name, error),
            }
        }
    }
}

/// The outbound face of the pipeline: one provider client, one shared
/// rate limiter, and the translation settings they operate under
#[derive(Debug, Clone)]
pub struct TranslationService {
    /// Selected provider client
    provider: Arc<TranslationProviderImpl>,
    /// Translation configuration this service was built from
    config: TranslationConfig,
    /// Shared requests-per-minute gate
    rate_limiter: Arc<RateLimiter>,
}

impl TranslationService {
    /// Create a new translation service from configuration
    pub fn new(config: TranslationConfig) -> Result<Self> {
        let api_key = config.get_api_key();
        let endpoint = config.get_endpoint();
        let timeout_secs = config.get_timeout_secs();

        // The step has its own retry wrapper, so the transport client
        // keeps a short retry budget of its own.
        let provider = if config.provider.is_openai_compatible() {
            TranslationProviderImpl::OpenAIFormat(OpenAIFormat::new_with_config(
                api_key,
                endpoint,
                2,
                1000,
                timeout_secs,
            ))
        } else {
            TranslationProviderImpl::Anthropic(Anthropic::new_with_config(
                api_key,
                endpoint,
                2,
                1000,
                timeout_secs,
            ))
        };

        let rate_limiter = Arc::new(RateLimiter::new(config.common.rate_limit_rpm));

        Ok(Self {
            provider: Arc::new(provider),
            config,
            rate_limiter,
        })
    }

    /// The translation configuration this service was built from
    pub fn config(&self) -> &TranslationConfig {
        &self.config
    }

    /// Issue one completion call and return the response text with its
    /// token cost. This is the single point of outbound I/O; every call
    /// passes the rate limiter first.
    pub async fn completion(
        &self,
        system_prompt: &str,
        user_prompt: &str,
    ) -> Result<(String, u64), ProviderError> {
        self.rate_limiter.acquire().await;

        let model = self.config.get_model();
        let temperature = self.config.common.temperature;

        match self.provider.as_ref() {
            TranslationProviderImpl::OpenAIFormat(client) => {
                let request = ChatRequest::new(model)
                    .add_message("system", system_prompt)
                    .add_message("user", user_prompt)
                    .temperature(temperature)
                    .json_mode();
                let response = client.complete(request).await?;
                let text = OpenAIFormat::extract_text(&response);
                let tokens = OpenAIFormat::extract_token_usage(&response).unwrap_or(0);
                Ok((text, tokens))
            }
            TranslationProviderImpl::Anthropic(client) => {
                let request = AnthropicRequest::new(model, ANTHROPIC_MAX_OUTPUT_TOKENS)
                    .system(system_prompt)
                    .add_message("user", user_prompt)
                    .temperature(temperature);
                let response = client.complete(request).await?;
                let text = Anthropic::extract_text(&response);
                let tokens = Anthropic::extract_token_usage(&response).unwrap_or(0);
                Ok((text, tokens))
            }
        }
    }

    /// Probe the service with a minimal request
    pub async fn test_connection(&self) -> Result<(), ProviderError> {
        let model = self.config.get_model();
        match self.provider.as_ref() {
            TranslationProviderImpl::OpenAIFormat(client) => client.test_connection(&model).await,
            TranslationProviderImpl::Anthropic(client) => client.test_connection(&model).await,
        }
    }

    /// Run the three-case connection probe and report per-case outcomes.
    /// Fired by the scheduler's failure policy after segment failures.
    pub async fn run_diagnostics(&self) -> DiagnosticsReport {
        let mut cases = Vec::with_capacity(PROBE_CASES.len());
        for case in PROBE_CASES {
            let started = Instant::now();
            let outcome = match self.completion(PROBE_SYSTEM_PROMPT, case.prompt).await {
                Ok((_, tokens)) => ProbeOutcome {
                    name: case.name,
                    success: true,
                    tokens,
                    latency: started.elapsed(),
                    error: None,
                },
                Err(e) => ProbeOutcome {
                    name: case.name,
                    success: false,
                    tokens: 0,
                    latency: started.elapsed(),
                    error: Some(e.to_string()),
                },
            };
            cases.push(outcome);
        }
        let report = DiagnosticsReport {
            provider: self.config.provider.display_name().to_string(),
            model: self.config.get_model(),
            cases,
        };
        report.log();
        report
    }
}
