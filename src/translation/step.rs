use log::{debug, warn};
use std::collections::HashSet;
use std::time::Duration;

use crate::document::Segment;
use crate::errors::TranslationError;
use crate::glossary::{AggregatedTerminology, Glossary, NewTerm, TermMatcher};
use crate::translation::core::TranslationService;
use crate::translation::prompts::{
    build_repair_prompt, build_rewrite_prompt, build_translation_prompt, REPAIR_SYSTEM_PROMPT,
};
use crate::translation::response::{
    parse_response, recover_fields, ParseFailure, ParsedResponse,
};

/// Per-segment translation: match terms, call the service, validate and
/// repair the structured response, reconcile terminology, all inside an
/// outer retry wrapper. The step never touches shared state; merging new
/// terms into the run's aggregate is the scheduler's job.

/// Cautionary note appended on the degraded path
const DEGRADED_NOTE: &str =
    "Note: retries were exhausted for this segment and the last usable text was kept; \
review it against the source.";

/// Outcome of one completed translation step
#[derive(Debug, Clone)]
pub struct StepOutcome {
    /// The translated segment text
    pub translated_text: String,
    /// Rendered notes block, when the response carried any
    pub annotation_notes: Option<String>,
    /// Tokens spent across every attempt, including repairs and rewrites
    pub token_cost: u64,
    /// Terms proposed for the run's aggregated terminology
    pub new_terms: Vec<NewTerm>,
    /// Heading chain copied from the segment
    pub header_path: Vec<String>,
    /// Position copied from the segment
    pub sequence_number: usize,
    /// Whether this outcome came from the degraded path
    pub degraded: bool,
}

/// Run the translation step for one segment.
///
/// `aggregated` is the caller's snapshot of the run's terminology; the
/// effective glossary is the base merged with it, base entries winning
/// on collision. Image segments pass through untranslated.
pub async fn execute_translation_step(
    service: &TranslationService,
    matcher: &TermMatcher,
    system_prompt: &str,
    segment: &Segment,
    base_glossary: &Glossary,
    aggregated: &AggregatedTerminology,
) -> Result<StepOutcome, TranslationError> {
    if segment.is_image {
        return Ok(StepOutcome {
            translated_text: segment.content.clone(),
            annotation_notes: None,
            token_cost: 0,
            new_terms: Vec::new(),
            header_path: segment.header_path.clone(),
            sequence_number: segment.sequence_number,
            degraded: false,
        });
    }

    let common = &service.config().common;
    let current_glossary = base_glossary.with_aggregated(aggregated);
    let source_text = segment.content_without_marker();

    let retry_count = common.retry_count.max(1);
    let mut token_cost: u64 = 0;
    let mut last_error: Option<String> = None;
    let mut last_parsed: Option<ParsedResponse> = None;
    let mut last_raw: Option<String> = None;

    for attempt in 1..=retry_count {
        if attempt > 1 {
            // Linear backoff: the attempt that just failed waits its own
            // multiple of the base delay.
            let delay = u64::from(attempt - 1) * common.retry_backoff_base_ms;
            tokio::time::sleep(Duration::from_millis(delay)).await;
            debug!(
                "Segment {}: retry attempt {}/{}",
                segment.sequence_number, attempt, retry_count
            );
        }

        let matched = matcher.match_terms(source_text, &current_glossary);
        let prompt = build_translation_prompt(source_text, &matched);

        let raw = match service.completion(system_prompt, &prompt).await {
            Ok((raw, tokens)) => {
                token_cost += tokens;
                raw
            }
            Err(e) => {
                last_error = Some(e.to_string());
                continue;
            }
        };
        last_raw = Some(raw.clone());

        let mut parsed = match parse_response(&raw) {
            Ok(parsed) => parsed,
            Err(ParseFailure::Repairable { origin_text }) => {
                match repair_structured_output(
                    service,
                    &origin_text,
                    common.repair_attempts,
                    &mut token_cost,
                )
                .await
                {
                    Ok(parsed) => parsed,
                    Err(e) => {
                        last_error = Some(e.to_string());
                        continue;
                    }
                }
            }
            Err(ParseFailure::Unstructured) => {
                last_error = Some(
                    TranslationError::StructuredOutput(
                        "response carried no JSON object".to_string(),
                    )
                    .to_string(),
                );
                continue;
            }
        };

        if parsed.translation.trim().is_empty() {
            last_error = Some(
                TranslationError::EmptyTranslation {
                    sequence_number: segment.sequence_number,
                }
                .to_string(),
            );
            continue;
        }
        last_parsed = Some(parsed.clone());

        // Terminology reconcile: proposals colliding with an authoritative
        // entry under a different translation become corrections.
        let corrections: Vec<(String, String)> = parsed
            .new_terms
            .iter()
            .filter_map(|proposed| {
                let term = proposed.term.trim();
                current_glossary
                    .get(term)
                    .filter(|authoritative| *authoritative != proposed.translation.trim())
                    .map(|authoritative| (term.to_string(), authoritative.to_string()))
            })
            .collect();

        if !corrections.is_empty() {
            if common.rewrite_on_conflict {
                let rewrite_prompt =
                    build_rewrite_prompt(&parsed.translation, &parsed.notes, &corrections);
                match service.completion(system_prompt, &rewrite_prompt).await {
                    Ok((raw, tokens)) => {
                        token_cost += tokens;
                        match parse_response(&raw) {
                            Ok(rewritten) if !rewritten.translation.trim().is_empty() => {
                                parsed.translation = rewritten.translation;
                                parsed.notes = rewritten.notes;
                            }
                            _ => warn!(
                                "Segment {}: rewrite response unusable, keeping pre-rewrite text",
                                segment.sequence_number
                            ),
                        }
                    }
                    Err(e) => {
                        last_error = Some(e.to_string());
                        continue;
                    }
                }
            }
            // Corrected terms never reach the aggregate; the authoritative
            // translation already stands.
            let corrected: HashSet<&str> = corrections.iter().map(|(t, _)| t.as_str()).collect();
            parsed
                .new_terms
                .retain(|proposed| !corrected.contains(proposed.term.trim()));
        }

        return Ok(StepOutcome {
            translated_text: parsed.translation,
            annotation_notes: non_empty(parsed.notes),
            token_cost,
            new_terms: parsed.new_terms,
            header_path: segment.header_path.clone(),
            sequence_number: segment.sequence_number,
            degraded: false,
        });
    }

    // Degraded path: retries exhausted, salvage the last usable text.
    // New-term extraction is suppressed here since the output may be stale.
    let recovered = last_parsed
        .filter(|p| !p.translation.trim().is_empty())
        .or_else(|| last_raw.as_deref().and_then(recover_fields));
    if let Some(parsed) = recovered {
        warn!(
            "Segment {}: keeping degraded result after {} attempts",
            segment.sequence_number, retry_count
        );
        let notes = if parsed.notes.trim().is_empty() {
            DEGRADED_NOTE.to_string()
        } else {
            format!("{}\n{}", parsed.notes, DEGRADED_NOTE)
        };
        return Ok(StepOutcome {
            translated_text: parsed.translation,
            annotation_notes: Some(notes),
            token_cost,
            new_terms: Vec::new(),
            header_path: segment.header_path.clone(),
            sequence_number: segment.sequence_number,
            degraded: true,
        });
    }

    Err(TranslationError::RetriesExhausted {
        attempts: retry_count,
        last_error: last_error.unwrap_or_else(|| "unknown error".to_string()),
    })
}

/// Re-submit malformed structured output to the repair call, up to
/// `max_attempts` times
async fn repair_structured_output(
    service: &TranslationService,
    origin_text: &str,
    max_attempts: u32,
    token_cost: &mut u64,
) -> Result<ParsedResponse, TranslationError> {
    let mut last_error = String::from("no repair attempt made");
    for attempt in 1..=max_attempts.max(1) {
        debug!("Repair attempt {}/{}", attempt, max_attempts.max(1));
        match service
            .completion(REPAIR_SYSTEM_PROMPT, &build_repair_prompt(origin_text))
            .await
        {
            Ok((raw, tokens)) => {
                *token_cost += tokens;
                match parse_response(&raw) {
                    Ok(parsed) => return Ok(parsed),
                    Err(ParseFailure::Repairable { .. }) => {
                        last_error = "repair call returned invalid JSON".to_string();
                    }
                    Err(ParseFailure::Unstructured) => {
                        last_error = "repair call returned unstructured text".to_string();
                    }
                }
            }
            Err(e) => last_error = e.to_string(),
        }
    }
    Err(TranslationError::RepairExhausted {
        attempts: max_attempts.max(1),
        last_error,
    })
}

fn non_empty(text: String) -> Option<String> {
    if text.trim().is_empty() {
        None
    } else {
        Some(text)
    }
}
