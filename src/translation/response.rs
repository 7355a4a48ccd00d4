use once_cell::sync::Lazy;
use regex::Regex;
use serde::Deserialize;

use crate::glossary::NewTerm;

/// Structured translation response parsing.
///
/// The service is asked for a JSON object with a primary `translation`
/// field and an optional `new_terms` array. Reasoning models may wrap the
/// object in `<think>` blocks or prose; parsing strips the former and
/// falls back to the outermost brace window for the latter.

/// Wire shape of a structured translation response
#[derive(Debug, Deserialize)]
struct StructuredResponse {
    translation: String,
    #[serde(default)]
    new_terms: Vec<NewTerm>,
}

/// A validated response with notes already rendered
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ParsedResponse {
    /// The translated segment text
    pub translation: String,
    /// Rendered notes block, empty when the response proposed no terms
    pub notes: String,
    /// Terms the service proposed for the run's aggregated terminology
    pub new_terms: Vec<NewTerm>,
}

/// Why a raw payload could not be parsed
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ParseFailure {
    /// A JSON-looking object is present but does not deserialize; the
    /// cleaned payload is carried for the repair call
    Repairable {
        /// The payload handed to the repair prompt
        origin_text: String,
    },
    /// No JSON object anywhere in the payload
    Unstructured,
}

static THINK_BLOCK_REGEX: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?s)<think>.*?</think>").unwrap());

static TRANSLATION_FIELD_REGEX: Lazy<Regex> =
    Lazy::new(|| Regex::new(r#""translation"\s*:\s*("(?:[^"\\]|\\.)*")"#).unwrap());

static NOTES_FIELD_REGEX: Lazy<Regex> =
    Lazy::new(|| Regex::new(r#""notes"\s*:\s*("(?:[^"\\]|\\.)*")"#).unwrap());

/// Remove `<think>...</think>` reasoning blocks and surrounding whitespace
pub fn strip_reasoning(raw: &str) -> String {
    THINK_BLOCK_REGEX.replace_all(raw, "").trim().to_string()
}

/// Parse a raw service payload into a [`ParsedResponse`].
///
/// Order of attempts: the whole cleaned payload as JSON, then the
/// outermost `{...}` window. A brace window that still fails to
/// deserialize is repairable; a payload with no braces is not.
pub fn parse_response(raw: &str) -> Result<ParsedResponse, ParseFailure> {
    let cleaned = strip_reasoning(raw);

    if let Ok(parsed) = serde_json::from_str::<StructuredResponse>(&cleaned) {
        return Ok(finish(parsed));
    }

    match brace_window(&cleaned) {
        Some(window) => {
            if let Ok(parsed) = serde_json::from_str::<StructuredResponse>(window) {
                Ok(finish(parsed))
            } else {
                Err(ParseFailure::Repairable {
                    origin_text: cleaned,
                })
            }
        }
        None => Err(ParseFailure::Unstructured),
    }
}

fn finish(parsed: StructuredResponse) -> ParsedResponse {
    let new_terms: Vec<NewTerm> = parsed
        .new_terms
        .into_iter()
        .filter(|t| !t.term.trim().is_empty())
        .collect();
    let notes = render_notes(&new_terms);
    ParsedResponse {
        translation: parsed.translation,
        notes,
        new_terms,
    }
}

/// The outermost `{...}` span of the text, when one exists
fn brace_window(text: &str) -> Option<&str> {
    let start = text.find('{')?;
    let end = text.rfind('}')?;
    if end > start {
        Some(&text[start..=end])
    } else {
        None
    }
}

/// Render proposed terms as a notes block, one bullet per term
pub fn render_notes(new_terms: &[NewTerm]) -> String {
    let mut lines: Vec<String> = Vec::with_capacity(new_terms.len());
    for term in new_terms {
        let source = term.term.trim();
        let translation = term.translation.trim();
        let reason = term.reason.trim();
        let mut line = if translation.is_empty() {
            format!("- {source}")
        } else {
            format!("- {translation} (原文: {source})")
        };
        if !reason.is_empty() {
            line.push_str(&format!("：{reason}"));
        }
        lines.push(line);
    }
    lines.join("\n")
}

/// Best-effort extraction of the translation and notes fields from a raw
/// payload that never parsed. Used only on the degraded path after both
/// retries and repairs are exhausted.
pub fn recover_fields(raw: &str) -> Option<ParsedResponse> {
    let cleaned = strip_reasoning(raw);
    let translation = TRANSLATION_FIELD_REGEX
        .captures(&cleaned)
        .and_then(|c| c.get(1))
        .and_then(|m| serde_json::from_str::<String>(m.as_str()).ok())?;
    if translation.trim().is_empty() {
        return None;
    }
    let notes = NOTES_FIELD_REGEX
        .captures(&cleaned)
        .and_then(|c| c.get(1))
        .and_then(|m| serde_json::from_str::<String>(m.as_str()).ok())
        .unwrap_or_default();
    Some(ParsedResponse {
        translation,
        notes,
        new_terms: Vec::new(),
    })
}
