use anyhow::{Result, anyhow};
use isolang::Language;

/// Language utilities for ISO language code handling
///
/// This module resolves the language identifiers users put in configuration
/// or on the command line. Accepted forms: ISO 639-1 (2-letter) codes,
/// ISO 639-2/T and 639-2/B (3-letter) codes, and English language names
/// ("english", "chinese"). Prompts are built from the English display name.
/// ISO 639-2/B codes that differ from their 639-2/T counterpart
const PART2B_TO_PART2T: [(&str, &str); 18] = [
    ("fre", "fra"), // French
    ("ger", "deu"), // German
    ("dut", "nld"), // Dutch
    ("gre", "ell"), // Greek
    ("chi", "zho"), // Chinese
    ("cze", "ces"), // Czech
    ("ice", "isl"), // Icelandic
    ("alb", "sqi"), // Albanian
    ("arm", "hye"), // Armenian
    ("baq", "eus"), // Basque
    ("bur", "mya"), // Burmese
    ("per", "fas"), // Persian
    ("geo", "kat"), // Georgian
    ("may", "msa"), // Malay
    ("mac", "mkd"), // Macedonian
    ("rum", "ron"), // Romanian
    ("slo", "slk"), // Slovak
    ("wel", "cym"), // Welsh
];

fn part2b_to_part2t(code: &str) -> Option<&'static str> {
    PART2B_TO_PART2T
        .iter()
        .find(|(b, _)| *b == code)
        .map(|(_, t)| *t)
}

/// Resolve a user-supplied language identifier to an isolang Language.
/// Tries 2-letter codes, then 3-letter codes (both 639-2 flavors), then
/// English names.
pub fn resolve_language(identifier: &str) -> Result<Language> {
    let normalized = identifier.trim().to_lowercase();
    if normalized.is_empty() {
        return Err(anyhow!("Empty language identifier"));
    }

    if normalized.len() == 2 {
        if let Some(lang) = Language::from_639_1(&normalized) {
            return Ok(lang);
        }
    } else if normalized.len() == 3 {
        if let Some(lang) = Language::from_639_3(&normalized) {
            return Ok(lang);
        }
        if let Some(part2t) = part2b_to_part2t(&normalized) {
            if let Some(lang) = Language::from_639_3(part2t) {
                return Ok(lang);
            }
        }
    }

    let trimmed = identifier.trim();
    if let Some(lang) = Language::from_name(trimmed) {
        return Ok(lang);
    }
    // Registry names are capitalized ("English", "Chinese")
    if let Some(lang) = Language::from_name(&capitalize_first(trimmed)) {
        return Ok(lang);
    }

    Err(anyhow!("Invalid language identifier: {}", identifier))
}

fn capitalize_first(name: &str) -> String {
    let mut chars = name.chars();
    match chars.next() {
        Some(first) => first.to_uppercase().collect::<String>() + &chars.as_str().to_lowercase(),
        None => String::new(),
    }
}

/// Normalize a language identifier to ISO 639-2/T (3-letter) format
pub fn normalize_to_part2t(identifier: &str) -> Result<String> {
    let lang = resolve_language(identifier)?;
    Ok(lang.to_639_3().to_string())
}

/// Check if two language identifiers represent the same language
pub fn language_codes_match(first: &str, second: &str) -> bool {
    match (normalize_to_part2t(first), normalize_to_part2t(second)) {
        (Ok(a), Ok(b)) => a == b,
        _ => false,
    }
}

/// Get the English language name from an identifier, for prompt text
pub fn get_language_name(identifier: &str) -> Result<String> {
    let lang = resolve_language(identifier)?;
    Ok(lang.to_name().to_string())
}
