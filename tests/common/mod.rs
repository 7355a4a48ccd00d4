/*!
 * Shared test helpers.
 */

pub mod mock_providers;

use serde_json::json;

/// Initialize logging for a test binary; repeated calls are no-ops
pub fn init_test_logging() {
    let _ = env_logger::builder().is_test(true).try_init();
}

/// Build a well-formed structured translation payload, the shape every
/// translation-style prompt asks for
pub fn structured_payload(translation: &str, terms: &[(&str, &str, &str)]) -> String {
    let new_terms: Vec<_> = terms
        .iter()
        .map(|(term, translation, reason)| {
            json!({"term": term, "translation": translation, "reason": reason})
        })
        .collect();
    json!({"translation": translation, "new_terms": new_terms}).to_string()
}
