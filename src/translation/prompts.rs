use crate::glossary::GlossaryEntry;

/// Prompt construction for translation, repair, rewrite and probe calls.
///
/// Every prompt asks for the same JSON object shape so one response
/// parser covers all call sites.

/// The JSON contract appended to every translation-style prompt
const RESPONSE_FORMAT_INSTRUCTIONS: &str = "Respond with a JSON object only, in this shape: \
{\"translation\": \"...\", \"new_terms\": [{\"term\": \"...\", \"translation\": \"...\", \"reason\": \"...\"}]}. \
Put the full translated text in \"translation\". In \"new_terms\", list terms that are not in \
the glossary but should be translated consistently across the document, each with the \
translation you chose and a short reason. Output nothing outside the JSON object.";

/// System prompt for the JSON repair call; the repair model must not
/// translate, only fix the structure
pub const REPAIR_SYSTEM_PROMPT: &str = "You are a JSON repair assistant. You only repair \
broken JSON strings and return the corrected JSON. You never return anything else.";

/// A template for a prompt with placeholder variables
#[derive(Debug, Clone)]
pub struct PromptTemplate {
    /// The template text with `{source_language}` / `{target_language}`
    /// placeholders
    template: String,
}

impl PromptTemplate {
    /// Create a new prompt template
    pub fn new(template: impl Into<String>) -> Self {
        Self {
            template: template.into(),
        }
    }

    /// Render the template with the given language display names
    pub fn render(&self, source_language: &str, target_language: &str) -> String {
        self.template
            .replace("{source_language}", source_language)
            .replace("{target_language}", target_language)
    }
}

/// Build the user prompt for one segment. Matched glossary entries are
/// listed first so the authoritative translations land in context before
/// the source text.
pub fn build_translation_prompt(paragraph: &str, matched: &[GlossaryEntry]) -> String {
    let mut prompt = String::new();
    if !matched.is_empty() {
        prompt.push_str("Glossary (use these translations exactly):\n");
        for entry in matched {
            prompt.push_str(&format!("{} -> {}\n", entry.term, entry.translation));
        }
        prompt.push('\n');
    }
    prompt.push_str("Source paragraph:\n");
    prompt.push_str(paragraph);
    prompt.push_str("\n\n");
    prompt.push_str(RESPONSE_FORMAT_INSTRUCTIONS);
    prompt
}

/// Build the user prompt for a JSON repair call
pub fn build_repair_prompt(origin_text: &str) -> String {
    format!(
        "Repair the following invalid JSON string. Return only the repaired JSON, \
nothing else.\nInvalid JSON:\n{origin_text}\nExpected shape: \
{{\"translation\": \"...\", \"new_terms\": [{{\"term\": \"...\", \"translation\": \"...\", \"reason\": \"...\"}}]}}"
    )
}

/// Build the user prompt for the terminology rewrite call. The model
/// rewrites the existing translation so every term in the mapping uses
/// the authoritative translation, reconstructs the notes, and drops the
/// corrected entries from `new_terms`.
pub fn build_rewrite_prompt(
    translation: &str,
    notes: &str,
    corrections: &[(String, String)],
) -> String {
    let mapping: String = corrections
        .iter()
        .map(|(term, authoritative)| format!("{term} -> {authoritative}"))
        .collect::<Vec<_>>()
        .join("\n");
    format!(
        "Rewrite the existing translation so that every term in the mapping below uses \
the mapped translation. Keep the meaning and style unchanged; only normalize terminology. \
Reconstruct the notes from the existing ones and remove entries already corrected by the \
mapping. {RESPONSE_FORMAT_INSTRUCTIONS}\n\nTerm mapping:\n{mapping}\n\nExisting translation:\n{translation}\n\nExisting notes:\n{notes}"
    )
}

/// One canned diagnostic prompt
#[derive(Debug, Clone, Copy)]
pub struct ProbeCase {
    /// Short label for the report
    pub name: &'static str,
    /// The prompt sent to the service
    pub prompt: &'static str,
}

/// The three canned prompts used by the connection probe: a trivial
/// sentence, one with proper nouns, and one long sentence
pub const PROBE_CASES: [ProbeCase; 3] = [
    ProbeCase {
        name: "simple translation",
        prompt: "Translate and respond as JSON with translation and new_terms fields: \
Hello, this is a simple test for API functionality.",
    },
    ProbeCase {
        name: "proper noun translation",
        prompt: "Translate and respond as JSON with translation and new_terms fields: \
Night City is a dangerous place in Cyberpunk 2077.",
    },
    ProbeCase {
        name: "long sentence translation",
        prompt: "Translate and respond as JSON with translation and new_terms fields: \
In the vast expanse of the digital frontier, where information flows like a river and \
technology evolves at an unprecedented pace, we find ourselves navigating through a \
landscape of endless possibilities and unforeseen challenges.",
    },
];
