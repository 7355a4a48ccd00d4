/*!
 * Terminology matching.
 *
 * Finds which glossary entries actually occur in a segment. Text is
 * normalized first (lowercased, nouns singularized by a small heuristic),
 * then every term is searched with its leading article stripped, both bare
 * and with article-prefixed variants. Hits must be bounded by
 * non-alphanumeric, non-underscore characters on both sides. An optional
 * fuzzy pass tolerates small typos in single-word terms.
 */

use once_cell::sync::Lazy;
use regex::Regex;

use super::{Glossary, GlossaryEntry};

static TOKEN_REGEX: Lazy<Regex> = Lazy::new(|| Regex::new(r"[\p{L}\p{N}_]+").unwrap());

const ARTICLES: [&str; 3] = ["the", "a", "an"];

// @struct: Glossary matcher over normalized segment text
#[derive(Debug, Clone)]
pub struct TermMatcher {
    // @field: Whether the typo-tolerant pass runs at all
    fuzzy_enabled: bool,

    // @field: Maximum edit distance accepted by the fuzzy pass
    fuzzy_max_distance: usize,
}

impl Default for TermMatcher {
    fn default() -> Self {
        Self {
            fuzzy_enabled: false,
            fuzzy_max_distance: 1,
        }
    }
}

impl TermMatcher {
    pub fn new(fuzzy_enabled: bool, fuzzy_max_distance: usize) -> Self {
        Self {
            fuzzy_enabled,
            fuzzy_max_distance,
        }
    }

    /// The subset of glossary entries present in `text`. Deterministic for
    /// identical inputs; duplicate occurrences collapse to one entry.
    pub fn match_terms(&self, text: &str, glossary: &Glossary) -> Vec<GlossaryEntry> {
        let normalized = lemmatize_text(text);
        let mut matches = Vec::new();

        for entry in glossary.entries() {
            let base = strip_leading_article(&entry.term).to_lowercase();
            if base.is_empty() {
                continue;
            }

            let mut hit = bounded_contains(&normalized, &base)
                || ARTICLES
                    .iter()
                    .any(|article| bounded_contains(&normalized, &format!("{article} {base}")));

            // Looser fallback for phrases: everything up to the last word
            if !hit {
                let words: Vec<&str> = base.split_whitespace().collect();
                if words.len() > 1 {
                    hit = words[..words.len() - 1]
                        .iter()
                        .all(|word| bounded_contains(&normalized, word));
                }
            }

            if !hit && self.fuzzy_enabled && !base.contains(char::is_whitespace) {
                hit = TOKEN_REGEX.find_iter(&normalized).any(|token| {
                    levenshtein_distance(token.as_str(), &base) <= self.fuzzy_max_distance
                });
            }

            if hit {
                matches.push(entry.clone());
            }
        }
        matches
    }
}

/// Lowercase the text and singularize each word token, preserving the
/// separators between tokens so boundaries survive normalization
fn lemmatize_text(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    let mut last_end = 0;
    for token in TOKEN_REGEX.find_iter(text) {
        out.push_str(&text[last_end..token.start()]);
        out.push_str(&singularize(&token.as_str().to_lowercase()));
        last_end = token.end();
    }
    out.push_str(&text[last_end..]);
    out
}

/// Singular form of a lowercased noun, by heuristic: `-ies` → `-y`, `-es`
/// after a sibilant, bare `-s` otherwise. Words ending in `-ss`, `-us` or
/// `-is` are left alone.
fn singularize(word: &str) -> String {
    if word.len() > 3 {
        if let Some(stem) = word.strip_suffix("ies") {
            return format!("{stem}y");
        }
        if let Some(stem) = word.strip_suffix("es") {
            if stem.ends_with(['s', 'x', 'z']) || stem.ends_with("sh") || stem.ends_with("ch") {
                return stem.to_string();
            }
        }
        if word.ends_with('s')
            && !word.ends_with("ss")
            && !word.ends_with("us")
            && !word.ends_with("is")
        {
            return word[..word.len() - 1].to_string();
        }
    }
    word.to_string()
}

/// Strip one leading article when a remainder follows
fn strip_leading_article(term: &str) -> &str {
    let trimmed = term.trim();
    for article in ARTICLES {
        if trimmed.len() > article.len() + 1 {
            let (head, rest) = trimmed.split_at(article.len());
            if head.eq_ignore_ascii_case(article) && rest.starts_with(char::is_whitespace) {
                return rest.trim_start();
            }
        }
    }
    trimmed
}

/// Whether `needle` occurs in `haystack` bounded by non-alphanumeric,
/// non-underscore characters (or the text edges) on both sides
fn bounded_contains(haystack: &str, needle: &str) -> bool {
    if needle.is_empty() {
        return false;
    }
    let mut search_from = 0;
    while let Some(found) = haystack[search_from..].find(needle) {
        let start = search_from + found;
        let end = start + needle.len();

        let left_ok = haystack[..start]
            .chars()
            .next_back()
            .map_or(true, |c| !c.is_alphanumeric() && c != '_');
        let right_ok = haystack[end..]
            .chars()
            .next()
            .map_or(true, |c| !c.is_alphanumeric() && c != '_');
        if left_ok && right_ok {
            return true;
        }

        search_from = start + needle.chars().next().map_or(1, char::len_utf8);
        if search_from >= haystack.len() {
            break;
        }
    }
    false
}

/// Levenshtein distance with the two-row optimization
fn levenshtein_distance(a: &str, b: &str) -> usize {
    let a_chars: Vec<char> = a.chars().collect();
    let b_chars: Vec<char> = b.chars().collect();
    let a_len = a_chars.len();
    let b_len = b_chars.len();

    if a_len == 0 {
        return b_len;
    }
    if b_len == 0 {
        return a_len;
    }

    let mut prev_row: Vec<usize> = (0..=b_len).collect();
    let mut curr_row: Vec<usize> = vec![0; b_len + 1];

    for i in 1..=a_len {
        curr_row[0] = i;
        for j in 1..=b_len {
            let cost = if a_chars[i - 1] == b_chars[j - 1] { 0 } else { 1 };
            curr_row[j] = (prev_row[j] + 1)
                .min(curr_row[j - 1] + 1)
                .min(prev_row[j - 1] + cost);
        }
        std::mem::swap(&mut prev_row, &mut curr_row);
    }

    prev_row[b_len]
}

#[cfg(test)]
mod tests {
    use super::*;

    fn glossary_of(pairs: &[(&str, &str)]) -> Glossary {
        Glossary::from_pairs(pairs.iter().map(|(t, tr)| (*t, *tr)))
    }

    #[test]
    fn test_matchTerms_pluralTextWithArticleTerm_shouldMatch() {
        let glossary = glossary_of(&[("the Outlaw", "法外之徒")]);
        let matcher = TermMatcher::default();

        let matches = matcher.match_terms(
            "A cell of Outlaws must pass a polygraph examination and interrogation.",
            &glossary,
        );
        assert_eq!(matches.len(), 1);
        assert_eq!(matches[0].term, "the Outlaw");
        assert_eq!(matches[0].translation, "法外之徒");
    }

    #[test]
    fn test_matchTerms_lowercasePluralText_shouldMatch() {
        let glossary = glossary_of(&[("the Outlaw", "法外之徒")]);
        let matcher = TermMatcher::default();

        let matches = matcher.match_terms("a group of outlaws gathered.", &glossary);
        assert_eq!(matches.len(), 1);
    }

    #[test]
    fn test_matchTerms_indefiniteArticleInText_shouldMatch() {
        let glossary = glossary_of(&[("the Outlaw", "法外之徒")]);
        let matcher = TermMatcher::default();

        let matches = matcher.match_terms("They captured an outlaw yesterday.", &glossary);
        assert_eq!(matches.len(), 1);
    }

    #[test]
    fn test_matchTerms_substringOfLongerWord_shouldNotMatch() {
        let glossary = glossary_of(&[("the", "这")]);
        let matcher = TermMatcher::default();

        let matches = matcher.match_terms("theorem proving is hard", &glossary);
        assert!(matches.is_empty());
    }

    #[test]
    fn test_matchTerms_underscoreBoundary_shouldNotMatch() {
        let glossary = glossary_of(&[("priority", "优先级")]);
        let matcher = TermMatcher::default();

        let matches = matcher.match_terms("the_priority_is_set flag", &glossary);
        assert!(matches.is_empty());
    }

    #[test]
    fn test_matchTerms_multiWordFallback_shouldMatchOnLeadingWords() {
        let glossary = glossary_of(&[("Night City Legends", "夜之城传奇")]);
        let matcher = TermMatcher::default();

        let matches = matcher.match_terms("every night city corner has a story", &glossary);
        assert_eq!(matches.len(), 1);
    }

    #[test]
    fn test_matchTerms_sibilantPlural_shouldMatch() {
        let glossary = glossary_of(&[("church", "教堂")]);
        let matcher = TermMatcher::default();

        let matches = matcher.match_terms("The old churches survived.", &glossary);
        assert_eq!(matches.len(), 1);
    }

    #[test]
    fn test_matchTerms_repeatedOccurrences_shouldCollapseToOneEntry() {
        let glossary = glossary_of(&[("outlaw", "法外之徒")]);
        let matcher = TermMatcher::default();

        let text = "One outlaw met another outlaw.";
        let first = matcher.match_terms(text, &glossary);
        let second = matcher.match_terms(text, &glossary);
        assert_eq!(first.len(), 1);
        assert_eq!(first, second);
    }

    #[test]
    fn test_matchTerms_fuzzyDisabled_typo_shouldNotMatch() {
        let glossary = glossary_of(&[("Arasaka", "荒坂")]);
        let matcher = TermMatcher::new(false, 1);

        let matches = matcher.match_terms("the araska tower looms", &glossary);
        assert!(matches.is_empty());
    }

    #[test]
    fn test_matchTerms_fuzzyEnabled_typoWithinDistance_shouldMatch() {
        let glossary = glossary_of(&[("Arasaka", "荒坂")]);
        let matcher = TermMatcher::new(true, 1);

        let matches = matcher.match_terms("the araska tower looms", &glossary);
        assert_eq!(matches.len(), 1);
    }

    #[test]
    fn test_matchTerms_fuzzyEnabled_multiWordTerm_shouldSkipFuzzyPass() {
        let glossary = glossary_of(&[("Night City", "夜之城")]);
        let matcher = TermMatcher::new(true, 1);

        // "nigh" is within distance 1 of neither pattern as a phrase
        let matches = matcher.match_terms("nigh citty", &glossary);
        assert!(matches.is_empty());
    }

    #[test]
    fn test_singularize_heuristicRules() {
        assert_eq!(singularize("stories"), "story");
        assert_eq!(singularize("boxes"), "box");
        assert_eq!(singularize("churches"), "church");
        assert_eq!(singularize("outlaws"), "outlaw");
        assert_eq!(singularize("glass"), "glass");
        assert_eq!(singularize("census"), "census");
        assert_eq!(singularize("analysis"), "analysis");
        assert_eq!(singularize("its"), "its");
    }

    #[test]
    fn test_stripLeadingArticle_variants() {
        assert_eq!(strip_leading_article("the Outlaw"), "Outlaw");
        assert_eq!(strip_leading_article("An Example"), "Example");
        assert_eq!(strip_leading_article("a Test"), "Test");
        assert_eq!(strip_leading_article("the"), "the");
        assert_eq!(strip_leading_article("Theory"), "Theory");
    }

    #[test]
    fn test_boundedContains_edges() {
        assert!(bounded_contains("outlaw", "outlaw"));
        assert!(bounded_contains("an outlaw.", "outlaw"));
        assert!(!bounded_contains("outlaws", "outlaw"));
        assert!(!bounded_contains("the_outlaw", "outlaw"));
    }
}
