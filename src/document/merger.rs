/*!
 * Segment merging.
 *
 * Post-processes the atomic segments produced by the segmenter: undersized
 * segments and sentences broken across a segment boundary are merged back
 * together, looking ahead past image segments without ever absorbing them.
 * The final sequence is renumbered densely from 1.
 */

use super::segmenter::Segment;

/// Punctuation that closes a sentence and blocks bridging
const TERMINAL_PUNCTUATION: [char; 9] = ['.', '。', '!', '！', '?', '？', '…', ':', '：'];

/// Abbreviation endings that block bridging even without a closing period
const ABBREVIATIONS: [&str; 8] = ["etc", "vs", "cf", "vol", "no", "fig", "eq", "approx"];

/// Structural keywords that open a new block and never continue a sentence
const STRUCTURAL_KEYWORDS: [&str; 7] = [
    "chapter", "section", "figure", "table", "appendix", "part", "第",
];

/// Closed list of words that typically continue a sentence when they open
/// the next segment: conjunctions, relative pronouns, prepositions and
/// transition adverbs. Hand-tuned, kept small on purpose.
const CONTINUATION_WORDS: [&str; 44] = [
    "and", "but", "or", "nor", "so", "yet", "because", "although", "though",
    "while", "whereas", "which", "who", "whom", "whose", "that", "where",
    "when", "however", "therefore", "moreover", "furthermore", "meanwhile",
    "nevertheless", "then", "thus", "hence", "also", "besides", "instead",
    "otherwise", "with", "without", "from", "into", "onto", "upon", "about",
    "during", "under", "over", "between", "among", "through",
];

/// Words that suggest the previous segment already wrapped up its thought
const CONCLUSION_WORDS: [&str; 10] = [
    "conclusion", "summary", "finally", "end", "concluded", "done",
    "complete", "completed", "overall", "altogether",
];

/// Merger with explicit size bounds
#[derive(Debug, Clone)]
pub struct Merger {
    /// Segments shorter than this are merge candidates
    min_chunk_size: usize,

    /// Merged segments never exceed 1.2x this size
    max_chunk_size: usize,
}

impl Merger {
    /// Create a new merger
    pub fn new(min_chunk_size: usize, max_chunk_size: usize) -> Self {
        Self {
            min_chunk_size,
            max_chunk_size,
        }
    }

    /// Merge undersized and sentence-broken neighbours, skipping over image
    /// segments, and renumber the result densely from 1
    pub fn merge(&self, segments: Vec<Segment>) -> Vec<Segment> {
        let cap = self.max_chunk_size as f64 * 1.2;
        let mut out: Vec<Segment> = Vec::with_capacity(segments.len());
        let mut i = 0;

        while i < segments.len() {
            if segments[i].is_image {
                out.push(segments[i].clone());
                i += 1;
                continue;
            }

            let mut accumulator = segments[i].clone();
            let mut queued_images: Vec<Segment> = Vec::new();
            i += 1;

            loop {
                // Look ahead past any run of images to the next text segment
                let mut j = i;
                while j < segments.len() && segments[j].is_image {
                    j += 1;
                }
                let Some(head) = segments.get(j) else {
                    break;
                };

                let undersized = accumulator.char_len() < self.min_chunk_size;
                let bridged = should_bridge(&accumulator.content, &head.content);
                if !undersized && !bridged {
                    break;
                }

                let joiner = if bridged { " " } else { "\n\n" };
                let merged_len = accumulator.char_len() + joiner.len() + head.char_len();
                if merged_len as f64 > cap {
                    break;
                }

                // Commit: skipped images queue up behind the growing block
                queued_images.extend(segments[i..j].iter().cloned());
                accumulator.content = format!("{}{}{}", accumulator.content, joiner, head.content);
                i = j + 1;
            }

            out.push(accumulator);
            out.append(&mut queued_images);
        }

        for (idx, segment) in out.iter_mut().enumerate() {
            segment.sequence_number = idx + 1;
        }
        out
    }
}

/// Decide whether `head` looks like the continuation of a sentence that was
/// cut off at the end of `tail`. Scores +50 for a continuation word opening
/// `head`, +10 unless `tail` closes on a conclusion-style word, +20 flat;
/// bridges at a score of 60 or more.
pub fn should_bridge(tail: &str, head: &str) -> bool {
    let tail = tail.trim_end();
    let head = head.trim_start();
    if tail.is_empty() || head.is_empty() {
        return false;
    }

    if tail.ends_with(TERMINAL_PUNCTUATION) || tail.ends_with('-') {
        return false;
    }

    let tail_word = last_word(tail);
    if ABBREVIATIONS.contains(&tail_word.as_str()) {
        return false;
    }

    if head.chars().next().map(char::is_uppercase).unwrap_or(false) {
        return false;
    }

    let head_word = first_word(head);
    if STRUCTURAL_KEYWORDS.contains(&head_word.as_str()) {
        return false;
    }

    let mut score = 0;
    if CONTINUATION_WORDS.contains(&head_word.as_str()) {
        score += 50;
    }
    if !CONCLUSION_WORDS.contains(&tail_word.as_str()) {
        score += 10;
    }
    score += 20;

    score >= 60
}

fn first_word(text: &str) -> String {
    text.split_whitespace()
        .next()
        .unwrap_or("")
        .trim_matches(|c: char| !c.is_alphanumeric())
        .to_lowercase()
}

fn last_word(text: &str) -> String {
    text.split_whitespace()
        .last()
        .unwrap_or("")
        .trim_matches(|c: char| !c.is_alphanumeric())
        .to_lowercase()
}
