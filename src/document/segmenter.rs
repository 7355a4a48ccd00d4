/*!
 * Markdown document segmentation.
 *
 * This module turns a raw Markdown document into an ordered sequence of
 * bounded segments. In structured mode it tracks the heading hierarchy
 * (ATX and Setext), splits overlong lines at natural boundaries, and tags
 * standalone image lines. In flat mode it segments purely by length,
 * coalescing undersized paragraphs.
 */

use std::collections::VecDeque;
use std::path::Path;

use anyhow::{Context, Result};
use once_cell::sync::Lazy;
use regex::Regex;

/// Regular expression for ATX headings (`# Title` .. `###### Title`),
/// tolerating a closing hash sequence
static ATX_HEADING_REGEX: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"^(#{1,6})\s+(.+?)(\s+#+)?$").unwrap()
});

/// Regular expression for Setext underlines (`===` or `---`, length >= 3)
static SETEXT_UNDERLINE_REGEX: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"^={3,}$|^-{3,}$").unwrap()
});

/// Regular expression for a line that is solely an image reference
static IMAGE_LINE_REGEX: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"^\s*!\[[^\]]*\]\([^)]*\)\s*$").unwrap()
});

/// Heading label used for continuation markers when no heading is open
pub const CONTINUATION_FALLBACK_HEADING: &str = "Document Start";

/// Prefix of the marker injected at the start of a continuation segment
pub const CONTINUATION_MARKER_PREFIX: &str = "<!-- Continued from ";

// @struct: A bounded, ordered span of document content
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Segment {
    /// Text content of the segment, heading lines excluded
    pub content: String,

    /// Open heading chain, outermost first, each entry rendered with its
    /// `#` prefix (e.g. `"## Background"`)
    pub header_path: Vec<String>,

    /// Whether this segment continues a line split by the size limit
    pub is_continuation: bool,

    /// Whether the segment is a standalone image reference
    pub is_image: bool,

    /// 1-based position in the emitted sequence, unique and contiguous
    pub sequence_number: usize,
}

impl Segment {
    /// Length of the content in characters (not bytes)
    pub fn char_len(&self) -> usize {
        self.content.chars().count()
    }

    /// Innermost heading of the segment's path, if any
    pub fn innermost_heading(&self) -> Option<&str> {
        self.header_path.last().map(String::as_str)
    }

    /// Content with a leading continuation marker line removed
    pub fn content_without_marker(&self) -> &str {
        if self.is_continuation && self.content.starts_with(CONTINUATION_MARKER_PREFIX) {
            match self.content.find('\n') {
                Some(idx) => &self.content[idx + 1..],
                None => "",
            }
        } else {
            &self.content
        }
    }
}

/// Markdown segmenter with explicit size and structure settings
#[derive(Debug, Clone)]
pub struct Segmenter {
    /// Maximum characters per segment before boundary splitting kicks in
    max_chunk_size: usize,

    /// Minimum characters below which flat-mode paragraphs are coalesced
    min_chunk_size: usize,

    /// Whether heading structure is tracked (structured vs flat mode)
    preserve_structure: bool,
}

impl Segmenter {
    /// Create a new segmenter
    pub fn new(max_chunk_size: usize, min_chunk_size: usize, preserve_structure: bool) -> Self {
        Self {
            max_chunk_size,
            min_chunk_size,
            preserve_structure,
        }
    }

    /// Produce a lazy, finite, forward-only stream of segments over the text.
    /// Sequential processing may consume this directly; concurrent scheduling
    /// should materialize it first (see [`Segmenter::segment`]).
    pub fn stream<'a>(&self, text: &'a str) -> SegmentStream<'a> {
        SegmentStream::new(text, self.max_chunk_size, self.min_chunk_size, self.preserve_structure)
    }

    /// Segment the text fully, materializing the whole sequence
    pub fn segment(&self, text: &str) -> Vec<Segment> {
        self.stream(text).collect()
    }

    /// Read a Markdown file and segment its contents
    pub fn segment_file<P: AsRef<Path>>(&self, path: P) -> Result<Vec<Segment>> {
        let text = std::fs::read_to_string(&path)
            .with_context(|| format!("Failed to read document: {:?}", path.as_ref()))?;
        Ok(self.segment(&text))
    }
}

/// Forward-only iterator over the segments of one document
pub struct SegmentStream<'a> {
    lines: std::str::Lines<'a>,
    out: VecDeque<Segment>,
    next_seq: usize,
    finished: bool,
    max_chunk_size: usize,
    min_chunk_size: usize,
    state: ModeState,
}

/// Per-mode accumulation state
enum ModeState {
    Structured(StructuredState),
    Flat(FlatState),
}

/// State for heading-aware segmentation
struct StructuredState {
    /// Open headings as (level, rendered line) pairs
    header_stack: Vec<(usize, String)>,
    /// Lines of the segment under construction
    buffer: Vec<String>,
    /// Character length of the buffer including separators
    chunk_length: usize,
    /// Whether the open buffer continues a split line
    continuation: bool,
    /// Whether the stack changed since the last emission
    stack_dirty: bool,
}

/// State for length-only segmentation
struct FlatState {
    /// Lines of the paragraph under construction
    buffer: Vec<String>,
    /// Character length of the buffer including separators
    chunk_length: usize,
    /// Undersized paragraphs waiting to be coalesced
    pending: Vec<String>,
    /// Combined character length of the pending paragraphs
    pending_length: usize,
}

impl<'a> SegmentStream<'a> {
    fn new(text: &'a str, max_chunk_size: usize, min_chunk_size: usize, preserve_structure: bool) -> Self {
        let state = if preserve_structure {
            ModeState::Structured(StructuredState {
                header_stack: Vec::new(),
                buffer: Vec::new(),
                chunk_length: 0,
                continuation: false,
                stack_dirty: false,
            })
        } else {
            ModeState::Flat(FlatState {
                buffer: Vec::new(),
                chunk_length: 0,
                pending: Vec::new(),
                pending_length: 0,
            })
        };

        Self {
            lines: text.lines(),
            out: VecDeque::new(),
            next_seq: 1,
            finished: false,
            max_chunk_size,
            min_chunk_size,
            state,
        }
    }

    fn emit(out: &mut VecDeque<Segment>, next_seq: &mut usize, mut segment: Segment) {
        segment.sequence_number = *next_seq;
        *next_seq += 1;
        out.push_back(segment);
    }

    /// Feed one raw line into the active mode state
    fn feed(&mut self, line: &str) {
        let line = line.strip_suffix('\r').unwrap_or(line);
        match &mut self.state {
            ModeState::Structured(state) => state.feed(
                line,
                self.max_chunk_size,
                &mut self.out,
                &mut self.next_seq,
            ),
            ModeState::Flat(state) => state.feed(
                line,
                self.max_chunk_size,
                self.min_chunk_size,
                &mut self.out,
                &mut self.next_seq,
            ),
        }
    }

    /// Flush whatever the active mode still buffers
    fn finish(&mut self) {
        match &mut self.state {
            ModeState::Structured(state) => state.finish(&mut self.out, &mut self.next_seq),
            ModeState::Flat(state) => state.finish(self.min_chunk_size, &mut self.out, &mut self.next_seq),
        }
    }
}

impl<'a> Iterator for SegmentStream<'a> {
    type Item = Segment;

    fn next(&mut self) -> Option<Segment> {
        loop {
            if let Some(segment) = self.out.pop_front() {
                return Some(segment);
            }
            if self.finished {
                return None;
            }
            match self.lines.next() {
                Some(line) => {
                    let owned = line.to_string();
                    self.feed(&owned);
                }
                None => {
                    self.finished = true;
                    self.finish();
                }
            }
        }
    }
}

impl StructuredState {
    fn feed(
        &mut self,
        line: &str,
        max_chunk_size: usize,
        out: &mut VecDeque<Segment>,
        next_seq: &mut usize,
    ) {
        let stripped = line.trim();

        // Setext underline promotes the previous buffered line to a heading
        if SETEXT_UNDERLINE_REGEX.is_match(line) {
            let promotable = self
                .buffer
                .last()
                .map(|prev| !prev.is_empty())
                .unwrap_or(false);
            if promotable {
                let prev = self.buffer.pop().unwrap_or_default();
                self.chunk_length = self.chunk_length.saturating_sub(char_len(&prev) + 1);
                let level = if line.starts_with('=') { 1 } else { 2 };
                self.open_heading(level, prev.trim(), max_chunk_size, out, next_seq);
                return;
            }
        }

        if let Some(caps) = ATX_HEADING_REGEX.captures(line) {
            let level = caps.get(1).map(|m| m.as_str().len()).unwrap_or(1);
            let text = caps.get(2).map(|m| m.as_str().trim()).unwrap_or("");
            self.open_heading(level, text, max_chunk_size, out, next_seq);
            return;
        }

        if stripped.is_empty() {
            // Collapse runs of blank lines to a single separator
            if !self.buffer.is_empty() && !self.buffer.last().map(String::is_empty).unwrap_or(true) {
                self.buffer.push(String::new());
                self.chunk_length += 1;
            }
            return;
        }

        if IMAGE_LINE_REGEX.is_match(line) {
            self.flush(out, next_seq);
            Self::emit_image(line, &self.header_path(), out, next_seq);
            self.continuation = false;
            return;
        }

        let line_length = char_len(line) + 1;
        if self.chunk_length + line_length > max_chunk_size {
            let remaining = max_chunk_size.saturating_sub(self.chunk_length);
            match find_split_position(line, remaining) {
                Some(split_at) => {
                    let (head, tail) = line.split_at(split_at);
                    if !head.is_empty() {
                        self.buffer.push(head.to_string());
                    }
                    self.flush(out, next_seq);
                    let marker_heading = self
                        .header_stack
                        .last()
                        .map(|(_, rendered)| rendered.clone())
                        .unwrap_or_else(|| CONTINUATION_FALLBACK_HEADING.to_string());
                    self.buffer.push(format!("{}{} -->", CONTINUATION_MARKER_PREFIX, marker_heading));
                    self.buffer.push(tail.to_string());
                    self.chunk_length = char_len(tail);
                }
                None => {
                    // The line fits on its own, flush the buffer first
                    self.flush(out, next_seq);
                    self.buffer.push(line.to_string());
                    self.chunk_length = char_len(line);
                }
            }
            self.continuation = true;
        } else {
            self.buffer.push(line.to_string());
            self.chunk_length += line_length;
        }
    }

    /// Process a heading of the given level, flushing or absorbing per the
    /// nesting rules
    fn open_heading(
        &mut self,
        level: usize,
        text: &str,
        max_chunk_size: usize,
        out: &mut VecDeque<Segment>,
        next_seq: &mut usize,
    ) {
        let rendered = format!("{} {}", "#".repeat(level), text);
        let innermost = self.header_stack.last().map(|(l, _)| *l).unwrap_or(0);

        if self.has_content() {
            let overflows = (self.chunk_length + char_len(&rendered)) as f64
                > max_chunk_size as f64 * 0.8;
            if level <= innermost + 1 || overflows {
                self.flush(out, next_seq);
            } else {
                // A heading that skips levels downward stays inline
                self.chunk_length += char_len(&rendered) + 1;
                self.buffer.push(rendered);
                return;
            }
        }

        while self.header_stack.len() >= level {
            self.header_stack.pop();
        }
        self.header_stack.push((level, rendered));
        self.stack_dirty = true;
        self.continuation = false;
    }

    fn has_content(&self) -> bool {
        self.buffer.iter().any(|line| !line.is_empty())
    }

    fn header_path(&self) -> Vec<String> {
        self.header_stack.iter().map(|(_, rendered)| rendered.clone()).collect()
    }

    fn emit_image(line: &str, header_path: &[String], out: &mut VecDeque<Segment>, next_seq: &mut usize) {
        SegmentStream::emit(out, next_seq, Segment {
            content: line.trim().to_string(),
            header_path: header_path.to_vec(),
            is_continuation: false,
            is_image: true,
            sequence_number: 0,
        });
    }

    fn flush(&mut self, out: &mut VecDeque<Segment>, next_seq: &mut usize) {
        while self.buffer.last().map(String::is_empty).unwrap_or(false) {
            self.buffer.pop();
        }
        if self.buffer.is_empty() {
            return;
        }
        let content = self.buffer.join("\n");
        SegmentStream::emit(out, next_seq, Segment {
            content,
            header_path: self.header_path(),
            is_continuation: self.continuation,
            is_image: false,
            sequence_number: 0,
        });
        self.buffer.clear();
        self.chunk_length = 0;
        self.continuation = false;
        self.stack_dirty = false;
    }

    fn finish(&mut self, out: &mut VecDeque<Segment>, next_seq: &mut usize) {
        if self.has_content() {
            self.flush(out, next_seq);
        } else if self.stack_dirty {
            // A trailing heading with no body still has to reach the output
            SegmentStream::emit(out, next_seq, Segment {
                content: String::new(),
                header_path: self.header_path(),
                is_continuation: false,
                is_image: false,
                sequence_number: 0,
            });
            self.stack_dirty = false;
        }
    }
}

impl FlatState {
    fn feed(
        &mut self,
        line: &str,
        max_chunk_size: usize,
        min_chunk_size: usize,
        out: &mut VecDeque<Segment>,
        next_seq: &mut usize,
    ) {
        let stripped = line.trim();

        if stripped.is_empty() {
            if !self.buffer.is_empty() {
                let paragraph = std::mem::take(&mut self.buffer).join("\n");
                self.chunk_length = 0;
                self.close_paragraph(paragraph, max_chunk_size, min_chunk_size, out, next_seq);
            }
            return;
        }

        if IMAGE_LINE_REGEX.is_match(line) {
            if !self.buffer.is_empty() {
                let paragraph = std::mem::take(&mut self.buffer).join("\n");
                self.chunk_length = 0;
                self.close_paragraph(paragraph, max_chunk_size, min_chunk_size, out, next_seq);
            }
            // Pending text precedes the image and must keep its place
            self.flush_pending(out, next_seq);
            SegmentStream::emit(out, next_seq, Segment {
                content: stripped.to_string(),
                header_path: Vec::new(),
                is_continuation: false,
                is_image: true,
                sequence_number: 0,
            });
            return;
        }

        let line_length = char_len(line) + 1;
        if self.chunk_length + line_length > max_chunk_size {
            let remaining = max_chunk_size.saturating_sub(self.chunk_length);
            match find_split_position(line, remaining) {
                Some(split_at) => {
                    let (head, tail) = line.split_at(split_at);
                    if !head.is_empty() {
                        self.buffer.push(head.to_string());
                    }
                    let paragraph = std::mem::take(&mut self.buffer).join("\n");
                    self.close_paragraph(paragraph, max_chunk_size, min_chunk_size, out, next_seq);
                    self.buffer.push(tail.to_string());
                    self.chunk_length = char_len(tail);
                }
                None => {
                    if !self.buffer.is_empty() {
                        let paragraph = std::mem::take(&mut self.buffer).join("\n");
                        self.close_paragraph(paragraph, max_chunk_size, min_chunk_size, out, next_seq);
                    }
                    self.buffer.push(line.to_string());
                    self.chunk_length = line_length;
                }
            }
        } else {
            self.buffer.push(line.to_string());
            self.chunk_length += line_length;
        }
    }

    /// Route a finished paragraph through the undersize coalescing queue
    fn close_paragraph(
        &mut self,
        paragraph: String,
        max_chunk_size: usize,
        min_chunk_size: usize,
        out: &mut VecDeque<Segment>,
        next_seq: &mut usize,
    ) {
        if char_len(&paragraph) < min_chunk_size {
            self.pending_length += char_len(&paragraph);
            self.pending.push(paragraph);
            if self.pending_length >= max_chunk_size {
                self.flush_pending(out, next_seq);
            }
        } else {
            self.flush_pending(out, next_seq);
            Self::emit_text(paragraph, out, next_seq);
        }
    }

    fn flush_pending(&mut self, out: &mut VecDeque<Segment>, next_seq: &mut usize) {
        if self.pending.is_empty() {
            return;
        }
        let combined = std::mem::take(&mut self.pending).join("\n");
        self.pending_length = 0;
        Self::emit_text(combined, out, next_seq);
    }

    fn emit_text(content: String, out: &mut VecDeque<Segment>, next_seq: &mut usize) {
        SegmentStream::emit(out, next_seq, Segment {
            content,
            header_path: Vec::new(),
            is_continuation: false,
            is_image: false,
            sequence_number: 0,
        });
    }

    fn finish(&mut self, min_chunk_size: usize, out: &mut VecDeque<Segment>, next_seq: &mut usize) {
        if !self.buffer.is_empty() {
            let paragraph = std::mem::take(&mut self.buffer).join("\n");
            if char_len(&paragraph) < min_chunk_size {
                self.pending_length += char_len(&paragraph);
                self.pending.push(paragraph);
            } else {
                self.flush_pending(out, next_seq);
                Self::emit_text(paragraph, out, next_seq);
            }
        }
        self.flush_pending(out, next_seq);
    }
}

fn char_len(s: &str) -> usize {
    s.chars().count()
}

/// Sentence-ending punctuation, searched first when splitting an overlong line
const SENTENCE_PUNCTUATION: [char; 6] = ['.', '。', '!', '！', '?', '？'];

/// Clause punctuation, searched when no sentence boundary is near
const CLAUSE_PUNCTUATION: [char; 4] = [',', '，', ';', '；'];

/// Find the byte offset at which to split `line` so the head fits into
/// `remaining_space` characters. Searches backward from the overflow point:
/// sentence punctuation within 100 characters, clause punctuation within 50,
/// whitespace within 20, else a hard cut. Returns `None` when the line fits.
fn find_split_position(line: &str, remaining_space: usize) -> Option<usize> {
    let chars: Vec<(usize, char)> = line.char_indices().collect();
    if remaining_space >= chars.len() {
        return None;
    }

    let byte_at = |pos: usize| -> usize {
        if pos >= chars.len() { line.len() } else { chars[pos].0 }
    };

    let scan = |window: usize, matches: &dyn Fn(char) -> bool| -> Option<usize> {
        let stop = remaining_space.saturating_sub(window);
        let mut pos = remaining_space;
        while pos > stop {
            if pos < chars.len() && matches(chars[pos].1) {
                return Some(byte_at(pos + 1));
            }
            pos -= 1;
        }
        None
    };

    scan(100, &|c| SENTENCE_PUNCTUATION.contains(&c))
        .or_else(|| scan(50, &|c| CLAUSE_PUNCTUATION.contains(&c)))
        .or_else(|| scan(20, &|c| c.is_whitespace()))
        .or(Some(byte_at(remaining_space)))
}
