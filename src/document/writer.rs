/*!
 * Ordered Markdown output.
 *
 * Appends translated blocks to the output document. In structured mode the
 * writer tracks the currently open heading path in memory and re-emits only
 * the heading levels that changed since the last written segment, so sibling
 * sections never duplicate their parent headings. Blocks are separated by a
 * single blank line, which keeps the emitted document re-segmentable.
 */

use anyhow::{Context, Result};
use once_cell::sync::Lazy;
use regex::Regex;
use std::fs::OpenOptions;
use std::io::Write;
use std::path::{Path, PathBuf};

static ATX_HEADING_REGEX: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^(#{1,6})\s+(.+?)(\s+#+)?$").unwrap());

static SETEXT_UNDERLINE_REGEX: Lazy<Regex> = Lazy::new(|| Regex::new(r"^={3,}$|^-{3,}$").unwrap());

static EXCESS_BLANK_LINES_REGEX: Lazy<Regex> = Lazy::new(|| Regex::new(r"\n{3,}").unwrap());

/// Rule line separating a translated block from its terminology notes
const NOTES_SEPARATOR: &str = "\n\n---\n\n";

// @struct: Append-only writer over the output document
#[derive(Debug)]
pub struct OutputWriter {
    // @field: Output document location
    path: PathBuf,

    // @field: Headings currently in effect, outermost first
    open_heading_path: Vec<String>,

    // @field: Structured mode emits headings; flat mode writes text blocks only
    structured: bool,

    // @field: Whether any block has been written yet (controls separators)
    wrote_anything: bool,
}

impl OutputWriter {
    /// Create a writer over a fresh (truncated) output file
    pub fn create<P: AsRef<Path>>(path: P, structured: bool) -> Result<Self> {
        let path = path.as_ref().to_path_buf();
        std::fs::write(&path, "")
            .with_context(|| format!("Failed to create output file: {}", path.display()))?;
        Ok(Self {
            path,
            open_heading_path: Vec::new(),
            structured,
            wrote_anything: false,
        })
    }

    /// Reopen an existing output file for appending, restoring the open
    /// heading path by scanning the headings already written
    pub fn resume<P: AsRef<Path>>(path: P, structured: bool) -> Result<Self> {
        let path = path.as_ref().to_path_buf();
        if !path.exists() {
            return Self::create(path, structured);
        }
        let existing = std::fs::read_to_string(&path)
            .with_context(|| format!("Failed to read output file: {}", path.display()))?;
        Ok(Self {
            open_heading_path: scan_heading_path(&existing),
            wrote_anything: !existing.trim().is_empty(),
            path,
            structured,
        })
    }

    /// Headings currently in effect, outermost first
    pub fn open_heading_path(&self) -> &[String] {
        &self.open_heading_path
    }

    /// Append one translated segment. In structured mode, headings along
    /// `header_path` that are not already open are emitted first; a non-empty
    /// notes block is attached below the text behind a rule line.
    pub fn append_segment(
        &mut self,
        header_path: Option<&[String]>,
        text: &str,
        notes: Option<&str>,
    ) -> Result<()> {
        let mut blocks: Vec<String> = Vec::new();

        if self.structured {
            if let Some(target) = header_path {
                let shared = self
                    .open_heading_path
                    .iter()
                    .zip(target.iter())
                    .take_while(|(open, new)| open == new)
                    .count();
                self.open_heading_path.truncate(shared);
                for heading in &target[shared..] {
                    blocks.push(heading.clone());
                    self.open_heading_path.push(heading.clone());
                }
            }
        }

        let mut body = tidy_block(text);
        if let Some(notes) = notes {
            let notes = tidy_block(notes);
            if !notes.is_empty() {
                body = format!("{body}{NOTES_SEPARATOR}{notes}");
            }
        }
        if !body.is_empty() {
            blocks.push(body);
        }

        if blocks.is_empty() {
            return Ok(());
        }

        let mut out = String::new();
        for block in &blocks {
            if self.wrote_anything {
                out.push('\n');
            }
            out.push_str(block);
            out.push('\n');
            self.wrote_anything = true;
        }

        let mut file = OpenOptions::new()
            .append(true)
            .open(&self.path)
            .with_context(|| format!("Failed to open output file: {}", self.path.display()))?;
        file.write_all(out.as_bytes())
            .with_context(|| format!("Failed to append to output file: {}", self.path.display()))?;
        Ok(())
    }
}

/// Collapse runs of three or more newlines and trim surrounding whitespace
fn tidy_block(text: &str) -> String {
    EXCESS_BLANK_LINES_REGEX
        .replace_all(text, "\n\n")
        .trim()
        .to_string()
}

/// Rebuild the heading stack in effect at the end of previously written
/// output, honoring both ATX and setext headings
fn scan_heading_path(content: &str) -> Vec<String> {
    let mut stack: Vec<(usize, String)> = Vec::new();
    let mut prev_line: Option<String> = None;

    for raw_line in content.lines() {
        let line = raw_line.trim_end_matches('\r');

        if let Some(caps) = ATX_HEADING_REGEX.captures(line) {
            let level = caps[1].len();
            let text = caps[2].trim();
            while stack.last().is_some_and(|(l, _)| *l >= level) {
                stack.pop();
            }
            stack.push((level, format!("{} {}", "#".repeat(level), text)));
            prev_line = Some(line.to_string());
            continue;
        }

        if SETEXT_UNDERLINE_REGEX.is_match(line) {
            if let Some(prev) = prev_line.as_deref().map(str::trim) {
                if !prev.is_empty() {
                    let level = if line.starts_with('=') { 1 } else { 2 };
                    while stack.last().is_some_and(|(l, _)| *l >= level) {
                        stack.pop();
                    }
                    stack.push((level, format!("{} {}", "#".repeat(level), prev)));
                    prev_line = None;
                    continue;
                }
            }
        }

        prev_line = Some(line.to_string());
    }

    stack.into_iter().map(|(_, heading)| heading).collect()
}
