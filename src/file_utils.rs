use anyhow::{Context, Result};
use log::warn;
use once_cell::sync::Lazy;
use regex::Regex;
use std::fs;
use std::fs::OpenOptions;
use std::io::Write;
use std::path::{Path, PathBuf};
use std::time::Duration;
use walkdir::WalkDir;

// @module: File and directory utilities for translation runs

static IMAGE_SYNTAX_REGEX: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"!\[[^\]]*\]\([^)]*\)").unwrap());

static LINK_SYNTAX_REGEX: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"\[([^\]]*)\]\([^)]*\)").unwrap());

static WORD_REGEX: Lazy<Regex> = Lazy::new(|| Regex::new(r"\w+").unwrap());

/// Stats table appended after every completed run
const STATS_FILE_NAME: &str = "counting_table.csv";

const STATS_HEADER: [&str; 6] = [
    "Input file",
    "Input len",
    "Output file",
    "Output len",
    "Tokens",
    "Taken time",
];

// @struct: File operations utility
pub struct FileManager;

impl FileManager {
    // @checks: File existence
    pub fn file_exists<P: AsRef<Path>>(path: P) -> bool {
        path.as_ref().is_file()
    }

    // @checks: Directory existence
    pub fn dir_exists<P: AsRef<Path>>(path: P) -> bool {
        path.as_ref().is_dir()
    }

    // @creates: Directory and parents if needed
    pub fn ensure_dir<P: AsRef<Path>>(path: P) -> Result<()> {
        let path = path.as_ref();
        if !path.exists() {
            fs::create_dir_all(path)
                .with_context(|| format!("Failed to create directory: {}", path.display()))?;
        }
        Ok(())
    }

    /// Read a file to a string
    pub fn read_to_string<P: AsRef<Path>>(path: P) -> Result<String> {
        let path = path.as_ref();
        fs::read_to_string(path)
            .with_context(|| format!("Failed to read file: {}", path.display()))
    }

    /// Write content to a file, creating parent directories when needed
    pub fn write_to_file<P: AsRef<Path>>(path: P, content: &str) -> Result<()> {
        let path = path.as_ref();
        if let Some(parent) = path.parent() {
            if !parent.as_os_str().is_empty() {
                Self::ensure_dir(parent)?;
            }
        }
        fs::write(path, content)
            .with_context(|| format!("Failed to write file: {}", path.display()))
    }

    /// Find all Markdown files under a directory, sorted for a stable
    /// processing order
    pub fn find_markdown_files<P: AsRef<Path>>(dir: P) -> Result<Vec<PathBuf>> {
        let dir = dir.as_ref();
        let mut files: Vec<PathBuf> = WalkDir::new(dir)
            .into_iter()
            .filter_map(|entry| entry.ok())
            .filter(|entry| entry.file_type().is_file())
            .filter(|entry| {
                entry
                    .path()
                    .extension()
                    .and_then(|e| e.to_str())
                    .is_some_and(|e| e.eq_ignore_ascii_case("md"))
            })
            .map(|entry| entry.into_path())
            .collect();
        files.sort();
        Ok(files)
    }

    // @generates: Output document path next to the input
    /// `{stem}_output.md`, counting up (`_output_1.md`, ...) while the name
    /// is taken
    pub fn versioned_output_path(input: &Path) -> PathBuf {
        let stem = input
            .file_stem()
            .and_then(|s| s.to_str())
            .unwrap_or("document");
        let dir = input.parent().unwrap_or_else(|| Path::new(""));

        let mut candidate = dir.join(format!("{stem}_output.md"));
        let mut counter = 1;
        while candidate.exists() {
            candidate = dir.join(format!("{stem}_output_{counter}.md"));
            counter += 1;
        }
        candidate
    }

    // @generates: Checkpoint path for a given input document
    /// `{stem}_output_intermediate.json` next to the input. The name is
    /// derived from the input stem, not the versioned output name, so a
    /// restart after an interrupted run finds the previous checkpoint
    /// even though the output counts up to `{stem}_output_1.md`.
    pub fn checkpoint_path(input: &Path) -> PathBuf {
        let stem = input
            .file_stem()
            .and_then(|s| s.to_str())
            .unwrap_or("document");
        input
            .parent()
            .unwrap_or_else(|| Path::new(""))
            .join(format!("{stem}_output_intermediate.json"))
    }

    /// Write the untranslated remainder of the source to `{stem}_rest.md`.
    /// The remainder starts at the first occurrence of the in-flight
    /// segment's opening characters; if they cannot be located the rest
    /// file is skipped with a warning.
    pub fn extract_untranslated_rest(
        input: &Path,
        segment_text: &str,
    ) -> Result<Option<PathBuf>> {
        let keyword: String = segment_text.chars().take(20).collect();
        if keyword.is_empty() {
            return Ok(None);
        }
        let content = Self::read_to_string(input)?;
        let Some(idx) = content.find(&keyword) else {
            warn!(
                "Could not locate in-flight segment in {}; skipping rest file",
                input.display()
            );
            return Ok(None);
        };

        let stem = input
            .file_stem()
            .and_then(|s| s.to_str())
            .unwrap_or("document");
        let rest_path = input
            .parent()
            .unwrap_or_else(|| Path::new(""))
            .join(format!("{stem}_rest.md"));
        Self::write_to_file(&rest_path, &content[idx..])?;
        Ok(Some(rest_path))
    }

    /// Append one run's stats to `counting_table.csv` in the working
    /// directory, writing the header first when the table is new
    pub fn append_stats_row(
        input: &Path,
        input_len: usize,
        output: &Path,
        output_len: usize,
        tokens: u64,
        elapsed: Duration,
    ) -> Result<()> {
        Self::append_stats_row_to(
            Path::new(STATS_FILE_NAME),
            input,
            input_len,
            output,
            output_len,
            tokens,
            elapsed,
        )
    }

    /// Like [`Self::append_stats_row`], with an explicit table location
    pub fn append_stats_row_to(
        stats_path: &Path,
        input: &Path,
        input_len: usize,
        output: &Path,
        output_len: usize,
        tokens: u64,
        elapsed: Duration,
    ) -> Result<()> {
        let needs_header = fs::metadata(stats_path).map(|m| m.len() == 0).unwrap_or(true);

        let mut rows = String::new();
        if needs_header {
            rows.push_str(&format_csv_row(&STATS_HEADER));
        }
        rows.push_str(&format_csv_row(&[
            &input.display().to_string(),
            &input_len.to_string(),
            &output.display().to_string(),
            &output_len.to_string(),
            &tokens.to_string(),
            &format!("{:.2}", elapsed.as_secs_f64()),
        ]));

        let mut file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(stats_path)
            .with_context(|| format!("Failed to open stats table: {}", stats_path.display()))?;
        file.write_all(rows.as_bytes())
            .with_context(|| format!("Failed to append stats row: {}", stats_path.display()))?;
        Ok(())
    }

    /// Count word tokens in Markdown content, ignoring image and link
    /// targets and markup punctuation
    pub fn count_markdown_words(content: &str) -> usize {
        let without_images = IMAGE_SYNTAX_REGEX.replace_all(content, " ");
        let without_links = LINK_SYNTAX_REGEX.replace_all(&without_images, "$1");
        WORD_REGEX.find_iter(&without_links).count()
    }
}

/// Parse one single-line CSV record, honoring quotes and doubled quotes
pub(crate) fn parse_csv_record(line: &str) -> Vec<String> {
    let mut fields = Vec::new();
    let mut field = String::new();
    let mut chars = line.chars().peekable();
    let mut in_quotes = false;

    while let Some(c) = chars.next() {
        if in_quotes {
            if c == '"' {
                if chars.peek() == Some(&'"') {
                    field.push('"');
                    chars.next();
                } else {
                    in_quotes = false;
                }
            } else {
                field.push(c);
            }
        } else {
            match c {
                '"' => in_quotes = true,
                ',' => fields.push(std::mem::take(&mut field)),
                _ => field.push(c),
            }
        }
    }
    fields.push(field);
    fields
}

/// Format one CSV row with a trailing newline. Cells are flattened to a
/// single line and quoted when they contain commas or quotes.
pub(crate) fn format_csv_row(fields: &[&str]) -> String {
    let mut row = String::new();
    for (i, field) in fields.iter().enumerate() {
        if i > 0 {
            row.push(',');
        }
        let cleaned = field.replace(['\r', '\n'], " ");
        if cleaned.contains([',', '"']) {
            row.push('"');
            row.push_str(&cleaned.replace('"', "\"\""));
            row.push('"');
        } else {
            row.push_str(&cleaned);
        }
    }
    row.push('\n');
    row
}
