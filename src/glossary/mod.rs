/*!
 * Glossary loading, validation and persistence.
 *
 * A glossary is a two-column term → translation table supplied by the
 * operator as CSV (or as a spreadsheet, normalized to CSV on load). Term
 * uniqueness is first-seen-wins. During a run, newly coined terms accumulate
 * in an [`AggregatedTerminology`] that is persisted at the end, either merged
 * into a timestamped copy of the glossary or as a standalone new-terms file.
 */

use anyhow::{anyhow, Context, Result};
use chrono::Local;
use log::warn;
use quick_xml::events::Event;
use quick_xml::Reader;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fs::File;
use std::io::Read;
use std::path::{Path, PathBuf};
use zip::ZipArchive;

use crate::errors::GlossaryError;
use crate::file_utils::{format_csv_row, parse_csv_record};

pub mod matcher;

pub use matcher::TermMatcher;

/// One authoritative glossary row
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GlossaryEntry {
    pub term: String,
    pub translation: String,
}

/// A term proposed by the translation service, with the naming rationale
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NewTerm {
    pub term: String,
    pub translation: String,
    #[serde(default)]
    pub reason: String,
}

// @struct: Authoritative term → translation mapping, order-preserving
#[derive(Debug, Clone, Default)]
pub struct Glossary {
    // @field: Entries in load order
    entries: Vec<GlossaryEntry>,

    // @field: Exact-term lookup into `entries`
    index: HashMap<String, usize>,
}

impl Glossary {
    /// Create an empty glossary
    pub fn new() -> Self {
        Self::default()
    }

    /// Build a glossary from (term, translation) pairs, first-seen-wins
    pub fn from_pairs<I, S1, S2>(pairs: I) -> Self
    where
        I: IntoIterator<Item = (S1, S2)>,
        S1: Into<String>,
        S2: Into<String>,
    {
        let mut glossary = Self::new();
        for (term, translation) in pairs {
            glossary.insert(term.into(), translation.into());
        }
        glossary
    }

    /// Load a glossary from a validated CSV file. Duplicate terms keep the
    /// first occurrence; later rows are ignored with a warning.
    pub fn load_csv<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        let raw = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read glossary file: {}", path.display()))?;
        let content = raw.strip_prefix('\u{feff}').unwrap_or(&raw);

        let mut glossary = Self::new();
        for line in content.lines().skip(1) {
            if line.is_empty() {
                continue;
            }
            let record = parse_csv_record(line);
            if record.len() < 2 {
                continue;
            }
            let term = record[0].trim();
            let translation = record[1].trim();
            if term.is_empty() {
                continue;
            }
            if !glossary.insert(term.to_string(), translation.to_string()) {
                warn!("Duplicate glossary term '{}' ignored (first entry wins)", term);
            }
        }
        Ok(glossary)
    }

    /// Insert an entry unless the term is already present. Returns whether
    /// the entry was inserted.
    pub fn insert(&mut self, term: String, translation: String) -> bool {
        if self.index.contains_key(&term) {
            return false;
        }
        self.index.insert(term.clone(), self.entries.len());
        self.entries.push(GlossaryEntry { term, translation });
        true
    }

    /// Translation for an exact term, if present
    pub fn get(&self, term: &str) -> Option<&str> {
        self.index
            .get(term)
            .map(|&i| self.entries[i].translation.as_str())
    }

    /// Whether an exact term is present
    pub fn contains_term(&self, term: &str) -> bool {
        self.index.contains_key(term)
    }

    /// Entries in load order
    pub fn entries(&self) -> &[GlossaryEntry] {
        &self.entries
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// A copy of this glossary extended with terms aggregated during the
    /// run. Authoritative entries win on conflicting terms.
    pub fn with_aggregated(&self, aggregated: &AggregatedTerminology) -> Glossary {
        let mut merged = self.clone();
        for new_term in aggregated.terms() {
            merged.insert(new_term.term.clone(), new_term.translation.clone());
        }
        merged
    }
}

// @struct: Terms discovered during the current run, not yet authoritative
#[derive(Debug, Clone, Default)]
pub struct AggregatedTerminology {
    terms: Vec<NewTerm>,
    index: HashMap<String, usize>,
}

impl AggregatedTerminology {
    pub fn new() -> Self {
        Self::default()
    }

    /// Fold a step's proposed terms in. Terms already present in the
    /// authoritative glossary are dropped; among aggregated terms the first
    /// seen wins. Returns how many terms were actually added.
    pub fn merge(&mut self, authoritative: &Glossary, proposed: Vec<NewTerm>) -> usize {
        let mut added = 0;
        for term in proposed {
            if term.term.trim().is_empty() || term.translation.trim().is_empty() {
                continue;
            }
            if authoritative.contains_term(&term.term) {
                continue;
            }
            if self.index.contains_key(&term.term) {
                continue;
            }
            self.index.insert(term.term.clone(), self.terms.len());
            self.terms.push(term);
            added += 1;
        }
        added
    }

    /// Translation for an aggregated term, if present
    pub fn get(&self, term: &str) -> Option<&str> {
        self.index
            .get(term)
            .map(|&i| self.terms[i].translation.as_str())
    }

    pub fn terms(&self) -> &[NewTerm] {
        &self.terms
    }

    pub fn len(&self) -> usize {
        self.terms.len()
    }

    pub fn is_empty(&self) -> bool {
        self.terms.is_empty()
    }
}

/// Validate a glossary file and return the path to load: exactly two
/// columns, header row required, no blank cells. Spreadsheets are converted
/// to `{stem}_converted.csv` first and the converted path is returned.
pub fn validate_glossary_file<P: AsRef<Path>>(path: P) -> Result<PathBuf, GlossaryError> {
    let path = path.as_ref();
    if !path.exists() {
        return Err(GlossaryError::Unreadable(path.display().to_string()));
    }

    let extension = path
        .extension()
        .and_then(|e| e.to_str())
        .map(str::to_lowercase)
        .unwrap_or_default();

    let csv_path = match extension.as_str() {
        "csv" => path.to_path_buf(),
        "xlsx" => convert_xlsx_to_csv(path)
            .map_err(|e| GlossaryError::Unreadable(format!("{}: {e}", path.display())))?,
        _ => return Err(GlossaryError::UnsupportedFormat(path.display().to_string())),
    };

    let raw = std::fs::read_to_string(&csv_path)
        .map_err(|e| GlossaryError::Unreadable(format!("{}: {e}", csv_path.display())))?;
    let content = raw.strip_prefix('\u{feff}').unwrap_or(&raw);

    let mut lines = content.lines();
    let Some(header) = lines.next() else {
        return Err(GlossaryError::Empty(csv_path.display().to_string()));
    };
    let header_record = parse_csv_record(header);
    if header_record.len() != 2 {
        return Err(GlossaryError::ColumnCount {
            row: 1,
            found: header_record.len(),
        });
    }

    let mut data_rows = 0;
    for (row, line) in lines.enumerate() {
        let row = row + 2;
        let record = parse_csv_record(line);
        if record.len() != 2 {
            return Err(GlossaryError::ColumnCount {
                row,
                found: record.len(),
            });
        }
        if record[0].trim().is_empty() {
            return Err(GlossaryError::BlankCell { row, column: "term" });
        }
        if record[1].trim().is_empty() {
            return Err(GlossaryError::BlankCell {
                row,
                column: "translation",
            });
        }
        data_rows += 1;
    }
    if data_rows == 0 {
        return Err(GlossaryError::Empty(csv_path.display().to_string()));
    }

    Ok(csv_path)
}

/// Persist the run's terminology. With `merge_into_glossary` the base
/// glossary and the aggregated terms are written together as a reloadable
/// two-column timestamped copy; otherwise only the new terms are written,
/// with their naming rationale as a third column.
pub fn save_terms_result(
    merge_into_glossary: bool,
    base: &Glossary,
    aggregated: &AggregatedTerminology,
    glossary_path: &Path,
) -> Result<PathBuf> {
    if merge_into_glossary {
        save_merged_glossary(base, aggregated, glossary_path)
    } else {
        save_new_terms_only(aggregated, glossary_path)
    }
}

/// Write base + aggregated terms to `{stem}_{timestamp}.csv` next to the
/// glossary. Two columns, so the output can be used as a glossary directly.
pub fn save_merged_glossary(
    base: &Glossary,
    aggregated: &AggregatedTerminology,
    glossary_path: &Path,
) -> Result<PathBuf> {
    let out_path = timestamped_sibling(glossary_path, "");
    let mut out = String::new();
    out.push_str(&format_csv_row(&["term", "translation"]));
    for entry in base.entries() {
        out.push_str(&format_csv_row(&[&entry.term, &entry.translation]));
    }
    for term in aggregated.terms() {
        if !base.contains_term(&term.term) {
            out.push_str(&format_csv_row(&[&term.term, &term.translation]));
        }
    }
    std::fs::write(&out_path, out)
        .with_context(|| format!("Failed to write glossary file: {}", out_path.display()))?;
    Ok(out_path)
}

/// Write only the aggregated terms to `{stem}_new_terms_{timestamp}.csv`,
/// carrying the naming rationale as a third column
pub fn save_new_terms_only(
    aggregated: &AggregatedTerminology,
    glossary_path: &Path,
) -> Result<PathBuf> {
    let out_path = timestamped_sibling(glossary_path, "_new_terms");
    let mut out = String::new();
    out.push_str(&format_csv_row(&["term", "translation", "reason"]));
    for term in aggregated.terms() {
        out.push_str(&format_csv_row(&[&term.term, &term.translation, &term.reason]));
    }
    std::fs::write(&out_path, out)
        .with_context(|| format!("Failed to write new terms file: {}", out_path.display()))?;
    Ok(out_path)
}

fn timestamped_sibling(glossary_path: &Path, tag: &str) -> PathBuf {
    let timestamp = Local::now().format("%Y%m%d_%H%M%S");
    let stem = glossary_path
        .file_stem()
        .and_then(|s| s.to_str())
        .unwrap_or("glossary");
    let file_name = format!("{stem}{tag}_{timestamp}.csv");
    match glossary_path.parent() {
        Some(dir) if !dir.as_os_str().is_empty() => dir.join(file_name),
        _ => PathBuf::from(file_name),
    }
}

/// Normalize a spreadsheet to `{stem}_converted.csv`, keeping the first two
/// columns of the first worksheet
fn convert_xlsx_to_csv(path: &Path) -> Result<PathBuf> {
    let file = File::open(path)
        .with_context(|| format!("Failed to open spreadsheet: {}", path.display()))?;
    let mut archive = ZipArchive::new(file).context("Failed to read spreadsheet archive")?;

    let shared_strings = match read_zip_entry(&mut archive, "xl/sharedStrings.xml") {
        Some(xml) => parse_shared_strings(&xml)?,
        None => Vec::new(),
    };
    let sheet_xml = read_zip_entry(&mut archive, "xl/worksheets/sheet1.xml")
        .ok_or_else(|| anyhow!("Spreadsheet has no first worksheet"))?;
    let rows = parse_worksheet_rows(&sheet_xml, &shared_strings)?;

    let mut out = String::new();
    for row in &rows {
        let first = row.first().map(String::as_str).unwrap_or("");
        let second = row.get(1).map(String::as_str).unwrap_or("");
        out.push_str(&format_csv_row(&[first, second]));
    }

    let converted = path.with_file_name(format!(
        "{}_converted.csv",
        path.file_stem().and_then(|s| s.to_str()).unwrap_or("glossary")
    ));
    std::fs::write(&converted, out)
        .with_context(|| format!("Failed to write converted file: {}", converted.display()))?;
    Ok(converted)
}

fn read_zip_entry(archive: &mut ZipArchive<File>, name: &str) -> Option<Vec<u8>> {
    let mut entry = archive.by_name(name).ok()?;
    let mut data = Vec::with_capacity(entry.size() as usize);
    entry.read_to_end(&mut data).ok()?;
    Some(data)
}

/// Pull the shared-string table out of `xl/sharedStrings.xml`. Rich-text
/// runs inside one `<si>` are concatenated; phonetic runs are skipped.
fn parse_shared_strings(xml: &[u8]) -> Result<Vec<String>> {
    let mut reader = Reader::from_reader(xml);
    let mut buf = Vec::new();
    let mut strings = Vec::new();
    let mut current = String::new();
    let mut in_si = false;
    let mut in_text = false;
    let mut in_phonetic = false;

    loop {
        match reader.read_event_into(&mut buf) {
            Ok(Event::Start(e)) => match e.name().as_ref() {
                b"si" => {
                    in_si = true;
                    current.clear();
                }
                b"rPh" => in_phonetic = true,
                b"t" if in_si && !in_phonetic => in_text = true,
                _ => {}
            },
            Ok(Event::End(e)) => match e.name().as_ref() {
                b"si" => {
                    in_si = false;
                    strings.push(std::mem::take(&mut current));
                }
                b"rPh" => in_phonetic = false,
                b"t" => in_text = false,
                _ => {}
            },
            Ok(Event::Text(t)) if in_text => {
                current.push_str(&t.unescape().context("Failed to unescape cell text")?);
            }
            Ok(Event::Eof) => break,
            Ok(_) => {}
            Err(e) => return Err(anyhow!("Failed to parse shared strings: {e}")),
        }
        buf.clear();
    }
    Ok(strings)
}

/// Read the cell grid of one worksheet, resolving shared and inline strings
fn parse_worksheet_rows(xml: &[u8], shared: &[String]) -> Result<Vec<Vec<String>>> {
    let mut reader = Reader::from_reader(xml);
    let mut buf = Vec::new();
    let mut rows: Vec<Vec<String>> = Vec::new();
    let mut current_row: Vec<(usize, String)> = Vec::new();
    let mut cell_column = 0usize;
    let mut cell_type = String::new();
    let mut raw_value = String::new();
    let mut in_value = false;
    let mut in_inline_text = false;

    loop {
        match reader.read_event_into(&mut buf) {
            Ok(Event::Start(e)) => match e.name().as_ref() {
                b"row" => current_row.clear(),
                b"c" => {
                    cell_column = current_row.len();
                    if let Ok(Some(attr)) = e.try_get_attribute("r") {
                        if let Ok(reference) = attr.unescape_value() {
                            cell_column = column_index(&reference);
                        }
                    }
                    cell_type = match e.try_get_attribute("t") {
                        Ok(Some(attr)) => attr.unescape_value().map(|v| v.into_owned()).unwrap_or_default(),
                        _ => String::new(),
                    };
                    raw_value.clear();
                }
                b"v" => in_value = true,
                b"t" => in_inline_text = true,
                _ => {}
            },
            Ok(Event::End(e)) => match e.name().as_ref() {
                b"row" => {
                    let mut row: Vec<String> = Vec::new();
                    for (column, value) in current_row.drain(..) {
                        if row.len() <= column {
                            row.resize(column + 1, String::new());
                        }
                        row[column] = value;
                    }
                    rows.push(row);
                }
                b"c" => {
                    let value = if cell_type == "s" {
                        raw_value
                            .trim()
                            .parse::<usize>()
                            .ok()
                            .and_then(|i| shared.get(i))
                            .cloned()
                            .unwrap_or_default()
                    } else {
                        raw_value.clone()
                    };
                    current_row.push((cell_column, value));
                }
                b"v" => in_value = false,
                b"t" => in_inline_text = false,
                _ => {}
            },
            Ok(Event::Text(t)) if in_value || in_inline_text => {
                raw_value.push_str(&t.unescape().context("Failed to unescape cell value")?);
            }
            Ok(Event::Eof) => break,
            Ok(_) => {}
            Err(e) => return Err(anyhow!("Failed to parse worksheet: {e}")),
        }
        buf.clear();
    }
    Ok(rows)
}

/// 0-based column index from a cell reference like `B3`
fn column_index(reference: &str) -> usize {
    let mut index = 0usize;
    for c in reference.chars().take_while(|c| c.is_ascii_alphabetic()) {
        index = index * 26 + (c.to_ascii_uppercase() as usize - 'A' as usize + 1);
    }
    index.saturating_sub(1)
}
