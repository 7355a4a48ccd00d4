use anyhow::{Context, Result};
use log::{info, warn};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};

use crate::document::Segment;
use crate::glossary::NewTerm;

/// Intermediate-state checkpoint for concurrent runs.
///
/// Before translation begins all segments serialize to
/// `{output_stem}_intermediate.json`; each completion write-through
/// updates its record. A restarted run loads the file, re-emits the
/// completed records and only schedules the pending ones.

/// Structural fields carried alongside a record's content
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct SegmentMetadata {
    /// Heading chain, outermost first
    pub header_path: Vec<String>,
    /// Whether the segment continues a size-split line
    pub is_continuation: bool,
    /// Whether the segment is a standalone image reference
    pub is_image: bool,
}

/// Processing state of one record
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum RecordStatus {
    Pending,
    Completed,
}

/// One segment's row in the checkpoint file
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CheckpointRecord {
    /// The segment's 1-based sequence number
    pub paragraph_number: usize,
    /// Structural fields of the segment
    pub metadata: SegmentMetadata,
    /// Source content of the segment
    pub content: String,
    /// Translated text, filled on completion
    #[serde(default)]
    pub translation: String,
    /// Rendered notes block, filled on completion
    #[serde(default)]
    pub notes: String,
    /// Terms the segment proposed, filled on completion
    #[serde(default)]
    pub new_terms: Vec<NewTerm>,
    /// Whether the record has been translated
    pub status: RecordStatus,
}

impl CheckpointRecord {
    /// Reconstruct the segment this record was created from
    pub fn to_segment(&self) -> Segment {
        Segment {
            content: self.content.clone(),
            header_path: self.metadata.header_path.clone(),
            is_continuation: self.metadata.is_continuation,
            is_image: self.metadata.is_image,
            sequence_number: self.paragraph_number,
        }
    }
}

/// The checkpoint file and its in-memory records
#[derive(Debug)]
pub struct Checkpoint {
    /// Where the checkpoint lives on disk
    path: PathBuf,
    /// Records ordered by `paragraph_number`
    records: Vec<CheckpointRecord>,
}

impl Checkpoint {
    /// Create a fresh checkpoint for the given segments and write it out
    pub fn create<P: AsRef<Path>>(path: P, segments: &[Segment]) -> Result<Self> {
        let records = segments
            .iter()
            .map(|segment| CheckpointRecord {
                paragraph_number: segment.sequence_number,
                metadata: SegmentMetadata {
                    header_path: segment.header_path.clone(),
                    is_continuation: segment.is_continuation,
                    is_image: segment.is_image,
                },
                content: segment.content.clone(),
                translation: String::new(),
                notes: String::new(),
                new_terms: Vec::new(),
                status: RecordStatus::Pending,
            })
            .collect();
        let checkpoint = Self {
            path: path.as_ref().to_path_buf(),
            records,
        };
        checkpoint.save()?;
        Ok(checkpoint)
    }

    /// Load an existing checkpoint
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        let content = fs::read_to_string(path)
            .with_context(|| format!("Failed to read checkpoint: {}", path.display()))?;
        let records: Vec<CheckpointRecord> = serde_json::from_str(&content)
            .with_context(|| format!("Failed to parse checkpoint: {}", path.display()))?;
        Ok(Self {
            path: path.to_path_buf(),
            records,
        })
    }

    /// Load the checkpoint when it exists and matches the current
    /// segmentation, otherwise create a fresh one. Returns whether a
    /// resumable checkpoint was picked up.
    pub fn load_or_create<P: AsRef<Path>>(path: P, segments: &[Segment]) -> Result<(Self, bool)> {
        let path = path.as_ref();
        if path.exists() {
            match Self::load(path) {
                Ok(existing) if existing.matches(segments) => {
                    info!(
                        "Resuming from checkpoint {} ({}/{} segments completed)",
                        path.display(),
                        existing.completed_count(),
                        existing.records.len()
                    );
                    return Ok((existing, true));
                }
                Ok(_) => warn!(
                    "Checkpoint {} does not match the current segmentation, starting over",
                    path.display()
                ),
                Err(e) => warn!("Could not load checkpoint {}: {e}", path.display()),
            }
        }
        Ok((Self::create(path, segments)?, false))
    }

    /// Whether the checkpoint covers exactly the given segments
    fn matches(&self, segments: &[Segment]) -> bool {
        self.records.len() == segments.len()
            && self
                .records
                .iter()
                .zip(segments.iter())
                .all(|(record, segment)| {
                    record.paragraph_number == segment.sequence_number
                        && record.content == segment.content
                })
    }

    /// All records in order
    pub fn records(&self) -> &[CheckpointRecord] {
        &self.records
    }

    /// Records already translated
    pub fn completed_records(&self) -> impl Iterator<Item = &CheckpointRecord> {
        self.records
            .iter()
            .filter(|r| r.status == RecordStatus::Completed)
    }

    /// Number of completed records
    pub fn completed_count(&self) -> usize {
        self.completed_records().count()
    }

    /// Segments still awaiting translation
    pub fn pending_segments(&self) -> Vec<Segment> {
        self.records
            .iter()
            .filter(|r| r.status == RecordStatus::Pending)
            .map(CheckpointRecord::to_segment)
            .collect()
    }

    /// Record one segment's completion and write the file through
    pub fn mark_completed(
        &mut self,
        paragraph_number: usize,
        translation: &str,
        notes: &str,
        new_terms: &[NewTerm],
    ) -> Result<()> {
        let record = self
            .records
            .iter_mut()
            .find(|r| r.paragraph_number == paragraph_number)
            .with_context(|| format!("No checkpoint record for segment {paragraph_number}"))?;
        record.translation = translation.to_string();
        record.notes = notes.to_string();
        record.new_terms = new_terms.to_vec();
        record.status = RecordStatus::Completed;
        self.save()
    }

    /// Where the checkpoint lives
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Delete the checkpoint file after a fully successful run
    pub fn remove(self) -> Result<()> {
        fs::remove_file(&self.path)
            .with_context(|| format!("Failed to remove checkpoint: {}", self.path.display()))
    }

    fn save(&self) -> Result<()> {
        let content = serde_json::to_string_pretty(&self.records)
            .context("Failed to serialize checkpoint")?;
        fs::write(&self.path, content)
            .with_context(|| format!("Failed to write checkpoint: {}", self.path.display()))
    }
}
