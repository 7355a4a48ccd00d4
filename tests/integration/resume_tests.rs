/*!
 * Checkpoint resume behavior: a restarted run re-emits the completed
 * records into a fresh output document and only schedules the pending
 * ones, with the earlier run's terms folded back into the aggregate.
 */

use tempfile::tempdir;

use transmark::document::{OutputWriter, Segment};
use transmark::file_utils::FileManager;
use transmark::glossary::{AggregatedTerminology, Glossary, NewTerm};
use transmark::translation::batch::{header_path_for, FlushItem, OrderedFlush};
use transmark::translation::Checkpoint;

fn segments() -> Vec<Segment> {
    vec![
        Segment {
            content: "First paragraph.".to_string(),
            header_path: vec!["# Doc".to_string()],
            is_continuation: false,
            is_image: false,
            sequence_number: 1,
        },
        Segment {
            content: "Second paragraph.".to_string(),
            header_path: vec!["# Doc".to_string()],
            is_continuation: false,
            is_image: false,
            sequence_number: 2,
        },
        Segment {
            content: "Third paragraph.".to_string(),
            header_path: vec!["# Doc".to_string()],
            is_continuation: false,
            is_image: false,
            sequence_number: 3,
        },
    ]
}

#[test]
fn test_resume_completedRecords_shouldReplayIntoFreshOutput() {
    let dir = tempdir().unwrap();
    let output_path = dir.path().join("doc_output.md");
    let checkpoint_path = FileManager::checkpoint_path(&dir.path().join("doc.md"));
    let segments = segments();

    // First run: two of three segments complete, then the process dies
    {
        let mut checkpoint = Checkpoint::create(&checkpoint_path, &segments).unwrap();
        let terms = vec![NewTerm {
            term: "paragraph".to_string(),
            translation: "段落".to_string(),
            reason: "recurring noun".to_string(),
        }];
        checkpoint.mark_completed(1, "第一段。", "", &terms).unwrap();
        checkpoint.mark_completed(2, "第二段。", "", &[]).unwrap();
    }

    // Restart: load the checkpoint and replay completions the way the
    // scheduler does before taking on pending work
    let (checkpoint, resumed) = Checkpoint::load_or_create(&checkpoint_path, &segments).unwrap();
    assert!(resumed);
    assert_eq!(checkpoint.completed_count(), 2);

    let base = Glossary::new();
    let mut aggregated = AggregatedTerminology::new();
    let writer = OutputWriter::create(&output_path, true).unwrap();
    let mut flush = OrderedFlush::new(writer, 1);
    for record in checkpoint.completed_records() {
        aggregated.merge(&base, record.new_terms.clone());
        let segment = record.to_segment();
        flush
            .push(
                record.paragraph_number,
                FlushItem {
                    header_path: header_path_for(&segment),
                    text: record.translation.clone(),
                    notes: None,
                },
            )
            .unwrap();
    }

    assert_eq!(flush.flushed(), 2);
    assert_eq!(flush.next_expected(), 3);
    assert_eq!(aggregated.get("paragraph"), Some("段落"));

    let pending = checkpoint.pending_segments();
    assert_eq!(pending.len(), 1);
    assert_eq!(pending[0].sequence_number, 3);

    let written = std::fs::read_to_string(&output_path).unwrap();
    assert_eq!(written.matches("# Doc").count(), 1);
    let first_pos = written.find("第一段。").unwrap();
    let second_pos = written.find("第二段。").unwrap();
    assert!(first_pos < second_pos);
}

#[test]
fn test_resume_versionedOutput_shouldStillFindCheckpoint() {
    let dir = tempdir().unwrap();
    let input = dir.path().join("book.md");
    std::fs::write(
        &input,
        "First paragraph.\n\nSecond paragraph.\n\nThird paragraph.\n",
    )
    .unwrap();
    let segments = segments();

    // An interrupted run left a partial output and its checkpoint behind
    std::fs::write(dir.path().join("book_output.md"), "# Doc\n\n第一段。\n").unwrap();
    {
        let mut checkpoint =
            Checkpoint::create(FileManager::checkpoint_path(&input), &segments).unwrap();
        checkpoint.mark_completed(1, "第一段。", "", &[]).unwrap();
        checkpoint.mark_completed(2, "第二段。", "", &[]).unwrap();
    }

    // Restart: the output name counts up, the checkpoint name does not
    let output_path = FileManager::versioned_output_path(&input);
    assert_eq!(output_path, dir.path().join("book_output_1.md"));
    let checkpoint_path = FileManager::checkpoint_path(&input);
    assert_eq!(
        checkpoint_path,
        dir.path().join("book_output_intermediate.json")
    );

    let (checkpoint, resumed) = Checkpoint::load_or_create(&checkpoint_path, &segments).unwrap();
    assert!(resumed);
    assert_eq!(checkpoint.completed_count(), 2);
    let pending = checkpoint.pending_segments();
    assert_eq!(pending.len(), 1);
    assert_eq!(pending[0].sequence_number, 3);
}

#[test]
fn test_resume_editedSource_shouldDiscardCheckpoint() {
    let dir = tempdir().unwrap();
    let checkpoint_path = dir.path().join("doc_output_intermediate.json");
    let original = segments();
    {
        let mut checkpoint = Checkpoint::create(&checkpoint_path, &original).unwrap();
        checkpoint.mark_completed(1, "第一段。", "", &[]).unwrap();
    }

    let mut edited = original.clone();
    edited[0].content = "Rewritten first paragraph.".to_string();
    let (fresh, resumed) = Checkpoint::load_or_create(&checkpoint_path, &edited).unwrap();

    assert!(!resumed);
    assert_eq!(fresh.completed_count(), 0);
    assert_eq!(fresh.pending_segments().len(), 3);
}

#[test]
fn test_resume_corruptCheckpointFile_shouldStartOver() {
    let dir = tempdir().unwrap();
    let checkpoint_path = dir.path().join("doc_output_intermediate.json");
    std::fs::write(&checkpoint_path, "not json at all").unwrap();

    let (fresh, resumed) = Checkpoint::load_or_create(&checkpoint_path, &segments()).unwrap();
    assert!(!resumed);
    assert_eq!(fresh.completed_count(), 0);
}
