/*!
 * Application-level tests for the controller, covering the paths that
 * need no translation service: input validation, segment-only runs and
 * folder traversal.
 */

use tempfile::tempdir;

use crate::common::init_test_logging;

use transmark::app_controller::Controller;
use transmark::translation::{Checkpoint, RecordStatus};

#[tokio::test]
async fn test_controller_missingInput_shouldFail() {
    init_test_logging();
    let controller = Controller::new_for_test().unwrap();
    let result = controller
        .run("no_such_document.md".into(), None, false, false)
        .await;
    assert!(result.is_err());
}

#[tokio::test]
async fn test_controller_emptyDocument_shouldFinishWithoutArtifacts() {
    let dir = tempdir().unwrap();
    let input = dir.path().join("empty.md");
    std::fs::write(&input, "").unwrap();

    let controller = Controller::new_for_test().unwrap();
    controller.run(input, None, false, false).await.unwrap();

    assert!(!dir.path().join("empty_output.md").exists());
    assert!(!dir.path().join("empty_output_intermediate.json").exists());
}

#[tokio::test]
async fn test_controller_segmentOnly_shouldWriteCheckpointAndStop() {
    init_test_logging();
    let dir = tempdir().unwrap();
    let input = dir.path().join("doc.md");
    std::fs::write(
        &input,
        "# Title\n\nFirst paragraph of the document.\n\n## Part\n\nSecond paragraph follows here.\n",
    )
    .unwrap();

    let controller = Controller::new_for_test().unwrap();
    controller.run(input, None, false, true).await.unwrap();

    let checkpoint_path = dir.path().join("doc_output_intermediate.json");
    assert!(checkpoint_path.exists());
    // No translated output is produced in segment-only mode
    assert!(!dir.path().join("doc_output.md").exists());

    let checkpoint = Checkpoint::load(&checkpoint_path).unwrap();
    assert!(!checkpoint.records().is_empty());
    assert!(checkpoint
        .records()
        .iter()
        .all(|r| r.status == RecordStatus::Pending));
    assert_eq!(checkpoint.records()[0].paragraph_number, 1);
    assert!(checkpoint.records()[0]
        .metadata
        .header_path
        .contains(&"# Title".to_string()));
}

#[tokio::test]
async fn test_controller_segmentOnly_invalidGlossary_shouldFail() {
    let dir = tempdir().unwrap();
    let input = dir.path().join("doc.md");
    std::fs::write(&input, "# Title\n\nBody.\n").unwrap();
    let glossary = dir.path().join("terms.csv");
    std::fs::write(&glossary, "term,translation\nbroken row only one column\n").unwrap();

    let controller = Controller::new_for_test().unwrap();
    let result = controller.run(input, Some(glossary), false, true).await;
    assert!(result.is_err());
}

#[tokio::test]
async fn test_runFolder_noMarkdownFiles_shouldFail() {
    let dir = tempdir().unwrap();
    std::fs::write(dir.path().join("notes.txt"), "not markdown").unwrap();

    let controller = Controller::new_for_test().unwrap();
    let result = controller
        .run_folder(dir.path().to_path_buf(), None, false, true)
        .await;
    assert!(result.is_err());
}

#[tokio::test]
async fn test_runFolder_segmentOnly_shouldCheckpointEveryFile() {
    let dir = tempdir().unwrap();
    std::fs::write(dir.path().join("a.md"), "# A\n\nAlpha body text.\n").unwrap();
    let nested = dir.path().join("sub");
    std::fs::create_dir(&nested).unwrap();
    std::fs::write(nested.join("b.md"), "# B\n\nBeta body text.\n").unwrap();

    let controller = Controller::new_for_test().unwrap();
    controller
        .run_folder(dir.path().to_path_buf(), None, false, true)
        .await
        .unwrap();

    assert!(dir.path().join("a_output_intermediate.json").exists());
    assert!(nested.join("b_output_intermediate.json").exists());
}
