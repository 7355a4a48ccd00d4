use tempfile::tempdir;

use transmark::glossary::{
    save_terms_result, validate_glossary_file, AggregatedTerminology, Glossary, NewTerm,
};

fn new_term(term: &str, translation: &str, reason: &str) -> NewTerm {
    NewTerm {
        term: term.to_string(),
        translation: translation.to_string(),
        reason: reason.to_string(),
    }
}

#[test]
fn test_glossary_fromPairs_preservesInsertionOrder() {
    let glossary = Glossary::from_pairs([
        ("Night City", "夜之城"),
        ("Arasaka", "荒坂"),
        ("netrunner", "网络黑客"),
    ]);

    let terms: Vec<&str> = glossary.entries().iter().map(|e| e.term.as_str()).collect();
    assert_eq!(terms, vec!["Night City", "Arasaka", "netrunner"]);
    assert_eq!(glossary.len(), 3);
}

#[test]
fn test_loadCsv_bomAndBlankLines_shouldBeTolerated() {
    let dir = tempdir().unwrap();
    let path = dir.path().join("terms.csv");
    std::fs::write(
        &path,
        "\u{feff}term,translation\nNight City,夜之城\n\nArasaka,荒坂\n",
    )
    .unwrap();

    let glossary = Glossary::load_csv(&path).unwrap();
    assert_eq!(glossary.len(), 2);
    assert_eq!(glossary.get("Night City"), Some("夜之城"));
}

#[test]
fn test_aggregatedTerminology_blankEntries_shouldBeSkipped() {
    let mut aggregated = AggregatedTerminology::new();
    let added = aggregated.merge(
        &Glossary::new(),
        vec![
            new_term("", "无名", "blank term"),
            new_term("whitespace", "  ", "blank translation"),
            new_term("valid", "有效", ""),
        ],
    );

    assert_eq!(added, 1);
    assert_eq!(aggregated.get("valid"), Some("有效"));
}

#[test]
fn test_withAggregated_appendsRunTermsAfterBase() {
    let base = Glossary::from_pairs([("Night City", "夜之城")]);
    let mut aggregated = AggregatedTerminology::new();
    aggregated.merge(&base, vec![new_term("Arasaka", "荒坂", "corp")]);

    let merged = base.with_aggregated(&aggregated);
    let terms: Vec<&str> = merged.entries().iter().map(|e| e.term.as_str()).collect();
    assert_eq!(terms, vec!["Night City", "Arasaka"]);
}

#[test]
fn test_saveTermsResult_mergeMode_outputIsReloadableGlossary() {
    let dir = tempdir().unwrap();
    let glossary_path = dir.path().join("terms.csv");
    let base = Glossary::from_pairs([("Night City", "夜之城")]);
    let mut aggregated = AggregatedTerminology::new();
    aggregated.merge(&base, vec![new_term("Arasaka", "荒坂", "corp name")]);

    let saved = save_terms_result(true, &base, &aggregated, &glossary_path).unwrap();

    let validated = validate_glossary_file(&saved).unwrap();
    let reloaded = Glossary::load_csv(&validated).unwrap();
    assert_eq!(reloaded.get("Night City"), Some("夜之城"));
    assert_eq!(reloaded.get("Arasaka"), Some("荒坂"));
}

#[test]
fn test_saveTermsResult_newTermsMode_carriesReason() {
    let dir = tempdir().unwrap();
    let glossary_path = dir.path().join("terms.csv");
    let mut aggregated = AggregatedTerminology::new();
    aggregated.merge(
        &Glossary::new(),
        vec![new_term("Arasaka", "荒坂", "corp name kept phonetic")],
    );

    let saved = save_terms_result(false, &Glossary::new(), &aggregated, &glossary_path).unwrap();
    let name = saved.file_name().unwrap().to_str().unwrap();
    assert!(name.contains("_new_terms_"));

    let content = std::fs::read_to_string(&saved).unwrap();
    assert!(content.starts_with("term,translation,reason\n"));
    assert!(content.contains("corp name kept phonetic"));
}

#[test]
fn test_validateGlossaryFile_goodCsv_returnsSamePath() {
    let dir = tempdir().unwrap();
    let path = dir.path().join("terms.csv");
    std::fs::write(&path, "term,translation\nNight City,夜之城\n").unwrap();

    assert_eq!(validate_glossary_file(&path).unwrap(), path);
}
