/*!
 * Pipeline tests driving segmentation, terminology matching, prompt
 * construction, response parsing and ordered output together, with
 * scripted payloads standing in for the translation service.
 */

use tempfile::tempdir;

use crate::common::structured_payload;

use transmark::document::{Merger, OutputWriter, Segmenter};
use transmark::glossary::{AggregatedTerminology, Glossary, TermMatcher};
use transmark::translation::batch::{header_path_for, FlushItem, OrderedFlush};
use transmark::translation::prompts::build_translation_prompt;
use transmark::translation::{parse_response, ParseFailure};

const DOC: &str = "\
# Story

The outlaw rode into Night City before dawn and vanished.

## Aftermath

Rumors spread through the markets and nobody slept that night.
";

#[test]
fn test_pipeline_matchedTerms_shouldLandInPrompt() {
    let glossary = Glossary::from_pairs([("Night City", "夜之城"), ("the Outlaw", "法外之徒")]);
    let matcher = TermMatcher::default();
    let segments = Merger::new(10, 600).merge(Segmenter::new(600, 10, true).segment(DOC));

    let first = &segments[0];
    let matched = matcher.match_terms(&first.content, &glossary);
    assert_eq!(matched.len(), 2);

    let prompt = build_translation_prompt(first.content_without_marker(), &matched);
    assert!(prompt.contains("Night City -> 夜之城"));
    assert!(prompt.contains("the Outlaw -> 法外之徒"));
    assert!(prompt.contains(&first.content));
}

#[test]
fn test_pipeline_scriptedPayloads_shouldProduceOrderedAnnotatedOutput() {
    let dir = tempdir().unwrap();
    let out_path = dir.path().join("out.md");
    let segments = Merger::new(10, 600).merge(Segmenter::new(600, 10, true).segment(DOC));
    assert_eq!(segments.len(), 2);

    // Payloads as the service would return them, completed out of order
    let payloads = [
        (
            2usize,
            structured_payload("流言在市场间传开，那一夜无人入睡。", &[]),
        ),
        (
            1usize,
            structured_payload(
                "法外之徒在黎明前骑入夜之城，随后消失了。",
                &[("dawn", "黎明", "time of day kept literal")],
            ),
        ),
    ];

    let base = Glossary::from_pairs([("Night City", "夜之城")]);
    let mut aggregated = AggregatedTerminology::new();
    let writer = OutputWriter::create(&out_path, true).unwrap();
    let mut flush = OrderedFlush::new(writer, 1);

    for (sequence, payload) in payloads {
        let parsed = parse_response(&payload).unwrap();
        aggregated.merge(&base, parsed.new_terms.clone());
        let segment = segments
            .iter()
            .find(|s| s.sequence_number == sequence)
            .unwrap();
        flush
            .push(
                sequence,
                FlushItem {
                    header_path: header_path_for(segment),
                    text: parsed.translation,
                    notes: if parsed.notes.is_empty() {
                        None
                    } else {
                        Some(parsed.notes)
                    },
                },
            )
            .unwrap();
    }

    assert_eq!(flush.flushed(), 2);
    assert_eq!(aggregated.get("dawn"), Some("黎明"));

    let written = std::fs::read_to_string(&out_path).unwrap();
    let first_pos = written.find("骑入夜之城").unwrap();
    let second_pos = written.find("无人入睡").unwrap();
    assert!(first_pos < second_pos);
    assert!(written.contains("# Story"));
    assert!(written.contains("## Aftermath"));
    // The proposed term surfaces as a notes bullet behind the rule
    assert!(written.contains("---"));
    assert!(written.contains("- 黎明 (原文: dawn)：time of day kept literal"));
}

#[test]
fn test_pipeline_proseWrappedPayload_shouldStillParse() {
    let payload = format!(
        "<think>short reasoning</think>\nHere you go:\n{}\n",
        structured_payload("译文", &[])
    );
    let parsed = parse_response(&payload).unwrap();
    assert_eq!(parsed.translation, "译文");
}

#[test]
fn test_pipeline_brokenPayload_shouldBeRepairableNotUnstructured() {
    let broken = "{\"translation\": \"未闭合";
    assert!(matches!(
        parse_response(broken),
        Err(ParseFailure::Unstructured)
    ));

    let windowed = "prefix {\"translation\": 未加引号} suffix";
    assert!(matches!(
        parse_response(windowed),
        Err(ParseFailure::Repairable { .. })
    ));
}
