//! End-to-end coverage of the redaction pipeline against the default,
//! fully offline heuristic NLP engine.

use std::sync::Arc;

use pii_redactor::config::PipelineConfig;
use pii_redactor::nlp::heuristic::HeuristicEngine;
use pii_redactor::pipeline::{CancellationToken, Pipeline};
use pii_redactor::restorer::restore;

fn pipeline(config: PipelineConfig) -> Pipeline {
    Pipeline::new(config, Arc::new(HeuristicEngine::new()))
}

#[tokio::test]
async fn redacts_and_restores_a_short_letter() {
    let p = pipeline(PipelineConfig::default());
    let cancel = CancellationToken::new();
    let original = "Steve Johnson's account 555-123-4567 was updated on 04/02/1990. Thank you for your patience.";

    let result = p.run(original, &cancel).await.unwrap();
    assert!(result.redacted_text.contains("<<SJ>>"));
    assert!(!result.redacted_text.contains("Steve Johnson"));
    assert!(!result.redacted_text.contains("555-123-4567"));

    let restored = restore(&result.redacted_text, &result.mapping);
    assert_eq!(restored, original);
}

#[tokio::test]
async fn resume_header_and_contact_block_are_redacted() {
    let p = pipeline(PipelineConfig::default());
    let cancel = CancellationToken::new();
    let text = "STEVE JOHNSON\n\nResume\n\nWork Experience: Senior Engineer at Acme Corp.\nEmail: steve.j@example.com";

    let result = p.run(text, &cancel).await.unwrap();
    assert!(result.redacted_text.contains("<<EMAIL_1>>"));
    assert!(!result.redacted_text.contains("steve.j@example.com"));
}

#[tokio::test]
async fn job_titles_are_never_redacted_as_persons() {
    let p = pipeline(PipelineConfig::default());
    let cancel = CancellationToken::new();
    let text = "The Senior Manager approved the request from the Lead Engineer.";

    let result = p.run(text, &cancel).await.unwrap();
    assert!(result.redacted_text.contains("Senior Manager"));
    assert!(result.redacted_text.contains("Lead Engineer"));
}

#[tokio::test]
async fn repeated_person_mentions_share_one_tag() {
    let p = pipeline(PipelineConfig::default());
    let cancel = CancellationToken::new();
    let text = "Steve Johnson opened the meeting. Steve Johnson then closed it.";

    let result = p.run(text, &cancel).await.unwrap();
    assert_eq!(result.redacted_text.matches("<<SJ>>").count(), 2);
    assert_eq!(result.mapping.tags.len(), 1);
}

#[tokio::test]
async fn two_distinct_people_get_distinct_tags() {
    let p = pipeline(PipelineConfig::default());
    let cancel = CancellationToken::new();
    let text = "Steve Johnson spoke with Sarah Jones about the merger.";

    let result = p.run(text, &cancel).await.unwrap();
    assert!(result.redacted_text.contains("<<SJ>>"));
    assert!(result.redacted_text.contains("<<SJ2>>"));
}

#[tokio::test]
async fn audit_pass_catches_a_conjunction_joined_name() {
    let mut config = PipelineConfig::default();
    config.enable_audit = true;
    let p = pipeline(config);
    let cancel = CancellationToken::new();
    let text = "Steve Johnson and Maria reviewed the contract together.";

    let result = p.run(text, &cancel).await.unwrap();
    assert!(!result.redacted_text.contains("Maria"));
    assert_eq!(result.mapping.tags.len(), 2);
}

#[tokio::test]
async fn restoring_with_no_entities_is_a_no_op() {
    let p = pipeline(PipelineConfig::default());
    let cancel = CancellationToken::new();
    let text = "Nothing sensitive is mentioned anywhere in this sentence.";

    let result = p.run(text, &cancel).await.unwrap();
    assert_eq!(result.redacted_text, text);
    assert!(result.mapping.tags.is_empty());
}

#[tokio::test]
async fn mapping_round_trips_through_json() {
    let p = pipeline(PipelineConfig::default());
    let cancel = CancellationToken::new();
    let text = "Contact Steve Johnson at steve.j@example.com.";

    let result = p.run(text, &cancel).await.unwrap();
    let json = result.mapping.to_json_pretty().unwrap();
    let reloaded = pii_redactor::Mapping::from_json(&json).unwrap();
    assert_eq!(reloaded.tags, result.mapping.tags);

    let restored = restore(&result.redacted_text, &reloaded);
    assert_eq!(restored, text);
}
