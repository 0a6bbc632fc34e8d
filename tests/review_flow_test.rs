//! End-to-end review flow through `ReviewProcessor`.

mod common;

use std::path::Path;
use std::sync::Arc;

use common::*;
use docx_review::feedback::{DefaultFeedback, FeedbackGenerator, FeedbackItem};
use docx_review::store::{InMemorySessionStore, SessionStore};
use docx_review::utils::document_processor::{ArtifactMode, ReviewProcessor};
use docx_review::{Error, ReviewConfig};

struct FailingGenerator;

impl FeedbackGenerator for FailingGenerator {
    fn generate(&self, _section_name: &str, _body: &str) -> docx_review::Result<Vec<FeedbackItem>> {
        Err(Error::Parse("model unavailable".to_string()))
    }
}

fn processor(
    work: &Path,
    store: Arc<InMemorySessionStore>,
    generator: Arc<dyn FeedbackGenerator>,
) -> ReviewProcessor {
    let config = ReviewConfig {
        scratch_dir: Some(work.to_path_buf()),
        output_dir: work.join("out"),
        ..ReviewConfig::default()
    };
    ReviewProcessor::new(config, store, generator)
}

fn item(description: &str) -> FeedbackItem {
    FeedbackItem {
        id: "1".to_string(),
        kind: "important".to_string(),
        category: "Timeline".to_string(),
        description: description.to_string(),
        suggestion: String::new(),
        risk_level: "Medium".to_string(),
        confidence: 0.7,
    }
}

#[test]
fn test_upload_lists_sections_in_document_order() {
    let work = tempfile::tempdir().unwrap();
    let original = work.path().join("case.docx");
    write_case_docx(&original, &[]);

    let store = Arc::new(InMemorySessionStore::new());
    let processor = processor(work.path(), store.clone(), Arc::new(DefaultFeedback));

    let upload = processor.upload(&original).unwrap();
    assert_eq!(upload.sections, vec!["BACKGROUND", "ROOT CAUSE"]);
    assert_eq!(store.len(), 1);

    let analysis = processor.analyze(&upload.session_id, 1).unwrap();
    assert_eq!(analysis.section_name, "ROOT CAUSE");
    assert_eq!(analysis.content, "Y happened.");
    assert_eq!(analysis.feedback.len(), 1);

    let err = processor.analyze(&upload.session_id, 2).unwrap_err();
    assert!(matches!(err, Error::SectionNotFound(2)));
}

#[test]
fn test_complete_review_embeds_comments_and_closes_session() {
    let work = tempfile::tempdir().unwrap();
    let original = work.path().join("case.docx");
    write_case_docx(&original, &[]);

    let store = Arc::new(InMemorySessionStore::new());
    let processor = processor(work.path(), store.clone(), Arc::new(DefaultFeedback));
    let upload = processor.upload(&original).unwrap();

    processor
        .accept_feedback(&upload.session_id, "BACKGROUND", item("Say who found X."))
        .unwrap();
    processor
        .accept_feedback(&upload.session_id, "ROOT CAUSE", item("Why did Y happen?"))
        .unwrap();

    let artifact = processor.complete_review(&upload.session_id).unwrap();
    assert_eq!(artifact.mode, ArtifactMode::Inline);
    assert_eq!(artifact.comment_count, 2);
    assert!(store.get(&upload.session_id).is_none());

    let comments = read_part(&artifact.path, COMMENTS_PART).unwrap();
    assert!(comments.contains("Say who found X."));
    assert!(comments.contains("w:author=\"AI Feedback\""));

    // Each comment is anchored on the first body paragraph of its section.
    let document = read_part(&artifact.path, DOCUMENT_PART).unwrap();
    let found_x = document.find("We found X.").unwrap();
    let y_happened = document.find("Y happened.").unwrap();
    let first_ref = document.find("w:commentReference").unwrap();
    let last_ref = document.rfind("w:commentReference").unwrap();
    assert!(found_x < first_ref && first_ref < y_happened);
    assert!(y_happened < last_ref);
}

#[test]
fn test_unpatchable_package_falls_back_to_summary() {
    let work = tempfile::tempdir().unwrap();
    let original = work.path().join("case.docx");
    write_case_docx(&original, &[]);
    append_part(&original, COMMENTS_PART, "<w:comments");

    let store = Arc::new(InMemorySessionStore::new());
    let processor = processor(work.path(), store.clone(), Arc::new(DefaultFeedback));
    let upload = processor.upload(&original).unwrap();
    processor
        .accept_feedback(&upload.session_id, "BACKGROUND", item("Say who found X."))
        .unwrap();

    let artifact = processor.complete_review(&upload.session_id).unwrap();
    assert_eq!(artifact.mode, ArtifactMode::Summary);
    assert_eq!(artifact.comment_count, 1);
    assert!(store.is_empty());

    let document = read_part(&artifact.path, DOCUMENT_PART).unwrap();
    assert!(document.contains("Review Feedback Summary"));
    assert!(document.contains("Say who found X."));
}

#[test]
fn test_package_without_document_relationships_falls_back_to_summary() {
    let work = tempfile::tempdir().unwrap();
    let original = work.path().join("case.docx");
    write_case_docx(&original, &[DOCUMENT_RELS_PART]);

    let store = Arc::new(InMemorySessionStore::new());
    let processor = processor(work.path(), store.clone(), Arc::new(DefaultFeedback));
    let upload = processor.upload(&original).unwrap();
    for analysis in processor.analyze_all(&upload.session_id).unwrap() {
        for item in analysis.feedback {
            processor
                .accept_feedback(&upload.session_id, &analysis.section_name, item)
                .unwrap();
        }
    }

    let artifact = processor.complete_review(&upload.session_id).unwrap();
    assert_eq!(artifact.mode, ArtifactMode::Summary);
    assert_eq!(artifact.comment_count, 2);
    assert!(store.is_empty());

    let document = read_part(&artifact.path, DOCUMENT_PART).unwrap();
    assert!(document.contains("We found X."));
    assert!(document.contains("Review Feedback Summary"));
    assert!(document.contains("Total feedback items: 2"));
}

#[test]
fn test_unknown_session_is_reported() {
    let work = tempfile::tempdir().unwrap();
    let processor = processor(
        work.path(),
        Arc::new(InMemorySessionStore::new()),
        Arc::new(DefaultFeedback),
    );

    assert!(matches!(
        processor.analyze("nope", 0),
        Err(Error::SessionNotFound(_))
    ));
    assert!(matches!(
        processor.accept_feedback("nope", "BACKGROUND", item("x")),
        Err(Error::SessionNotFound(_))
    ));
    assert!(matches!(
        processor.complete_review("nope"),
        Err(Error::SessionNotFound(_))
    ));
}

#[test]
fn test_failing_generator_uses_default_feedback() {
    let work = tempfile::tempdir().unwrap();
    let original = work.path().join("case.docx");
    write_case_docx(&original, &[]);

    let processor = processor(
        work.path(),
        Arc::new(InMemorySessionStore::new()),
        Arc::new(FailingGenerator),
    );
    let upload = processor.upload(&original).unwrap();

    let analyses = processor.analyze_all(&upload.session_id).unwrap();
    assert_eq!(analyses.len(), 2);
    for analysis in &analyses {
        assert_eq!(analysis.feedback, DefaultFeedback::items(&analysis.section_name));
    }
}

#[test]
fn test_upload_of_missing_file_fails() {
    let work = tempfile::tempdir().unwrap();
    let processor = processor(
        work.path(),
        Arc::new(InMemorySessionStore::new()),
        Arc::new(DefaultFeedback),
    );
    assert!(processor.upload(work.path().join("absent.docx")).is_err());
}
