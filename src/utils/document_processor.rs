use crate::config::ReviewConfig;
use crate::core::fallback::FallbackAnnotator;
use crate::core::parser::{DocxParser, Parser};
use crate::core::sections::extract;
use crate::core::writer::CommentInjector;
use crate::error::{Error, Result};
use crate::feedback::{DefaultFeedback, FeedbackGenerator, FeedbackItem};
use crate::store::{ReviewSession, SessionStore};
use crate::{group_by_section, CommentBatch, FeedbackComment};
use log::{debug, info, warn};
use rayon::prelude::*;
use serde::Serialize;
use std::path::{Path, PathBuf};
use std::sync::Arc;

#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct UploadSummary {
    pub session_id: String,
    pub sections: Vec<String>,
}

#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct SectionAnalysis {
    pub section_name: String,
    pub content: String,
    pub feedback: Vec<FeedbackItem>,
}

#[derive(Debug, Clone, Copy, Serialize, PartialEq, Eq)]
pub enum ArtifactMode {
    /// Comments embedded as native reviewer comments.
    Inline,
    /// Feedback appended as a summary section.
    Summary,
}

#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct ReviewArtifact {
    pub path: PathBuf,
    pub mode: ArtifactMode,
    pub comment_count: usize,
}

/// Drives one review: upload, per-section feedback, acceptance, and the final annotated copy.
pub struct ReviewProcessor {
    config: ReviewConfig,
    store: Arc<dyn SessionStore>,
    generator: Arc<dyn FeedbackGenerator>,
    parser: DocxParser,
    injector: CommentInjector,
    fallback: FallbackAnnotator,
}

impl ReviewProcessor {
    pub fn new(
        config: ReviewConfig,
        store: Arc<dyn SessionStore>,
        generator: Arc<dyn FeedbackGenerator>,
    ) -> Self {
        let injector = CommentInjector::new(&config);
        let fallback = FallbackAnnotator::new(&config);
        Self {
            config,
            store,
            generator,
            parser: DocxParser,
            injector,
            fallback,
        }
    }

    pub fn config(&self) -> &ReviewConfig {
        &self.config
    }

    /// Parse and split a document, then open a session for it.
    pub fn upload<P: AsRef<Path>>(&self, path: P) -> Result<UploadSummary> {
        let path = path.as_ref();
        info!("Loading document: {}", path.display());

        let blocks = self.parser.parse(path)?;
        let sections = extract(&blocks, &self.config.known_sections, &self.config.excluded_sections);
        info!("Loaded {} sections from {} blocks", sections.len(), blocks.len());

        let session = ReviewSession::new(path.to_path_buf(), sections);
        let summary = UploadSummary {
            session_id: session.id.clone(),
            sections: session.sections.names(),
        };
        self.store.put(session);
        Ok(summary)
    }

    pub fn analyze(&self, session_id: &str, section_index: usize) -> Result<SectionAnalysis> {
        let session = self.session(session_id)?;
        let section = session
            .sections
            .get_index(section_index)
            .ok_or(Error::SectionNotFound(section_index))?;

        Ok(SectionAnalysis {
            section_name: section.name.clone(),
            content: section.body.clone(),
            feedback: self.feedback_for(&section.name, &section.body),
        })
    }

    /// Feedback for every section; generator calls run in parallel.
    pub fn analyze_all(&self, session_id: &str) -> Result<Vec<SectionAnalysis>> {
        let session = self.session(session_id)?;
        let sections: Vec<_> = session.sections.iter().collect();

        Ok(sections
            .par_iter()
            .map(|section| SectionAnalysis {
                section_name: section.name.clone(),
                content: section.body.clone(),
                feedback: self.feedback_for(&section.name, &section.body),
            })
            .collect())
    }

    pub fn accept_feedback(&self, session_id: &str, section_name: &str, item: FeedbackItem) -> Result<()> {
        debug!("Accepting feedback '{}' for section '{}'", item.id, section_name);
        self.store.append(session_id, section_name, item)
    }

    /// Produce the reviewed document and close the session.
    ///
    /// Native comments are tried first; if the package cannot be patched the
    /// feedback is written as a summary section instead.
    pub fn complete_review(&self, session_id: &str) -> Result<ReviewArtifact> {
        let session = self.session(session_id)?;
        let comments = self.feedback_comments(&session);

        let mut batch = CommentBatch::new(self.config.default_author.clone());
        for comment in &comments {
            batch.add(comment.block_index, comment.text.clone(), comment.author.as_deref());
        }

        let artifact = match self.injector.inject(&session.document_path, batch.comments()) {
            Ok(path) => ReviewArtifact {
                path,
                mode: ArtifactMode::Inline,
                comment_count: comments.len(),
            },
            Err(e) => {
                warn!(
                    "Falling back to summary for {}: {}",
                    session.document_name, e
                );
                let path = self
                    .fallback
                    .annotate_fallback(&session.document_path, &group_by_section(&comments))?;
                ReviewArtifact {
                    path,
                    mode: ArtifactMode::Summary,
                    comment_count: comments.len(),
                }
            }
        };

        self.store.remove(session_id);
        info!(
            "Review {} completed: {} ({:?})",
            session_id,
            artifact.path.display(),
            artifact.mode
        );
        Ok(artifact)
    }

    fn session(&self, session_id: &str) -> Result<ReviewSession> {
        self.store
            .get(session_id)
            .ok_or_else(|| Error::SessionNotFound(session_id.to_string()))
    }

    fn feedback_for(&self, name: &str, body: &str) -> Vec<FeedbackItem> {
        match self.generator.generate(name, body) {
            Ok(items) => items,
            Err(e) => {
                warn!("Feedback generation failed for '{}': {}; using defaults", name, e);
                DefaultFeedback::items(name)
            }
        }
    }

    /// One comment per accepted item, anchored at the first block of its section.
    fn feedback_comments(&self, session: &ReviewSession) -> Vec<FeedbackComment> {
        session
            .accepted
            .iter()
            .flat_map(|accepted| {
                let block_index = session
                    .sections
                    .get(&accepted.section)
                    .map(|s| s.anchor_block())
                    .unwrap_or(0);
                accepted.items.iter().map(move |item| FeedbackComment {
                    section: accepted.section.clone(),
                    block_index,
                    text: item.comment_text(),
                    author: None,
                    kind: item.kind.clone(),
                    risk_level: item.risk_level.clone(),
                })
            })
            .collect()
    }
}
