pub mod core {
    pub mod parser;
    pub mod sections;
    pub mod package;
    pub mod parts;
    pub mod writer;
    pub mod fallback;
}

pub mod utils {
    pub mod document_processor;
}

pub mod config;
pub mod error;
pub mod feedback;
pub mod store;

pub use crate::config::ReviewConfig;
pub use crate::core::sections::{extract, Section, SectionMap};
pub use crate::error::{Error, InjectionError, Result};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// One body-level paragraph of a parsed document.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Block {
    pub index: usize,
    pub text: String,
    pub run_count: usize,
    pub bold_runs: usize,
}

impl Block {
    pub fn new(index: usize, text: impl Into<String>, run_count: usize, bold_runs: usize) -> Self {
        Self {
            index,
            text: text.into(),
            run_count,
            bold_runs: bold_runs.min(run_count),
        }
    }

    /// Fraction of runs rendered bold; 0.0 for a paragraph without runs.
    pub fn bold_fraction(&self) -> f32 {
        if self.run_count == 0 {
            0.0
        } else {
            self.bold_runs as f32 / self.run_count as f32
        }
    }

    /// Strictly more than half of the runs are bold.
    pub fn is_mostly_bold(&self) -> bool {
        self.run_count > 0 && self.bold_runs * 2 > self.run_count
    }
}

/// A reviewer comment ready to be embedded in a package.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Comment {
    pub id: u32,
    pub block_index: usize,
    pub text: String,
    pub author: String,
    pub date: DateTime<Utc>,
}

impl Comment {
    /// Timestamp in the form the comments part expects (microseconds, UTC, trailing `Z`).
    pub fn date_stamp(&self) -> String {
        self.date.format("%Y-%m-%dT%H:%M:%S%.6fZ").to_string()
    }
}

/// Collects comments for one injection, numbering them from 1 in insertion order.
#[derive(Debug, Clone)]
pub struct CommentBatch {
    default_author: String,
    comments: Vec<Comment>,
}

impl CommentBatch {
    pub fn new(default_author: impl Into<String>) -> Self {
        Self {
            default_author: default_author.into(),
            comments: Vec::new(),
        }
    }

    pub fn add(&mut self, block_index: usize, text: impl Into<String>, author: Option<&str>) -> u32 {
        let id = self.comments.len() as u32 + 1;
        let author = author
            .filter(|a| !a.trim().is_empty())
            .unwrap_or(&self.default_author)
            .to_string();
        self.comments.push(Comment {
            id,
            block_index,
            text: text.into(),
            author,
            date: Utc::now(),
        });
        id
    }

    pub fn len(&self) -> usize {
        self.comments.len()
    }

    pub fn is_empty(&self) -> bool {
        self.comments.is_empty()
    }

    pub fn comments(&self) -> &[Comment] {
        &self.comments
    }

    pub fn into_comments(self) -> Vec<Comment> {
        self.comments
    }
}

/// Accepted feedback rendered as a comment, still carrying its section and classification.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct FeedbackComment {
    pub section: String,
    pub block_index: usize,
    pub text: String,
    pub author: Option<String>,
    pub kind: String,
    pub risk_level: String,
}

/// Comments of one section, in the order they were grouped.
#[derive(Debug, Clone, PartialEq)]
pub struct SectionComments {
    pub section: String,
    pub comments: Vec<FeedbackComment>,
}

/// Groups comments by section, keeping the order in which each section first appears.
pub fn group_by_section(comments: &[FeedbackComment]) -> Vec<SectionComments> {
    let mut groups: Vec<SectionComments> = Vec::new();
    for comment in comments {
        match groups.iter_mut().find(|g| g.section == comment.section) {
            Some(group) => group.comments.push(comment.clone()),
            None => groups.push(SectionComments {
                section: comment.section.clone(),
                comments: vec![comment.clone()],
            }),
        }
    }
    groups
}

#[cfg(test)]
mod tests {
    use super::*;

    fn feedback(section: &str, text: &str) -> FeedbackComment {
        FeedbackComment {
            section: section.to_string(),
            block_index: 0,
            text: text.to_string(),
            author: None,
            kind: "critical".to_string(),
            risk_level: "High".to_string(),
        }
    }

    #[test]
    fn test_bold_majority_is_strict() {
        assert!(!Block::new(0, "HEADER", 2, 1).is_mostly_bold());
        assert!(Block::new(0, "HEADER", 3, 2).is_mostly_bold());
        assert!(!Block::new(0, "HEADER", 0, 0).is_mostly_bold());
        assert_eq!(Block::new(0, "", 0, 0).bold_fraction(), 0.0);
    }

    #[test]
    fn test_batch_numbers_from_one_and_defaults_author() {
        let mut batch = CommentBatch::new("AI Feedback");
        assert_eq!(batch.add(3, "first", None), 1);
        assert_eq!(batch.add(99, "second", Some("Reviewer")), 2);
        assert_eq!(batch.add(1, "third", Some("  ")), 3);

        let comments = batch.into_comments();
        assert_eq!(comments[0].author, "AI Feedback");
        assert_eq!(comments[1].author, "Reviewer");
        assert_eq!(comments[2].author, "AI Feedback");
    }

    #[test]
    fn test_date_stamp_has_microseconds() {
        let mut batch = CommentBatch::new("AI Feedback");
        batch.add(0, "text", None);
        let stamp = batch.comments()[0].date_stamp();
        assert!(stamp.ends_with('Z'));
        let fraction = stamp.rsplit('.').next().unwrap_or_default();
        assert_eq!(fraction.len(), 7);
    }

    #[test]
    fn test_group_by_section_keeps_first_appearance_order() {
        let comments = vec![
            feedback("Background", "c1"),
            feedback("Root Cause", "c3"),
            feedback("Background", "c2"),
        ];
        let groups = group_by_section(&comments);
        assert_eq!(groups.len(), 2);
        assert_eq!(groups[0].section, "Background");
        assert_eq!(groups[0].comments.len(), 2);
        assert_eq!(groups[1].section, "Root Cause");
    }
}
