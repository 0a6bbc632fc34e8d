//! Feedback items and the generator seam.
//!
//! The generator itself (a hosted model, a rules engine) lives outside this
//! crate; [`DefaultFeedback`] stands in when it fails.

use serde::{Deserialize, Serialize};

use crate::error::Result;

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct FeedbackItem {
    #[serde(default)]
    pub id: String,
    #[serde(rename = "type", default = "default_kind")]
    pub kind: String,
    #[serde(default)]
    pub category: String,
    pub description: String,
    #[serde(default)]
    pub suggestion: String,
    #[serde(default = "default_risk_level")]
    pub risk_level: String,
    #[serde(default)]
    pub confidence: f32,
}

fn default_kind() -> String {
    "suggestion".into()
}

fn default_risk_level() -> String {
    "Low".into()
}

impl FeedbackItem {
    /// Text placed in the document comment.
    pub fn comment_text(&self) -> String {
        if self.suggestion.trim().is_empty() {
            self.description.clone()
        } else {
            format!("{} Suggestion: {}", self.description, self.suggestion)
        }
    }
}

pub trait FeedbackGenerator: Send + Sync {
    fn generate(&self, section_name: &str, body: &str) -> Result<Vec<FeedbackItem>>;
}

/// The fixed item set used when no generator is available or it fails.
#[derive(Debug, Clone, Copy, Default)]
pub struct DefaultFeedback;

impl DefaultFeedback {
    pub fn items(section_name: &str) -> Vec<FeedbackItem> {
        vec![FeedbackItem {
            id: "1".to_string(),
            kind: "critical".to_string(),
            category: "Investigation Process".to_string(),
            description: format!(
                "Section '{}' needs more detailed analysis of the investigation.",
                section_name
            ),
            suggestion: "Add more specific details about the investigation methodology used.".to_string(),
            risk_level: "High".to_string(),
            confidence: 0.85,
        }]
    }
}

impl FeedbackGenerator for DefaultFeedback {
    fn generate(&self, section_name: &str, _body: &str) -> Result<Vec<FeedbackItem>> {
        Ok(Self::items(section_name))
    }
}

/// Section text beyond this many characters is left out of the prompt.
const PROMPT_BODY_LIMIT: usize = 3000;

/// Generator backed by a text completion: the section goes out as a prompt
/// and the reply is read with [`parse_feedback_response`].
pub struct ResponseFeedback<F> {
    complete: F,
}

impl<F> ResponseFeedback<F>
where
    F: Fn(&str) -> Result<String> + Send + Sync,
{
    pub fn new(complete: F) -> Self {
        Self { complete }
    }

    pub fn prompt(section_name: &str, body: &str) -> String {
        let body: String = body.chars().take(PROMPT_BODY_LIMIT).collect();
        format!(
            "Review the section \"{name}\" of an investigation write-up.\n\n\
             SECTION CONTENT:\n{body}\n\n\
             Return JSON of the form {{\"feedback_items\": [{{\"id\": \"1\", \
             \"type\": \"critical|important|suggestion|positive\", \"category\": \"...\", \
             \"description\": \"...\", \"suggestion\": \"...\", \
             \"risk_level\": \"High|Medium|Low\", \"confidence\": 0.9}}]}}",
            name = section_name,
            body = body
        )
    }
}

impl<F> FeedbackGenerator for ResponseFeedback<F>
where
    F: Fn(&str) -> Result<String> + Send + Sync,
{
    fn generate(&self, section_name: &str, body: &str) -> Result<Vec<FeedbackItem>> {
        let reply = (self.complete)(&Self::prompt(section_name, body))?;
        Ok(parse_feedback_response(&reply))
    }
}

#[derive(Deserialize)]
struct FeedbackEnvelope {
    #[serde(default)]
    feedback_items: Vec<FeedbackItem>,
}

/// Read `{"feedback_items": [...]}` out of a model reply.
///
/// Replies often wrap the JSON in prose; the outermost `{...}` is tried when
/// the whole text does not parse. Anything unreadable yields no items.
pub fn parse_feedback_response(text: &str) -> Vec<FeedbackItem> {
    if let Ok(envelope) = serde_json::from_str::<FeedbackEnvelope>(text.trim()) {
        return envelope.feedback_items;
    }

    let slice = match (text.find('{'), text.rfind('}')) {
        (Some(start), Some(end)) if start < end => &text[start..=end],
        _ => return Vec::new(),
    };
    match serde_json::from_str::<FeedbackEnvelope>(slice) {
        Ok(envelope) => envelope.feedback_items,
        Err(e) => {
            log::warn!("unreadable feedback response: {}", e);
            Vec::new()
        }
    }
}
