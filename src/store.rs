//! Review sessions and the store that holds them.

use std::collections::HashMap;
use std::path::PathBuf;
use std::sync::{Arc, Mutex, RwLock};

use chrono::{DateTime, Utc};
use serde::Serialize;

use crate::core::sections::SectionMap;
use crate::error::{Error, Result};
use crate::feedback::FeedbackItem;

/// Feedback accepted for one section, in acceptance order.
#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct AcceptedSection {
    pub section: String,
    pub items: Vec<FeedbackItem>,
}

#[derive(Debug, Clone, Serialize)]
pub struct ReviewSession {
    pub id: String,
    pub document_name: String,
    pub document_path: PathBuf,
    pub started_at: DateTime<Utc>,
    pub sections: SectionMap,
    pub accepted: Vec<AcceptedSection>,
}

impl ReviewSession {
    pub fn new(document_path: PathBuf, sections: SectionMap) -> Self {
        let document_name = document_path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_default();
        Self {
            id: uuid::Uuid::new_v4().to_string(),
            document_name,
            document_path,
            started_at: Utc::now(),
            sections,
            accepted: Vec::new(),
        }
    }

    pub fn accept(&mut self, section: &str, item: FeedbackItem) {
        match self.accepted.iter_mut().find(|a| a.section == section) {
            Some(existing) => existing.items.push(item),
            None => self.accepted.push(AcceptedSection {
                section: section.to_string(),
                items: vec![item],
            }),
        }
    }

    pub fn accepted_count(&self) -> usize {
        self.accepted.iter().map(|a| a.items.len()).sum()
    }
}

pub trait SessionStore: Send + Sync {
    fn put(&self, session: ReviewSession);
    /// A snapshot of the session.
    fn get(&self, id: &str) -> Option<ReviewSession>;
    fn append(&self, id: &str, section: &str, item: FeedbackItem) -> Result<()>;
    fn remove(&self, id: &str) -> Option<ReviewSession>;
    fn clear(&self);
    fn len(&self) -> usize;

    fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// In-process store. The map lock guards membership; each session has its own lock for appends.
#[derive(Debug, Default)]
pub struct InMemorySessionStore {
    sessions: RwLock<HashMap<String, Arc<Mutex<ReviewSession>>>>,
}

impl InMemorySessionStore {
    pub fn new() -> Self {
        Self::default()
    }

    fn entry(&self, id: &str) -> Option<Arc<Mutex<ReviewSession>>> {
        let sessions = self.sessions.read().unwrap_or_else(|e| e.into_inner());
        sessions.get(id).cloned()
    }
}

impl SessionStore for InMemorySessionStore {
    fn put(&self, session: ReviewSession) {
        let mut sessions = self.sessions.write().unwrap_or_else(|e| e.into_inner());
        sessions.insert(session.id.clone(), Arc::new(Mutex::new(session)));
    }

    fn get(&self, id: &str) -> Option<ReviewSession> {
        let entry = self.entry(id)?;
        let session = entry.lock().unwrap_or_else(|e| e.into_inner());
        Some(session.clone())
    }

    fn append(&self, id: &str, section: &str, item: FeedbackItem) -> Result<()> {
        let entry = self
            .entry(id)
            .ok_or_else(|| Error::SessionNotFound(id.to_string()))?;
        let mut session = entry.lock().unwrap_or_else(|e| e.into_inner());
        session.accept(section, item);
        Ok(())
    }

    fn remove(&self, id: &str) -> Option<ReviewSession> {
        let entry = {
            let mut sessions = self.sessions.write().unwrap_or_else(|e| e.into_inner());
            sessions.remove(id)?
        };
        let session = entry.lock().unwrap_or_else(|e| e.into_inner());
        Some(session.clone())
    }

    fn clear(&self) {
        self.sessions
            .write()
            .unwrap_or_else(|e| e.into_inner())
            .clear();
    }

    fn len(&self) -> usize {
        self.sessions.read().unwrap_or_else(|e| e.into_inner()).len()
    }
}
