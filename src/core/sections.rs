//! Bold-header section extraction.
//!
//! A paragraph opens a new section when it is short, mostly bold, and either
//! names a known section or looks like a label (trailing colon / all caps).

use crate::Block;
use serde::Serialize;

pub const DEFAULT_SECTION: &str = "Main Content";

const MAX_HEADER_CHARS: usize = 100;

#[derive(Debug, Clone, Serialize, PartialEq, Eq)]
pub struct Section {
    pub name: String,
    pub body: String,
    /// Indices of the blocks that make up the body, used to anchor feedback.
    pub blocks: Vec<usize>,
}

impl Section {
    /// First member block, or the document start when the section has none.
    pub fn anchor_block(&self) -> usize {
        self.blocks.first().copied().unwrap_or(0)
    }
}

/// Sections keyed by name, in first-insertion order.
#[derive(Debug, Clone, Default, Serialize, PartialEq, Eq)]
pub struct SectionMap {
    sections: Vec<Section>,
}

impl SectionMap {
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert or replace by name. A replaced section keeps its original position.
    pub fn insert(&mut self, section: Section) {
        match self.sections.iter_mut().find(|s| s.name == section.name) {
            Some(existing) => *existing = section,
            None => self.sections.push(section),
        }
    }

    pub fn get(&self, name: &str) -> Option<&Section> {
        self.sections.iter().find(|s| s.name == name)
    }

    pub fn get_index(&self, index: usize) -> Option<&Section> {
        self.sections.get(index)
    }

    pub fn names(&self) -> Vec<String> {
        self.sections.iter().map(|s| s.name.clone()).collect()
    }

    pub fn iter(&self) -> impl Iterator<Item = &Section> {
        self.sections.iter()
    }

    pub fn len(&self) -> usize {
        self.sections.len()
    }

    pub fn is_empty(&self) -> bool {
        self.sections.is_empty()
    }
}

impl<'a> IntoIterator for &'a SectionMap {
    type Item = &'a Section;
    type IntoIter = std::slice::Iter<'a, Section>;

    fn into_iter(self) -> Self::IntoIter {
        self.sections.iter()
    }
}

struct OpenSection {
    name: String,
    lines: Vec<String>,
    blocks: Vec<usize>,
}

impl OpenSection {
    fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            lines: Vec::new(),
            blocks: Vec::new(),
        }
    }
}

/// Partition `blocks` into named sections.
///
/// Never returns an empty map: when no section survives, every non-blank
/// block is collected under [`DEFAULT_SECTION`].
pub fn extract<S: AsRef<str>>(blocks: &[Block], known_names: &[S], excluded_fragments: &[S]) -> SectionMap {
    let known: Vec<String> = known_names.iter().map(|s| s.as_ref().to_lowercase()).collect();
    let excluded: Vec<String> = excluded_fragments
        .iter()
        .map(|s| s.as_ref().to_lowercase())
        .collect();

    let mut sections = SectionMap::new();
    let mut current = OpenSection::new(DEFAULT_SECTION);

    for block in blocks {
        let text = block.text.trim();

        if is_header(block, text, &known) {
            let next = OpenSection::new(text.trim_end_matches(':'));
            close_section(std::mem::replace(&mut current, next), &excluded, &mut sections);
        } else if !text.is_empty() {
            current.lines.push(text.to_string());
            current.blocks.push(block.index);
        }
    }
    close_section(current, &excluded, &mut sections);

    if sections.is_empty() {
        let members: Vec<&Block> = blocks.iter().filter(|b| !b.text.trim().is_empty()).collect();
        sections.insert(Section {
            name: DEFAULT_SECTION.to_string(),
            body: members
                .iter()
                .map(|b| b.text.as_str())
                .collect::<Vec<_>>()
                .join("\n"),
            blocks: members.iter().map(|b| b.index).collect(),
        });
    }

    sections
}

fn is_header(block: &Block, text: &str, known: &[String]) -> bool {
    if text.is_empty() || text.chars().count() >= MAX_HEADER_CHARS || !block.is_mostly_bold() {
        return false;
    }

    let lowered = text.to_lowercase();
    if known.iter().any(|name| lowered.contains(name.as_str())) {
        return true;
    }

    text.ends_with(':') || is_upper(text)
}

/// At least one cased character and no lowercase ones.
fn is_upper(text: &str) -> bool {
    let mut has_upper = false;
    for c in text.chars() {
        if c.is_lowercase() {
            return false;
        }
        has_upper |= c.is_uppercase();
    }
    has_upper
}

fn close_section(open: OpenSection, excluded: &[String], sections: &mut SectionMap) {
    if open.lines.is_empty() {
        return;
    }
    let lowered = open.name.to_lowercase();
    if excluded.iter().any(|fragment| lowered.contains(fragment.as_str())) {
        log::debug!("dropping excluded section '{}'", open.name);
        return;
    }
    sections.insert(Section {
        name: open.name,
        body: open.lines.join("\n"),
        blocks: open.blocks,
    });
}
