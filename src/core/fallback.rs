//! Summary-section fallback used when comments cannot be embedded natively.

use crate::config::ReviewConfig;
use crate::core::parser::DOCUMENT_PART;
use crate::core::parts::{
    document_target_path, CommentsPart, ContentTypeEntry, ContentTypes, Relationship, Relationships,
    COMMENTS_REL_TYPE, CONTENT_TYPES_PART, DOCUMENT_RELS_PART,
};
use crate::core::writer::reviewed_output_path;
use crate::error::{Error, Result};
use crate::SectionComments;
use chrono::{DateTime, Local};
use docx_rs::{read_docx, BreakType, Paragraph, Run};
use std::fmt::Display;
use std::fs;
use std::io::{Cursor, Read, Write};
use std::path::{Path, PathBuf};
use tempfile::NamedTempFile;
use zip::write::FileOptions;
use zip::{ZipArchive, ZipWriter};

const PACKAGE_RELS_PART: &str = "_rels/.rels";
const STYLES_PART: &str = "word/styles.xml";

const OFFICE_DOCUMENT_REL_TYPE: &str =
    "http://schemas.openxmlformats.org/officeDocument/2006/relationships/officeDocument";
const STYLES_REL_TYPE: &str = "http://schemas.openxmlformats.org/officeDocument/2006/relationships/styles";
const DOCUMENT_CONTENT_TYPE: &str =
    "application/vnd.openxmlformats-officedocument.wordprocessingml.document.main+xml";
const STYLES_CONTENT_TYPE: &str = "application/vnd.openxmlformats-officedocument.wordprocessingml.styles+xml";
const RELS_CONTENT_TYPE: &str = "application/vnd.openxmlformats-package.relationships+xml";

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SummaryLine {
    PageBreak,
    Heading { level: u8, text: String },
    Text(String),
    Blank,
    Bullet { label: String, text: String },
}

impl SummaryLine {
    fn into_paragraph(self) -> Paragraph {
        match self {
            SummaryLine::PageBreak => Paragraph::new().add_run(Run::new().add_break(BreakType::Page)),
            SummaryLine::Heading { level, text } => Paragraph::new()
                .style(&format!("Heading{}", level))
                .add_run(Run::new().add_text(text).bold()),
            SummaryLine::Text(text) => Paragraph::new().add_run(Run::new().add_text(text)),
            SummaryLine::Blank => Paragraph::new(),
            SummaryLine::Bullet { label, text } => Paragraph::new()
                .add_run(Run::new().add_text(label).bold())
                .add_run(Run::new().add_text(text)),
        }
    }
}

/// Appends a visible feedback summary to a copy of the original document.
#[derive(Debug, Clone)]
pub struct FallbackAnnotator {
    output_dir: PathBuf,
    heading: String,
    default_author: String,
}

impl FallbackAnnotator {
    pub fn new(config: &ReviewConfig) -> Self {
        Self {
            output_dir: config.output_dir.clone(),
            heading: config.summary_heading.clone(),
            default_author: config.default_author.clone(),
        }
    }

    pub fn annotate_fallback(&self, original: &Path, groups: &[SectionComments]) -> Result<PathBuf> {
        let out_path = reviewed_output_path(&self.output_dir, original);
        self.write_summary(original, &out_path, groups)?;
        Ok(out_path)
    }

    pub fn write_summary(&self, original: &Path, out_path: &Path, groups: &[SectionComments]) -> Result<()> {
        let bytes = fs::read(original)
            .map_err(|e| Error::Serialization(format!("cannot read {}: {}", original.display(), e)))?;
        let repaired = repair_package(&bytes)?;
        let mut docx = read_docx(repaired.as_deref().unwrap_or(&bytes))
            .map_err(|e| Error::Serialization(format!("cannot open {}: {}", original.display(), e)))?;

        for line in self.summary_lines(groups, Local::now()) {
            docx = docx.add_paragraph(line.into_paragraph());
        }

        let out_dir = match out_path.parent() {
            Some(p) if !p.as_os_str().is_empty() => p.to_path_buf(),
            _ => PathBuf::from("."),
        };
        fs::create_dir_all(&out_dir).map_err(|e| Error::Serialization(e.to_string()))?;
        let mut staged = NamedTempFile::new_in(&out_dir).map_err(|e| Error::Serialization(e.to_string()))?;
        docx.build()
            .pack(staged.as_file_mut())
            .map_err(|e| Error::Serialization(format!("cannot write document: {}", e)))?;
        staged
            .persist_noclobber(out_path)
            .map_err(|e| Error::Serialization(e.to_string()))?;

        log::info!("wrote feedback summary to {}", out_path.display());
        Ok(())
    }

    pub fn summary_lines(&self, groups: &[SectionComments], generated: DateTime<Local>) -> Vec<SummaryLine> {
        let total: usize = groups.iter().map(|g| g.comments.len()).sum();

        let mut lines = vec![
            SummaryLine::PageBreak,
            SummaryLine::Heading {
                level: 1,
                text: self.heading.clone(),
            },
            SummaryLine::Text(format!("Generated on: {}", generated.format("%Y-%m-%d %H:%M"))),
            SummaryLine::Text(format!("Total feedback items: {}", total)),
            SummaryLine::Blank,
        ];

        for group in groups {
            lines.push(SummaryLine::Heading {
                level: 2,
                text: group.section.clone(),
            });
            for comment in &group.comments {
                let author = comment.author.as_deref().unwrap_or(&self.default_author);
                lines.push(SummaryLine::Bullet {
                    label: format!(
                        "\u{2022} [{}] {} - {} Risk: ",
                        author,
                        comment.kind.to_uppercase(),
                        comment.risk_level
                    ),
                    text: comment.text.clone(),
                });
            }
        }
        lines
    }
}

fn serialization(e: impl Display) -> Error {
    Error::Serialization(format!("cannot repair package: {}", e))
}

fn read_entry<R: Read + std::io::Seek>(archive: &mut ZipArchive<R>, name: &str) -> Option<String> {
    let mut entry = archive.by_name(name).ok()?;
    let mut content = String::new();
    entry.read_to_string(&mut content).ok()?;
    Some(content)
}

/// Rebuild the package manifests the document model needs to open a package.
///
/// A manifest that is missing or unreadable is regenerated from the parts that
/// are present, and a comments relationship whose part cannot be read is
/// dropped. Returns `None` when the package opens as it is.
fn repair_package(bytes: &[u8]) -> Result<Option<Vec<u8>>> {
    let mut archive = ZipArchive::new(Cursor::new(bytes)).map_err(serialization)?;
    let names: Vec<String> = archive.file_names().map(str::to_string).collect();
    let has = |name: &str| names.iter().any(|n| n == name);
    let mut replacements: Vec<(&str, String)> = Vec::new();

    let types_ok = read_entry(&mut archive, CONTENT_TYPES_PART)
        .map_or(false, |xml| ContentTypes::parse(&xml).is_ok());
    if !types_ok {
        let mut types = ContentTypes {
            entries: vec![
                ContentTypeEntry::Default {
                    extension: "rels".to_string(),
                    content_type: RELS_CONTENT_TYPE.to_string(),
                },
                ContentTypeEntry::Default {
                    extension: "xml".to_string(),
                    content_type: "application/xml".to_string(),
                },
            ],
        };
        types.ensure_override(&format!("/{}", DOCUMENT_PART), DOCUMENT_CONTENT_TYPE);
        if has(STYLES_PART) {
            types.ensure_override(&format!("/{}", STYLES_PART), STYLES_CONTENT_TYPE);
        }
        replacements.push((CONTENT_TYPES_PART, types.to_xml().map_err(serialization)?));
    }

    let package_rels_ok = read_entry(&mut archive, PACKAGE_RELS_PART)
        .map_or(false, |xml| Relationships::parse(&xml, PACKAGE_RELS_PART).is_ok());
    if !package_rels_ok {
        let rels = Relationships {
            entries: vec![relationship("rId1", OFFICE_DOCUMENT_REL_TYPE, DOCUMENT_PART)],
        };
        replacements.push((PACKAGE_RELS_PART, rels.to_xml().map_err(serialization)?));
    }

    let document_rels = read_entry(&mut archive, DOCUMENT_RELS_PART)
        .and_then(|xml| Relationships::parse(&xml, DOCUMENT_RELS_PART).ok());
    match document_rels {
        Some(mut rels) => {
            let unreadable_comments = rels.find_by_type(COMMENTS_REL_TYPE).map_or(false, |rel| {
                let name = document_target_path(&rel.target);
                read_entry(&mut archive, &name).map_or(false, |xml| CommentsPart::parse(&xml, &name).is_err())
            });
            if unreadable_comments {
                rels.entries.retain(|r| r.rel_type != COMMENTS_REL_TYPE);
                replacements.push((DOCUMENT_RELS_PART, rels.to_xml().map_err(serialization)?));
            }
        }
        None => {
            let mut rels = Relationships::default();
            if has(STYLES_PART) {
                rels.entries.push(relationship("rId1", STYLES_REL_TYPE, "styles.xml"));
            }
            replacements.push((DOCUMENT_RELS_PART, rels.to_xml().map_err(serialization)?));
        }
    }

    if replacements.is_empty() {
        return Ok(None);
    }
    log::debug!(
        "rebuilding {:?} before writing the summary",
        replacements.iter().map(|(name, _)| *name).collect::<Vec<_>>()
    );

    let mut out = ZipWriter::new(Cursor::new(Vec::new()));
    for i in 0..archive.len() {
        let entry = archive.by_index_raw(i).map_err(serialization)?;
        if replacements.iter().any(|(name, _)| *name == entry.name()) {
            continue;
        }
        out.raw_copy_file(entry).map_err(serialization)?;
    }
    for (name, xml) in &replacements {
        out.start_file(*name, FileOptions::default()).map_err(serialization)?;
        out.write_all(xml.as_bytes()).map_err(serialization)?;
    }
    Ok(Some(out.finish().map_err(serialization)?.into_inner()))
}

fn relationship(id: &str, rel_type: &str, target: &str) -> Relationship {
    Relationship {
        id: id.to_string(),
        rel_type: rel_type.to_string(),
        target: target.to_string(),
        target_mode: None,
    }
}
