use crate::config::ReviewConfig;
use crate::core::package::ScratchPackage;
use crate::core::parser::DOCUMENT_PART;
use crate::core::parts::{
    anchor_comments, document_target_path, CommentsPart, ContentTypes, Relationships,
    COMMENTS_CONTENT_TYPE, CONTENT_TYPES_PART, DOCUMENT_RELS_PART,
};
use crate::error::InjectionError;
use crate::Comment;
use chrono::Local;
use std::path::{Path, PathBuf};

const REQUIRED_PARTS: [&str; 3] = [CONTENT_TYPES_PART, DOCUMENT_PART, DOCUMENT_RELS_PART];

/// Writer is responsible for writing comments back into a packaged document.
pub trait Writer {
    /// Apply `comments` to `original` and produce a new package at `out_path`.
    fn write_annotations(
        &self,
        original: &Path,
        out_path: &Path,
        comments: &[Comment],
    ) -> Result<(), InjectionError>;
}

/// `reviewed_<stem>_<timestamp>_<suffix>.docx` inside `output_dir`.
///
/// The random suffix keeps reviews of the same document finishing within the
/// same second apart.
pub fn reviewed_output_path(output_dir: &Path, original: &Path) -> PathBuf {
    let stem = original
        .file_stem()
        .map(|s| s.to_string_lossy().into_owned())
        .unwrap_or_else(|| "document".to_string());
    let suffix = uuid::Uuid::new_v4().simple().to_string();
    output_dir.join(format!(
        "reviewed_{}_{}_{}.docx",
        stem,
        Local::now().format("%Y%m%d_%H%M%S"),
        &suffix[..8]
    ))
}

/// Embeds comments as native reviewer comments by patching the package parts.
#[derive(Debug, Clone)]
pub struct CommentInjector {
    scratch_root: PathBuf,
    output_dir: PathBuf,
}

impl CommentInjector {
    pub fn new(config: &ReviewConfig) -> Self {
        Self {
            scratch_root: config.scratch_root(),
            output_dir: config.output_dir.clone(),
        }
    }

    /// Inject into a new package in the output directory and return its path.
    ///
    /// On error no new package exists and the scratch directory is gone.
    pub fn inject(&self, original: &Path, comments: &[Comment]) -> Result<PathBuf, InjectionError> {
        let out_path = reviewed_output_path(&self.output_dir, original);
        self.write_annotations(original, &out_path, comments)?;
        Ok(out_path)
    }
}

impl Writer for CommentInjector {
    fn write_annotations(
        &self,
        original: &Path,
        out_path: &Path,
        comments: &[Comment],
    ) -> Result<(), InjectionError> {
        let scratch = ScratchPackage::unpack(original, &self.scratch_root)?;

        if let Some(missing) = REQUIRED_PARTS.iter().find(|part| !scratch.contains(part)) {
            return Err(InjectionError::MissingPart(missing.to_string()));
        }

        // Parse everything first; nothing is written until all parts are understood.
        let mut rels = Relationships::parse(&scratch.read_part(DOCUMENT_RELS_PART)?, DOCUMENT_RELS_PART)?;
        let (target, rel_added) = rels.ensure_comments();
        let comments_name = document_target_path(&target);

        let mut types = ContentTypes::parse(&scratch.read_part(CONTENT_TYPES_PART)?)?;
        let type_added = types.ensure_override(&format!("/{}", comments_name), COMMENTS_CONTENT_TYPE);

        let mut comments_part = match scratch.read_optional_part(&comments_name)? {
            Some(xml) => CommentsPart::parse(&xml, &comments_name)?,
            None => CommentsPart::new(&comments_name),
        };

        let offset = comments_part.max_id();
        let placed: Vec<Comment> = comments
            .iter()
            .map(|c| Comment {
                id: c.id.saturating_add(offset),
                ..c.clone()
            })
            .collect();
        let anchors: Vec<(usize, u32)> = placed.iter().map(|c| (c.block_index, c.id)).collect();

        let document_xml = scratch.read_part(DOCUMENT_PART)?;
        let (anchored, unanchored) = anchor_comments(&document_xml, DOCUMENT_PART, &anchors)?;
        if !unanchored.is_empty() {
            log::debug!("comments {:?} have no matching paragraph; embedded without anchor", unanchored);
        }

        for comment in placed {
            comments_part.push(comment);
        }

        scratch.write_part(&comments_name, &comments_part.to_xml()?)?;
        if rel_added {
            log::debug!("adding comments relationship -> {}", target);
            scratch.write_part(DOCUMENT_RELS_PART, &rels.to_xml()?)?;
        }
        if type_added {
            log::debug!("adding content-type override for /{}", comments_name);
            scratch.write_part(CONTENT_TYPES_PART, &types.to_xml()?)?;
        }
        if unanchored.len() < anchors.len() {
            scratch.write_part(DOCUMENT_PART, &anchored)?;
        }

        scratch.repack(out_path)?;
        log::info!(
            "embedded {} comments into {}",
            comments.len(),
            out_path.display()
        );
        Ok(())
    }
}
