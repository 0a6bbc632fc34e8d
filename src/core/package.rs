//! Unpacking a packaged document into a private scratch directory and
//! repacking it with the original entry order.

use crate::error::InjectionError;
use std::fs::{self, File};
use std::io::{self, Read, Seek, Write};
use std::path::{Path, PathBuf};
use tempfile::{NamedTempFile, TempDir};
use walkdir::WalkDir;
use zip::write::FileOptions;
use zip::{CompressionMethod, ZipArchive, ZipWriter};

const SCRATCH_PREFIX: &str = "docx-review-";

/// An unpacked package. The scratch directory is removed when this is dropped.
pub struct ScratchPackage {
    dir: TempDir,
    entries: Vec<String>,
}

impl ScratchPackage {
    /// Extract `original` into a fresh, uniquely named directory under `scratch_root`.
    pub fn unpack(original: &Path, scratch_root: &Path) -> Result<Self, InjectionError> {
        let dir = tempfile::Builder::new()
            .prefix(&format!("{}{}-", SCRATCH_PREFIX, uuid::Uuid::new_v4()))
            .tempdir_in(scratch_root)?;
        log::debug!("unpacking {} into {}", original.display(), dir.path().display());

        let file = File::open(original)
            .map_err(|e| InjectionError::Unpack(format!("{}: {}", original.display(), e)))?;
        let entries = extract_all(file, dir.path())?;

        Ok(Self { dir, entries })
    }

    pub fn path(&self) -> &Path {
        self.dir.path()
    }

    /// Entry names in archive order.
    pub fn entries(&self) -> &[String] {
        &self.entries
    }

    pub fn contains(&self, name: &str) -> bool {
        self.part_path(name).is_file()
    }

    pub fn read_part(&self, name: &str) -> Result<String, InjectionError> {
        let path = self.part_path(name);
        if !path.is_file() {
            return Err(InjectionError::MissingPart(name.to_string()));
        }
        let bytes = fs::read(&path)?;
        String::from_utf8(bytes).map_err(|e| InjectionError::malformed(name, e))
    }

    pub fn read_optional_part(&self, name: &str) -> Result<Option<String>, InjectionError> {
        if self.contains(name) {
            self.read_part(name).map(Some)
        } else {
            Ok(None)
        }
    }

    pub fn write_part(&self, name: &str, content: &str) -> Result<(), InjectionError> {
        let path = self.part_path(name);
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)?;
        }
        fs::write(&path, content)?;
        Ok(())
    }

    /// Write every file of the scratch directory into a new archive at `out_path`.
    ///
    /// The archive is assembled in a temporary file next to `out_path` and only
    /// moved into place once it is complete. An existing file at `out_path` is
    /// never replaced.
    pub fn repack(&self, out_path: &Path) -> Result<(), InjectionError> {
        let out_dir = match out_path.parent() {
            Some(p) if !p.as_os_str().is_empty() => p.to_path_buf(),
            _ => PathBuf::from("."),
        };
        fs::create_dir_all(&out_dir)?;

        let mut staged = NamedTempFile::new_in(&out_dir)?;
        {
            let mut zip = ZipWriter::new(staged.as_file_mut());
            let options = FileOptions::default().compression_method(CompressionMethod::Deflated);

            for name in self.ordered_names()? {
                zip.start_file(name.as_str(), options)
                    .map_err(|e| InjectionError::Repack(e.to_string()))?;
                let mut part = File::open(self.part_path(&name))?;
                io::copy(&mut part, &mut zip)?;
            }

            zip.finish()
                .map_err(|e| InjectionError::Repack(e.to_string()))?;
        }
        staged.as_file_mut().flush()?;

        staged
            .persist_noclobber(out_path)
            .map_err(|e| InjectionError::Repack(e.to_string()))?;
        Ok(())
    }

    /// Original entries still on disk, then any new files sorted by path.
    fn ordered_names(&self) -> Result<Vec<String>, InjectionError> {
        let mut names: Vec<String> = self
            .entries
            .iter()
            .filter(|name| self.contains(name))
            .cloned()
            .collect();

        let mut added = Vec::new();
        for entry in WalkDir::new(self.path()).sort_by_file_name() {
            let entry = entry.map_err(|e| InjectionError::Repack(e.to_string()))?;
            if !entry.file_type().is_file() {
                continue;
            }
            let relative = entry
                .path()
                .strip_prefix(self.path())
                .map_err(|e| InjectionError::Repack(e.to_string()))?;
            let name = to_entry_name(relative)?;
            if !names.contains(&name) {
                added.push(name);
            }
        }
        added.sort();
        names.extend(added);
        Ok(names)
    }

    fn part_path(&self, name: &str) -> PathBuf {
        name.split('/')
            .filter(|c| !c.is_empty())
            .fold(self.path().to_path_buf(), |acc, c| acc.join(c))
    }
}

fn extract_all<R: Read + Seek>(reader: R, dest: &Path) -> Result<Vec<String>, InjectionError> {
    let mut archive = ZipArchive::new(reader)?;
    let mut entries = Vec::with_capacity(archive.len());

    for i in 0..archive.len() {
        let mut file = archive.by_index(i)?;
        let relative = file
            .enclosed_name()
            .map(Path::to_path_buf)
            .ok_or_else(|| InjectionError::Unpack(format!("unsafe entry path: {}", file.name())))?;
        let outpath = dest.join(&relative);

        if file.is_dir() {
            fs::create_dir_all(&outpath)?;
            continue;
        }
        if let Some(parent) = outpath.parent() {
            fs::create_dir_all(parent)?;
        }
        let mut outfile = File::create(&outpath)?;
        io::copy(&mut file, &mut outfile)?;
        entries.push(file.name().trim_start_matches('/').to_string());
    }

    Ok(entries)
}

fn to_entry_name(relative: &Path) -> Result<String, InjectionError> {
    let parts: Option<Vec<&str>> = relative.components().map(|c| c.as_os_str().to_str()).collect();
    parts
        .map(|p| p.join("/"))
        .ok_or_else(|| InjectionError::Repack(format!("non UTF-8 path: {}", relative.display())))
}
