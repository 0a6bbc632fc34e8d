//! Review configuration.
//!
//! Loaded from a TOML file; every key is optional and falls back to the
//! defaults below.

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};

const KNOWN_SECTIONS: &[&str] = &[
    "Executive Summary",
    "Background",
    "Resolving Actions",
    "Root Cause",
    "Preventative Actions",
    "Investigation Process",
    "Seller Classification",
    "Documentation and Reporting",
    "Impact Assessment",
    "Timeline",
    "Recommendations",
];

const EXCLUDED_SECTIONS: &[&str] = &[
    "Original Email",
    "Email Correspondence",
    "Raw Data",
    "Logs",
    "Attachments",
];

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ReviewConfig {
    /// Section names that confirm a bold paragraph as a header when contained in it.
    #[serde(default = "default_known_sections")]
    pub known_sections: Vec<String>,

    /// Sections whose name contains one of these fragments are dropped.
    #[serde(default = "default_excluded_sections")]
    pub excluded_sections: Vec<String>,

    #[serde(default = "default_author")]
    pub default_author: String,

    #[serde(default = "default_summary_heading")]
    pub summary_heading: String,

    /// Root for injection scratch directories; the OS temp dir when unset.
    #[serde(default)]
    pub scratch_dir: Option<PathBuf>,

    #[serde(default = "default_output_dir")]
    pub output_dir: PathBuf,
}

impl Default for ReviewConfig {
    fn default() -> Self {
        Self {
            known_sections: default_known_sections(),
            excluded_sections: default_excluded_sections(),
            default_author: default_author(),
            summary_heading: default_summary_heading(),
            scratch_dir: None,
            output_dir: default_output_dir(),
        }
    }
}

fn default_known_sections() -> Vec<String> {
    KNOWN_SECTIONS.iter().map(|s| s.to_string()).collect()
}

fn default_excluded_sections() -> Vec<String> {
    EXCLUDED_SECTIONS.iter().map(|s| s.to_string()).collect()
}

fn default_author() -> String {
    "AI Feedback".into()
}

fn default_summary_heading() -> String {
    "Review Feedback Summary".into()
}

fn default_output_dir() -> PathBuf {
    PathBuf::from(".")
}

impl ReviewConfig {
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let raw = std::fs::read_to_string(path)
            .map_err(|e| Error::Config(format!("cannot read {}: {}", path.display(), e)))?;
        Self::from_toml(&raw)
    }

    pub fn from_toml(raw: &str) -> Result<Self> {
        toml::from_str(raw).map_err(|e| Error::Config(e.to_string()))
    }

    pub fn load_or_default(path: Option<&Path>) -> Result<Self> {
        match path {
            Some(p) => Self::load(p),
            None => Ok(Self::default()),
        }
    }

    /// Directory under which injection scratch directories are created.
    pub fn scratch_root(&self) -> PathBuf {
        self.scratch_dir.clone().unwrap_or_else(std::env::temp_dir)
    }
}
