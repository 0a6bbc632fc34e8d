//! Error types for docx_review.

use std::io;
use thiserror::Error;

/// Result type alias for review operations.
pub type Result<T> = std::result::Result<T, Error>;

/// Errors surfaced by parsing, review orchestration and the fallback writer.
#[derive(Error, Debug)]
pub enum Error {
    /// The input document cannot be read into blocks.
    #[error("parse error: {0}")]
    Parse(String),

    /// Native comment embedding failed; callers fall back to the summary writer.
    #[error(transparent)]
    Injection(#[from] InjectionError),

    /// The fallback writer could not produce a document. Nothing is left to try.
    #[error("serialization error: {0}")]
    Serialization(String),

    #[error("session not found: {0}")]
    SessionNotFound(String),

    #[error("section not found: index {0}")]
    SectionNotFound(usize),

    #[error("config error: {0}")]
    Config(String),

    #[error("I/O error: {0}")]
    Io(#[from] io::Error),
}

/// Failure of the comment injector. Scratch state is already gone when this is returned.
#[derive(Error, Debug)]
pub enum InjectionError {
    #[error("cannot unpack archive: {0}")]
    Unpack(String),

    #[error("required part missing: {0}")]
    MissingPart(String),

    #[error("malformed part {part}: {reason}")]
    MalformedPart { part: String, reason: String },

    #[error("cannot repack archive: {0}")]
    Repack(String),

    #[error("scratch I/O error: {0}")]
    Io(#[from] io::Error),
}

impl InjectionError {
    pub fn malformed(part: impl Into<String>, reason: impl ToString) -> Self {
        Self::MalformedPart {
            part: part.into(),
            reason: reason.to_string(),
        }
    }
}

impl From<zip::result::ZipError> for InjectionError {
    fn from(err: zip::result::ZipError) -> Self {
        match err {
            zip::result::ZipError::Io(e) => InjectionError::Io(e),
            other => InjectionError::Unpack(other.to_string()),
        }
    }
}

impl From<zip::result::ZipError> for Error {
    fn from(err: zip::result::ZipError) -> Self {
        Error::Parse(err.to_string())
    }
}

impl From<roxmltree::Error> for Error {
    fn from(err: roxmltree::Error) -> Self {
        Error::Parse(err.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display() {
        let err = Error::SessionNotFound("abc".to_string());
        assert_eq!(err.to_string(), "session not found: abc");

        let err: Error = InjectionError::MissingPart("word/_rels/document.xml.rels".to_string()).into();
        assert_eq!(
            err.to_string(),
            "required part missing: word/_rels/document.xml.rels"
        );
    }

    #[test]
    fn test_zip_io_error_maps_to_io() {
        let zip_err = zip::result::ZipError::Io(io::Error::new(io::ErrorKind::NotFound, "gone"));
        let err: InjectionError = zip_err.into();
        assert!(matches!(err, InjectionError::Io(_)));

        let err: InjectionError = zip::result::ZipError::InvalidArchive("bad").into();
        assert!(matches!(err, InjectionError::Unpack(_)));
    }
}
