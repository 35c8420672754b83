//! Error types and handling for the TF application.

use crate::types::ArtifactSource;
use serde::Serialize;
use std::fmt;

/// Custom error type for TF operations
#[derive(Debug)]
pub enum Error {
    /// I/O related errors
    Io(std::io::Error),
    /// JSON serialization/deserialization errors
    Json(serde_json::Error),
    /// CSV writing errors
    Csv(csv::Error),
    /// Generic error with message
    Generic(String),
    /// Invalid run configuration (bad window, reference time, source list)
    InvalidInput(String),
}

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Error::Io(err) => write!(f, "I/O error: {}", err),
            Error::Json(err) => write!(f, "JSON error: {}", err),
            Error::Csv(err) => write!(f, "CSV error: {}", err),
            Error::Generic(msg) => write!(f, "{}", msg),
            Error::InvalidInput(msg) => write!(f, "Invalid input: {}", msg),
        }
    }
}

impl std::error::Error for Error {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            Error::Io(err) => Some(err),
            Error::Json(err) => Some(err),
            Error::Csv(err) => Some(err),
            _ => None,
        }
    }
}

// Convenient conversion traits
impl From<std::io::Error> for Error {
    fn from(err: std::io::Error) -> Self {
        Error::Io(err)
    }
}

impl From<serde_json::Error> for Error {
    fn from(err: serde_json::Error) -> Self {
        Error::Json(err)
    }
}

impl From<csv::Error> for Error {
    fn from(err: csv::Error) -> Self {
        Error::Csv(err)
    }
}

impl From<anyhow::Error> for Error {
    fn from(err: anyhow::Error) -> Self {
        Error::Generic(err.to_string())
    }
}

/// Convenient Result type alias
pub type Result<T> = std::result::Result<T, Error>;

/// Record-scoped timestamp normalization failure.
///
/// A single artifact record with an unparseable timestamp is dropped by its
/// extractor; this error never escalates past the record.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NormalizeError {
    /// Value cannot represent a valid calendar instant (zero, negative,
    /// or outside the 1980-2100 sanity bound)
    OutOfRange,
    /// Raw value does not match the declared encoding
    MalformedEncoding,
}

impl fmt::Display for NormalizeError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            NormalizeError::OutOfRange => write!(f, "timestamp out of range"),
            NormalizeError::MalformedEncoding => write!(f, "malformed timestamp encoding"),
        }
    }
}

impl std::error::Error for NormalizeError {}

/// Store-scoped extractor failure, recorded on the run report.
///
/// Routine absence of an artifact is NOT an error (extractors return an empty
/// set for that); this type covers stores that exist but cannot be read.
#[derive(Debug, Clone, Serialize)]
pub struct ExtractorError {
    /// Artifact family the failing extractor belongs to
    pub source: ArtifactSource,
    /// Extractor display name (e.g. "UserAssist")
    pub extractor: &'static str,
    /// Failure class
    pub kind: ExtractorErrorKind,
    /// Human-readable detail
    pub detail: String,
}

/// Classes of extractor failure
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum ExtractorErrorKind {
    /// Store present but inaccessible (permissions, locked file)
    Unreadable,
    /// Store readable but structurally invalid
    Corrupted,
}

impl ExtractorError {
    pub fn unreadable(
        source: ArtifactSource,
        extractor: &'static str,
        detail: impl Into<String>,
    ) -> Self {
        Self {
            source,
            extractor,
            kind: ExtractorErrorKind::Unreadable,
            detail: detail.into(),
        }
    }

    pub fn corrupted(
        source: ArtifactSource,
        extractor: &'static str,
        detail: impl Into<String>,
    ) -> Self {
        Self {
            source,
            extractor,
            kind: ExtractorErrorKind::Corrupted,
            detail: detail.into(),
        }
    }
}

impl fmt::Display for ExtractorError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let kind = match self.kind {
            ExtractorErrorKind::Unreadable => "unreadable",
            ExtractorErrorKind::Corrupted => "corrupted",
        };
        write!(f, "{} ({}): {}", self.extractor, kind, self.detail)
    }
}

impl std::error::Error for ExtractorError {}
