//! Core data types: the common activity event model all extractors populate.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Artifact family an event was recovered from
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize,
)]
pub enum ArtifactSource {
    /// Evidence that a program ran (UserAssist, Prefetch)
    ExecutionEvidence,
    /// Recently used files and documents (Recent folder, RecentDocs)
    RecentFiles,
    /// Browser history and downloads (Chrome, Edge, Firefox)
    BrowserActivity,
    /// Removable device connection history (USBSTOR)
    UsbHistory,
    /// Recorded command invocations (PowerShell history, RunMRU)
    CommandHistory,
    /// Explorer address bar path history
    TypedPaths,
}

impl ArtifactSource {
    /// All sources, in canonical (sort/tie-break) order
    pub const ALL: [ArtifactSource; 6] = [
        ArtifactSource::ExecutionEvidence,
        ArtifactSource::RecentFiles,
        ArtifactSource::BrowserActivity,
        ArtifactSource::UsbHistory,
        ArtifactSource::CommandHistory,
        ArtifactSource::TypedPaths,
    ];

    /// Display label used in reports
    pub fn label(&self) -> &'static str {
        match self {
            ArtifactSource::ExecutionEvidence => "Execution",
            ArtifactSource::RecentFiles => "File Access",
            ArtifactSource::BrowserActivity => "Web Activity",
            ArtifactSource::UsbHistory => "Hardware",
            ArtifactSource::CommandHistory => "Command Line",
            ArtifactSource::TypedPaths => "Typed Paths",
        }
    }

    /// CLI name accepted by `--sources`
    pub fn cli_name(&self) -> &'static str {
        match self {
            ArtifactSource::ExecutionEvidence => "execution",
            ArtifactSource::RecentFiles => "recent-files",
            ArtifactSource::BrowserActivity => "browser",
            ArtifactSource::UsbHistory => "usb",
            ArtifactSource::CommandHistory => "commands",
            ArtifactSource::TypedPaths => "typed-paths",
        }
    }
}

impl fmt::Display for ArtifactSource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

impl FromStr for ArtifactSource {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        let normalized = s.trim().to_ascii_lowercase();
        ArtifactSource::ALL
            .iter()
            .find(|src| src.cli_name() == normalized)
            .copied()
            .ok_or_else(|| {
                format!(
                    "unknown source '{}' (expected one of: {})",
                    s,
                    ArtifactSource::ALL
                        .iter()
                        .map(|s| s.cli_name())
                        .collect::<Vec<_>>()
                        .join(", ")
                )
            })
    }
}

/// Declared resolution of a normalized timestamp.
///
/// Some stores resolve only to whole seconds, and registry-backed artifacts
/// often inherit the last-write time of the containing key rather than a
/// per-value time.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Precision {
    /// Sub-second resolution (FILETIME, WebKit and Unix microsecond encodings)
    Millisecond,
    /// Whole-second resolution
    Second,
    /// Timestamp belongs to the containing store (e.g. registry key
    /// last-write time applied to each value inside it)
    Container,
}

impl Precision {
    pub fn label(&self) -> &'static str {
        match self {
            Precision::Millisecond => "millisecond",
            Precision::Second => "second",
            Precision::Container => "container",
        }
    }
}

/// A single normalized activity event: the unit of triage output.
///
/// Immutable once constructed. Every event carries a canonical UTC timestamp
/// and a non-empty origin naming the store it was recovered from.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ActivityEvent {
    /// Artifact family
    pub source: ArtifactSource,
    /// Family-specific discriminator (e.g. "Prefetch" vs "UserAssist")
    pub subtype: String,
    /// Canonical UTC instant
    pub timestamp: DateTime<Utc>,
    /// Declared timestamp resolution
    pub precision: Precision,
    /// The artifact payload: path, URL, device name, command string
    pub subject: String,
    /// Extractor-specific key/value metadata for audit traceability
    pub raw: Vec<(String, String)>,
    /// Underlying store the value came from: registry key path, file path,
    /// or database table
    pub origin: String,
}

impl ActivityEvent {
    /// Ordering key: ascending timestamp, ties broken by source then origin
    /// for deterministic output.
    pub fn sort_key(&self) -> (DateTime<Utc>, ArtifactSource, &str) {
        (self.timestamp, self.source, &self.origin)
    }

    /// Flatten raw metadata for single-column display
    pub fn details(&self) -> String {
        self.raw
            .iter()
            .map(|(k, v)| format!("{}: {}", k, v))
            .collect::<Vec<_>>()
            .join("; ")
    }
}
