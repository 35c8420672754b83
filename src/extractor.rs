//! The extractor capability shared by every artifact family.

use crate::error::ExtractorError;
use crate::types::{ActivityEvent, ArtifactSource};
use std::path::PathBuf;

/// One artifact extractor: a single bounded, read-only pass over one store.
///
/// Each call to `extract` performs fresh I/O against the live store and
/// returns every timestamped entry the store retains; the correlator applies
/// the time window. Routine absence of the artifact (browser not installed,
/// no USB history) is an empty result, not an error. A store that exists but
/// cannot be read is an `ExtractorError`, which the correlator records and
/// continues past.
pub trait Extractor: Send + Sync {
    /// Artifact family this extractor contributes to
    fn source(&self) -> ArtifactSource;

    /// Display name, e.g. "UserAssist" or "Chrome History"
    fn name(&self) -> &'static str;

    /// Scan the store and return its events
    fn extract(&self) -> Result<Vec<ActivityEvent>, ExtractorError>;
}

/// Host locations the file-backed extractors scan.
///
/// Resolved once from the environment at startup and passed in explicitly so
/// extractors are deterministic and testable against fixture directories.
#[derive(Debug, Clone)]
pub struct ScanContext {
    /// `%APPDATA%` (Recent folder, PSReadLine history, Firefox profiles)
    pub appdata: Option<PathBuf>,
    /// `%LOCALAPPDATA%` (Chrome/Edge user data)
    pub local_appdata: Option<PathBuf>,
    /// `%SystemRoot%` (Prefetch directory), defaults to `C:\Windows`
    pub system_root: PathBuf,
}

impl ScanContext {
    /// Resolve from the process environment
    pub fn from_environment() -> Self {
        Self {
            appdata: std::env::var_os("APPDATA").map(PathBuf::from),
            local_appdata: std::env::var_os("LOCALAPPDATA").map(PathBuf::from),
            system_root: std::env::var_os("SystemRoot")
                .map(PathBuf::from)
                .unwrap_or_else(|| PathBuf::from(r"C:\Windows")),
        }
    }

    /// Fixture-rooted context for tests
    #[cfg(test)]
    pub fn rooted_at(root: &std::path::Path) -> Self {
        Self {
            appdata: Some(root.join("AppData").join("Roaming")),
            local_appdata: Some(root.join("AppData").join("Local")),
            system_root: root.join("Windows"),
        }
    }
}
