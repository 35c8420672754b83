//! Command-line history extractors: PSReadLine history and RunMRU.
//!
//! PSReadLine appends one line per PowerShell command but keeps no per-line
//! timestamps, so every command inherits the history file's modification time
//! at container precision. RunMRU records Run-dialog entries, timestamped by
//! the key's last-write time.

use crate::datetime::system_time_to_utc;
use crate::error::ExtractorError;
use crate::extractor::{Extractor, ScanContext};
use crate::registry::{self, parse_utf16_string, RegistryReadError, RegistryRoot};
use crate::types::{ActivityEvent, ArtifactSource, Precision};
use std::collections::HashSet;
use std::path::PathBuf;

const RUNMRU_KEY: &str = r"Software\Microsoft\Windows\CurrentVersion\Explorer\RunMRU";

/// RunMRU values end with a `\1` suffix; strip it
pub fn parse_runmru_command(data: &[u8]) -> Option<String> {
    let text = parse_utf16_string(data)?;
    let command = text.trim_end_matches("\\1").trim();
    if command.is_empty() {
        None
    } else {
        Some(command.to_string())
    }
}

/// PowerShell ConsoleHost_history.txt extractor
pub struct PowerShellHistoryExtractor {
    history_path: Option<PathBuf>,
}

impl PowerShellHistoryExtractor {
    pub fn new(ctx: &ScanContext) -> Self {
        Self {
            history_path: ctx.appdata.as_ref().map(|appdata| {
                appdata
                    .join("Microsoft")
                    .join("Windows")
                    .join("PowerShell")
                    .join("PSReadLine")
                    .join("ConsoleHost_history.txt")
            }),
        }
    }
}

impl Extractor for PowerShellHistoryExtractor {
    fn source(&self) -> ArtifactSource {
        ArtifactSource::CommandHistory
    }

    fn name(&self) -> &'static str {
        "PowerShell History"
    }

    fn extract(&self) -> Result<Vec<ActivityEvent>, ExtractorError> {
        let Some(history_path) = &self.history_path else {
            return Ok(Vec::new());
        };
        if !history_path.exists() {
            return Ok(Vec::new());
        }

        let unreadable = |err: std::io::Error| {
            ExtractorError::unreadable(
                self.source(),
                self.name(),
                format!("{}: {}", history_path.display(), err),
            )
        };
        let metadata = std::fs::metadata(history_path).map_err(unreadable)?;
        let modified = metadata.modified().map_err(unreadable)?;
        let Ok(normalized) = system_time_to_utc(modified) else {
            return Ok(Vec::new());
        };
        let content = std::fs::read_to_string(history_path).map_err(unreadable)?;

        // The store keeps no per-command times; every distinct command
        // inherits the file mtime at container precision.
        let mut seen = HashSet::new();
        let mut events = Vec::new();
        for (line_number, line) in content.lines().enumerate() {
            let command = line.trim();
            if command.is_empty() || !seen.insert(command.to_string()) {
                continue;
            }
            events.push(ActivityEvent {
                source: self.source(),
                subtype: "PowerShell".to_string(),
                timestamp: normalized.timestamp,
                precision: Precision::Container,
                subject: command.to_string(),
                raw: vec![("line".to_string(), (line_number + 1).to_string())],
                origin: history_path.display().to_string(),
            });
        }
        Ok(events)
    }
}

/// Run-dialog MRU extractor
pub struct RunMruExtractor;

impl Extractor for RunMruExtractor {
    fn source(&self) -> ArtifactSource {
        ArtifactSource::CommandHistory
    }

    fn name(&self) -> &'static str {
        "RunMRU"
    }

    fn extract(&self) -> Result<Vec<ActivityEvent>, ExtractorError> {
        let key = match registry::read_key(RegistryRoot::CurrentUser, RUNMRU_KEY) {
            Ok(key) => key,
            Err(RegistryReadError::Absent) => return Ok(Vec::new()),
            Err(RegistryReadError::Unreadable(detail)) => {
                return Err(ExtractorError::unreadable(self.source(), self.name(), detail))
            }
        };
        let Some(timestamp) = key.last_write else {
            return Ok(Vec::new());
        };

        let mut events = Vec::new();
        for value in &key.values {
            if value.name == "MRUList" {
                continue;
            }
            let Some(command) = parse_runmru_command(&value.data) else {
                continue;
            };
            events.push(ActivityEvent {
                source: self.source(),
                subtype: "RunMRU".to_string(),
                timestamp,
                precision: Precision::Container,
                subject: command,
                raw: vec![("entry".to_string(), value.name.clone())],
                origin: key.path.clone(),
            });
        }
        Ok(events)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn utf16(text: &str) -> Vec<u8> {
        let mut data: Vec<u8> = text.encode_utf16().flat_map(|c| c.to_le_bytes()).collect();
        data.extend_from_slice(&[0, 0]);
        data
    }

    #[test]
    fn test_parse_runmru_command() {
        assert_eq!(
            parse_runmru_command(&utf16("cmd\\1")),
            Some("cmd".to_string())
        );
        assert_eq!(
            parse_runmru_command(&utf16("\\\\fileserver\\share\\1")),
            Some("\\\\fileserver\\share".to_string())
        );
        assert_eq!(parse_runmru_command(&utf16("\\1")), None);
        assert_eq!(parse_runmru_command(&[]), None);
    }

    #[test]
    fn test_powershell_history_fixture() {
        let root = std::env::temp_dir().join(format!("tf-test-psh-{}", std::process::id()));
        let psreadline = root
            .join("AppData")
            .join("Roaming")
            .join("Microsoft")
            .join("Windows")
            .join("PowerShell")
            .join("PSReadLine");
        std::fs::create_dir_all(&psreadline).unwrap();
        std::fs::write(
            psreadline.join("ConsoleHost_history.txt"),
            "Get-Process\nwhoami\n\nGet-Process\nnet user admin /add\n",
        )
        .unwrap();

        let ctx = ScanContext::rooted_at(&root);
        let events = PowerShellHistoryExtractor::new(&ctx).extract().unwrap();
        // Distinct commands only; blank line and the repeat are dropped
        assert_eq!(events.len(), 3);
        let subjects: Vec<_> = events.iter().map(|e| e.subject.as_str()).collect();
        assert_eq!(subjects, vec!["Get-Process", "whoami", "net user admin /add"]);
        assert!(events.iter().all(|e| e.precision == Precision::Container));
        // All share the file's mtime
        assert!(events.iter().all(|e| e.timestamp == events[0].timestamp));

        std::fs::remove_dir_all(&root).ok();
    }

    #[test]
    fn test_powershell_history_absent_is_empty() {
        let root = std::env::temp_dir().join(format!("tf-test-psh-abs-{}", std::process::id()));
        let ctx = ScanContext::rooted_at(&root);
        assert!(PowerShellHistoryExtractor::new(&ctx)
            .extract()
            .unwrap()
            .is_empty());
    }
}
