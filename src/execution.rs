//! Execution evidence extractors: UserAssist run history and Prefetch.
//!
//! Both record "this program last ran at T", with very different encodings:
//! UserAssist keeps ROT13-encoded program names with a binary counter blob
//! per program under HKCU, while Prefetch is a directory of per-executable
//! `.pf` files whose modification time tracks the last launch.

use crate::datetime::{filetime_to_utc, system_time_to_utc};
use crate::error::ExtractorError;
use crate::extractor::{Extractor, ScanContext};
use crate::registry::{self, RegistryReadError, RegistryRoot};
use crate::types::{ActivityEvent, ArtifactSource, Precision};
use byteorder::{ByteOrder, LittleEndian};
use chrono::{DateTime, Utc};
use log::debug;
use std::path::PathBuf;

/// UserAssist GUID subkeys present on Windows 10/11: executable launches and
/// shortcut launches respectively.
const USERASSIST_GUIDS: [&str; 2] = [
    "{CEBFF5CD-ACE2-4F4F-9178-9926F41749EA}",
    "{F4E57C4B-2036-45F0-A9AB-443BCFE33D9F}",
];

const USERASSIST_BASE: &str = r"Software\Microsoft\Windows\CurrentVersion\Explorer\UserAssist";

/// Decoded UserAssist counter entry
#[derive(Debug, Clone, PartialEq)]
pub struct UserAssistEntry {
    /// ROT13-decoded program identifier
    pub program: String,
    pub run_count: u32,
    pub focus_time_ms: u32,
    pub last_run: DateTime<Utc>,
}

/// ROT13-decode a UserAssist value name
pub fn rot13(input: &str) -> String {
    input
        .chars()
        .map(|c| match c {
            'a'..='z' => (((c as u8 - b'a' + 13) % 26) + b'a') as char,
            'A'..='Z' => (((c as u8 - b'A' + 13) % 26) + b'A') as char,
            other => other,
        })
        .collect()
}

/// Decode one UserAssist counter blob.
///
/// Layout (Win7+): run count at offset 4, focus time at 8, last-run FILETIME
/// at 60; blobs shorter than 72 bytes are not counter entries. Entries with
/// no recorded run time are dropped.
pub fn decode_userassist_entry(value_name: &str, payload: &[u8]) -> Option<UserAssistEntry> {
    if payload.len() < 72 {
        return None;
    }
    let run_count = LittleEndian::read_u32(&payload[4..8]);
    let focus_time_ms = LittleEndian::read_u32(&payload[8..12]);
    let filetime = LittleEndian::read_u64(&payload[60..68]);
    let last_run = filetime_to_utc(filetime).ok()?.timestamp;
    Some(UserAssistEntry {
        program: rot13(value_name),
        run_count,
        focus_time_ms,
        last_run,
    })
}

/// UserAssist registry extractor
pub struct UserAssistExtractor;

impl Extractor for UserAssistExtractor {
    fn source(&self) -> ArtifactSource {
        ArtifactSource::ExecutionEvidence
    }

    fn name(&self) -> &'static str {
        "UserAssist"
    }

    fn extract(&self) -> Result<Vec<ActivityEvent>, ExtractorError> {
        let mut events = Vec::new();
        for guid in USERASSIST_GUIDS {
            let key_path = format!("{}\\{}\\Count", USERASSIST_BASE, guid);
            let key = match registry::read_key(RegistryRoot::CurrentUser, &key_path) {
                Ok(key) => key,
                Err(RegistryReadError::Absent) => continue,
                Err(RegistryReadError::Unreadable(detail)) => {
                    return Err(ExtractorError::unreadable(self.source(), self.name(), detail))
                }
            };
            for value in &key.values {
                let Some(entry) = decode_userassist_entry(&value.name, &value.data) else {
                    debug!("UserAssist: dropping undecodable entry '{}'", value.name);
                    continue;
                };
                events.push(ActivityEvent {
                    source: self.source(),
                    subtype: "UserAssist".to_string(),
                    timestamp: entry.last_run,
                    precision: Precision::Millisecond,
                    subject: entry.program,
                    raw: vec![
                        ("run_count".to_string(), entry.run_count.to_string()),
                        ("focus_time_ms".to_string(), entry.focus_time_ms.to_string()),
                    ],
                    origin: key.path.clone(),
                });
            }
        }
        Ok(events)
    }
}

/// Strip the trailing `-HASH` segment of a prefetch file stem and uppercase
/// the executable name, e.g. `CMD.EXE-0BD30981` -> `CMD.EXE`.
pub fn executable_from_prefetch_stem(stem: &str) -> String {
    match stem.rsplit_once('-') {
        Some((name, _hash)) => name.to_uppercase(),
        None => stem.to_uppercase(),
    }
}

/// Prefetch directory extractor. The `.pf` file's modification time tracks
/// the most recent launch of its executable.
pub struct PrefetchExtractor {
    prefetch_dir: PathBuf,
}

impl PrefetchExtractor {
    pub fn new(ctx: &ScanContext) -> Self {
        Self {
            prefetch_dir: ctx.system_root.join("Prefetch"),
        }
    }
}

impl Extractor for PrefetchExtractor {
    fn source(&self) -> ArtifactSource {
        ArtifactSource::ExecutionEvidence
    }

    fn name(&self) -> &'static str {
        "Prefetch"
    }

    fn extract(&self) -> Result<Vec<ActivityEvent>, ExtractorError> {
        let entries = match std::fs::read_dir(&self.prefetch_dir) {
            Ok(entries) => entries,
            Err(err) if err.kind() == std::io::ErrorKind::NotFound => return Ok(Vec::new()),
            Err(err) => {
                return Err(ExtractorError::unreadable(
                    self.source(),
                    self.name(),
                    format!("{}: {}", self.prefetch_dir.display(), err),
                ))
            }
        };

        let mut events = Vec::new();
        for entry in entries.flatten() {
            let path = entry.path();
            let is_pf = path
                .extension()
                .and_then(|e| e.to_str())
                .is_some_and(|e| e.eq_ignore_ascii_case("pf"));
            if !is_pf {
                continue;
            }
            let Ok(metadata) = entry.metadata() else {
                continue;
            };
            let Ok(modified) = metadata.modified() else {
                continue;
            };
            let Ok(normalized) = system_time_to_utc(modified) else {
                debug!("Prefetch: dropping {} (bad mtime)", path.display());
                continue;
            };
            let stem = path
                .file_stem()
                .and_then(|s| s.to_str())
                .unwrap_or_default();
            events.push(ActivityEvent {
                source: self.source(),
                subtype: "Prefetch".to_string(),
                timestamp: normalized.timestamp,
                precision: normalized.precision,
                subject: executable_from_prefetch_stem(stem),
                raw: vec![("file".to_string(), path.display().to_string())],
                origin: path.display().to_string(),
            });
        }
        Ok(events)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Datelike;

    fn userassist_payload(run_count: u32, focus_ms: u32, filetime: u64) -> Vec<u8> {
        let mut payload = vec![0u8; 72];
        LittleEndian::write_u32(&mut payload[4..8], run_count);
        LittleEndian::write_u32(&mut payload[8..12], focus_ms);
        LittleEndian::write_u64(&mut payload[60..68], filetime);
        payload
    }

    #[test]
    fn test_rot13() {
        assert_eq!(rot13("HRZR_PGYFRFFVBA"), "UEME_CTLSESSION");
        assert_eq!(rot13("abc.rkr"), "nop.exe");
        // Digits and punctuation pass through
        assert_eq!(rot13("P:\\Jvaqbjf\\1.rkr"), "C:\\Windows\\1.exe");
    }

    #[test]
    fn test_decode_userassist_entry() {
        // 2000-01-01 00:00:00 UTC
        let payload = userassist_payload(7, 1234, 125_911_584_000_000_000);
        let entry = decode_userassist_entry("pzq.rkr", &payload).unwrap();
        assert_eq!(entry.program, "cmd.exe");
        assert_eq!(entry.run_count, 7);
        assert_eq!(entry.focus_time_ms, 1234);
        assert_eq!(entry.last_run.year(), 2000);
    }

    #[test]
    fn test_decode_userassist_rejects_short_and_zero_time() {
        assert!(decode_userassist_entry("x", &[0u8; 16]).is_none());
        // Zero FILETIME means "never run" and must be dropped, not defaulted
        let payload = userassist_payload(1, 0, 0);
        assert!(decode_userassist_entry("x", &payload).is_none());
    }

    #[test]
    fn test_executable_from_prefetch_stem() {
        assert_eq!(executable_from_prefetch_stem("CMD.EXE-0BD30981"), "CMD.EXE");
        assert_eq!(
            executable_from_prefetch_stem("svchost.exe-135A30D8"),
            "SVCHOST.EXE"
        );
        assert_eq!(executable_from_prefetch_stem("NOTEPAD"), "NOTEPAD");
    }

    #[test]
    fn test_prefetch_absent_dir_is_empty_not_error() {
        let root = std::env::temp_dir().join(format!("tf-test-pf-{}", std::process::id()));
        let ctx = ScanContext::rooted_at(&root);
        let extractor = PrefetchExtractor::new(&ctx);
        assert!(extractor.extract().unwrap().is_empty());
    }

    #[test]
    fn test_prefetch_scans_fixture_dir() {
        let root = std::env::temp_dir().join(format!("tf-test-pf-fix-{}", std::process::id()));
        let prefetch = root.join("Windows").join("Prefetch");
        std::fs::create_dir_all(&prefetch).unwrap();
        std::fs::write(prefetch.join("CMD.EXE-0BD30981.pf"), b"MAM\x04").unwrap();
        std::fs::write(prefetch.join("readme.txt"), b"not prefetch").unwrap();

        let ctx = ScanContext::rooted_at(&root);
        let events = PrefetchExtractor::new(&ctx).extract().unwrap();
        assert_eq!(events.len(), 1);
        assert_eq!(events[0].subject, "CMD.EXE");
        assert_eq!(events[0].subtype, "Prefetch");
        assert!(events[0].origin.ends_with("CMD.EXE-0BD30981.pf"));

        std::fs::remove_dir_all(&root).ok();
    }
}
