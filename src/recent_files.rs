//! Recently-used file extractors: the Recent folder and RecentDocs.
//!
//! The Recent folder holds one shell link per opened document; its file
//! timestamps track the access. RecentDocs mirrors the same activity in the
//! registry as UTF-16 value blobs, timestamped only by the owning key's
//! last-write time.

use crate::datetime::system_time_to_utc;
use crate::error::ExtractorError;
use crate::extractor::{Extractor, ScanContext};
use crate::registry::{self, parse_utf16_string, RegistryReadError, RegistryRoot};
use crate::types::{ActivityEvent, ArtifactSource, Precision};
use byteorder::{ByteOrder, LittleEndian};
use log::debug;
use std::path::PathBuf;

const RECENTDOCS_KEY: &str = r"Software\Microsoft\Windows\CurrentVersion\Explorer\RecentDocs";

/// Shell link header flags
const HAS_LINK_TARGET_ID_LIST: u32 = 0x01;
const HAS_LINK_INFO: u32 = 0x02;

/// LinkInfo flag: VolumeIDAndLocalBasePath
const LINK_INFO_LOCAL_BASE_PATH: u32 = 0x01;

/// Extract the local target path from a Windows shell link (.lnk).
///
/// Walks the fixed 76-byte header, skips the optional target ID list, and
/// reads LocalBasePath + CommonPathSuffix out of the LinkInfo structure.
/// Returns `None` for anything that is not a well-formed link with a local
/// target.
pub fn lnk_target(data: &[u8]) -> Option<String> {
    if data.len() < 76 || data[0] != 0x4C || data[1] != 0 || data[2] != 0 || data[3] != 0 {
        return None;
    }
    let flags = LittleEndian::read_u32(&data[20..24]);
    let mut pos = 76usize;

    if flags & HAS_LINK_TARGET_ID_LIST != 0 {
        if pos + 2 > data.len() {
            return None;
        }
        let id_list_size = LittleEndian::read_u16(&data[pos..pos + 2]) as usize;
        pos += 2 + id_list_size;
    }

    if flags & HAS_LINK_INFO == 0 || pos + 28 > data.len() {
        return None;
    }
    let link_info_size = LittleEndian::read_u32(&data[pos..pos + 4]) as usize;
    if link_info_size < 28 || pos + link_info_size > data.len() {
        return None;
    }
    let link_info_flags = LittleEndian::read_u32(&data[pos + 8..pos + 12]);
    if link_info_flags & LINK_INFO_LOCAL_BASE_PATH == 0 {
        return None;
    }
    let local_base_path_offset = LittleEndian::read_u32(&data[pos + 16..pos + 20]) as usize;
    let common_path_suffix_offset = LittleEndian::read_u32(&data[pos + 24..pos + 28]) as usize;

    let base = ansi_cstring(data, pos + local_base_path_offset)?;
    let suffix = ansi_cstring(data, pos + common_path_suffix_offset).unwrap_or_default();
    let target = format!("{}{}", base, suffix);
    if target.len() > 2 {
        Some(target)
    } else {
        None
    }
}

/// NUL-terminated single-byte string at `offset`
fn ansi_cstring(data: &[u8], offset: usize) -> Option<String> {
    if offset >= data.len() {
        return None;
    }
    let tail = &data[offset..];
    let end = tail.iter().position(|&b| b == 0).unwrap_or(tail.len());
    if end == 0 {
        return None;
    }
    Some(String::from_utf8_lossy(&tail[..end]).into_owned())
}

/// Scans `%APPDATA%\Microsoft\Windows\Recent` for shell links
pub struct RecentFolderExtractor {
    recent_dir: Option<PathBuf>,
}

impl RecentFolderExtractor {
    pub fn new(ctx: &ScanContext) -> Self {
        Self {
            recent_dir: ctx
                .appdata
                .as_ref()
                .map(|appdata| appdata.join("Microsoft").join("Windows").join("Recent")),
        }
    }
}

impl Extractor for RecentFolderExtractor {
    fn source(&self) -> ArtifactSource {
        ArtifactSource::RecentFiles
    }

    fn name(&self) -> &'static str {
        "Recent Folder"
    }

    fn extract(&self) -> Result<Vec<ActivityEvent>, ExtractorError> {
        let Some(recent_dir) = &self.recent_dir else {
            return Ok(Vec::new());
        };
        // A missing folder is routine; anything else wrong with listing it
        // (permissions, not a directory) is an unreadable store.
        let entries = match std::fs::read_dir(recent_dir) {
            Ok(entries) => entries,
            Err(err) if err.kind() == std::io::ErrorKind::NotFound => return Ok(Vec::new()),
            Err(err) => {
                return Err(ExtractorError::unreadable(
                    self.source(),
                    self.name(),
                    format!("{}: {}", recent_dir.display(), err),
                ))
            }
        };

        let mut events = Vec::new();
        for entry in entries.flatten() {
            let path = entry.path();
            let is_lnk = path
                .extension()
                .and_then(|e| e.to_str())
                .is_some_and(|e| e.eq_ignore_ascii_case("lnk"));
            if !is_lnk {
                continue;
            }
            let Ok(metadata) = entry.metadata() else {
                continue;
            };
            // Last access is whichever of mtime/ctime is newer; ctime is not
            // available on every filesystem.
            let modified = metadata.modified().ok();
            let created = metadata.created().ok();
            let Some(last_accessed) = modified.into_iter().chain(created).max() else {
                continue;
            };
            let Ok(normalized) = system_time_to_utc(last_accessed) else {
                debug!("Recent folder: dropping {} (bad timestamps)", path.display());
                continue;
            };

            let target = std::fs::read(&path)
                .ok()
                .and_then(|data| lnk_target(&data))
                .unwrap_or_else(|| "unresolved".to_string());
            let name = path
                .file_name()
                .and_then(|n| n.to_str())
                .unwrap_or_default()
                .to_string();
            events.push(ActivityEvent {
                source: self.source(),
                subtype: "Recent Folder".to_string(),
                timestamp: normalized.timestamp,
                precision: normalized.precision,
                subject: name,
                raw: vec![("target".to_string(), target)],
                origin: path.display().to_string(),
            });
        }
        Ok(events)
    }
}

/// RecentDocs registry extractor: one event per retained document reference,
/// timestamped by the owning extension subkey's last-write time.
pub struct RecentDocsExtractor;

impl Extractor for RecentDocsExtractor {
    fn source(&self) -> ArtifactSource {
        ArtifactSource::RecentFiles
    }

    fn name(&self) -> &'static str {
        "RecentDocs"
    }

    fn extract(&self) -> Result<Vec<ActivityEvent>, ExtractorError> {
        let root = match registry::read_key(RegistryRoot::CurrentUser, RECENTDOCS_KEY) {
            Ok(key) => key,
            Err(RegistryReadError::Absent) => return Ok(Vec::new()),
            Err(RegistryReadError::Unreadable(detail)) => {
                return Err(ExtractorError::unreadable(self.source(), self.name(), detail))
            }
        };

        let mut events = Vec::new();
        for extension in &root.subkeys {
            let subkey_path = format!("{}\\{}", RECENTDOCS_KEY, extension);
            let key = match registry::read_key(RegistryRoot::CurrentUser, &subkey_path) {
                Ok(key) => key,
                Err(_) => {
                    debug!("RecentDocs: skipping unreadable subkey {}", extension);
                    continue;
                }
            };
            let Some(timestamp) = key.last_write.or(root.last_write) else {
                continue;
            };
            for value in &key.values {
                if value.name == "MRUListEx" {
                    continue;
                }
                let Some(filename) = parse_utf16_string(&value.data) else {
                    continue;
                };
                events.push(ActivityEvent {
                    source: self.source(),
                    subtype: "RecentDocs".to_string(),
                    timestamp,
                    precision: Precision::Container,
                    subject: filename,
                    raw: vec![("extension".to_string(), format!(".{}", extension))],
                    origin: key.path.clone(),
                });
            }
        }
        Ok(events)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    /// Minimal shell link: header + LinkInfo with a local base path
    fn build_lnk(base: &str, suffix: &str, with_id_list: bool) -> Vec<u8> {
        let mut data = vec![0u8; 76];
        data[0] = 0x4C;
        let mut flags = HAS_LINK_INFO;
        if with_id_list {
            flags |= HAS_LINK_TARGET_ID_LIST;
        }
        LittleEndian::write_u32(&mut data[20..24], flags);

        if with_id_list {
            // 4-byte ID list after the 2-byte size field
            data.extend_from_slice(&[4u8, 0]);
            data.extend_from_slice(&[0u8; 4]);
        }

        let base_offset = 28usize;
        let suffix_offset = base_offset + base.len() + 1;
        let li_size = suffix_offset + suffix.len() + 1;
        let mut link_info = vec![0u8; li_size];
        LittleEndian::write_u32(&mut link_info[0..4], li_size as u32);
        LittleEndian::write_u32(&mut link_info[4..8], 28);
        LittleEndian::write_u32(&mut link_info[8..12], LINK_INFO_LOCAL_BASE_PATH);
        LittleEndian::write_u32(&mut link_info[16..20], base_offset as u32);
        LittleEndian::write_u32(&mut link_info[24..28], suffix_offset as u32);
        link_info[base_offset..base_offset + base.len()].copy_from_slice(base.as_bytes());
        link_info[suffix_offset..suffix_offset + suffix.len()].copy_from_slice(suffix.as_bytes());
        data.extend_from_slice(&link_info);
        data
    }

    #[test]
    fn test_lnk_target_local_path() {
        let data = build_lnk("C:\\Users\\test\\Documents", "\\report.docx", false);
        assert_eq!(
            lnk_target(&data),
            Some("C:\\Users\\test\\Documents\\report.docx".to_string())
        );
    }

    #[test]
    fn test_lnk_target_skips_id_list() {
        let data = build_lnk("D:\\evidence.txt", "", true);
        assert_eq!(lnk_target(&data), Some("D:\\evidence.txt".to_string()));
    }

    #[test]
    fn test_lnk_target_rejects_invalid() {
        assert!(lnk_target(&[]).is_none());
        assert!(lnk_target(&[0u8; 80]).is_none()); // wrong magic
        let mut no_info = vec![0u8; 76];
        no_info[0] = 0x4C;
        assert!(lnk_target(&no_info).is_none()); // no LinkInfo
    }

    #[test]
    fn test_recent_folder_fixture_scan() {
        let root = std::env::temp_dir().join(format!("tf-test-recent-{}", std::process::id()));
        let recent = root
            .join("AppData")
            .join("Roaming")
            .join("Microsoft")
            .join("Windows")
            .join("Recent");
        std::fs::create_dir_all(&recent).unwrap();
        let lnk = build_lnk("C:\\notes.txt", "", false);
        std::fs::write(recent.join("notes.txt.lnk"), &lnk).unwrap();
        std::fs::write(recent.join("desktop.ini"), b"[x]").unwrap();

        let ctx = ScanContext::rooted_at(&root);
        let events = RecentFolderExtractor::new(&ctx).extract().unwrap();
        assert_eq!(events.len(), 1);
        assert_eq!(events[0].subject, "notes.txt.lnk");
        assert_eq!(
            events[0].raw,
            vec![("target".to_string(), "C:\\notes.txt".to_string())]
        );

        std::fs::remove_dir_all(&root).ok();
    }

    #[test]
    fn test_recent_folder_absent_is_empty() {
        let root = std::env::temp_dir().join(format!("tf-test-recent-abs-{}", std::process::id()));
        let ctx = ScanContext::rooted_at(&root);
        assert!(RecentFolderExtractor::new(&ctx).extract().unwrap().is_empty());

        // No APPDATA resolved at all behaves the same way
        let extractor = RecentFolderExtractor { recent_dir: None };
        assert!(extractor.extract().unwrap().is_empty());
    }

    #[test]
    fn test_recent_folder_unlistable_is_unreadable() {
        let root = std::env::temp_dir().join(format!("tf-test-recent-bad-{}", std::process::id()));
        let windows = root.join("AppData").join("Roaming").join("Microsoft").join("Windows");
        std::fs::create_dir_all(&windows).unwrap();
        // Recent exists but cannot be enumerated as a directory
        std::fs::write(windows.join("Recent"), b"not a directory").unwrap();

        let ctx = ScanContext::rooted_at(&root);
        let err = RecentFolderExtractor::new(&ctx).extract().unwrap_err();
        assert_eq!(err.kind, crate::error::ExtractorErrorKind::Unreadable);

        std::fs::remove_dir_all(&root).ok();
    }
}
