//! Browser activity extractors: Chrome, Edge and Firefox history stores.
//!
//! All three keep history in SQLite. The live database may be locked by a
//! running browser, so each scan copies the file to a temporary path first
//! and reads the copy. Chromium stores (Chrome, Edge) use WebKit microseconds
//! since 1601; Firefox uses Unix microseconds. Download rows carry both a
//! start and a completion time, emitted as two distinct events sharing the
//! same subject.

use crate::datetime::{normalize, RawTimestamp, TimeEncoding};
use crate::error::ExtractorError;
use crate::extractor::{Extractor, ScanContext};
use crate::types::{ActivityEvent, ArtifactSource};
use log::debug;
use rusqlite::{Connection, OpenFlags};
use std::path::{Path, PathBuf};

const CHROMIUM_VISITS_QUERY: &str = "SELECT urls.url, urls.title, visits.visit_time \
     FROM urls INNER JOIN visits ON urls.id = visits.url";

const CHROMIUM_DOWNLOADS_QUERY: &str = "SELECT target_path, tab_url, start_time, end_time, total_bytes FROM downloads";

const FIREFOX_VISITS_QUERY: &str = "SELECT moz_places.url, moz_places.title, moz_historyvisits.visit_date \
     FROM moz_places INNER JOIN moz_historyvisits ON moz_places.id = moz_historyvisits.place_id";

/// Copy a possibly-locked database aside and open the copy read-only
fn open_copy(db_path: &Path) -> std::io::Result<(Connection, PathBuf)> {
    let nanos = std::time::SystemTime::now()
        .duration_since(std::time::UNIX_EPOCH)
        .unwrap_or_default()
        .as_nanos();
    let tmp_path = std::env::temp_dir().join(format!("tf_{}_{}.db", std::process::id(), nanos));
    std::fs::copy(db_path, &tmp_path)?;
    match Connection::open_with_flags(&tmp_path, OpenFlags::SQLITE_OPEN_READ_ONLY) {
        Ok(conn) => Ok((conn, tmp_path)),
        Err(err) => {
            let _ = std::fs::remove_file(&tmp_path);
            Err(std::io::Error::new(std::io::ErrorKind::Other, err))
        }
    }
}

/// Chromium-family history extractor, parameterized for Chrome and Edge
pub struct ChromiumHistoryExtractor {
    name: &'static str,
    subtype: &'static str,
    history_path: Option<PathBuf>,
}

impl ChromiumHistoryExtractor {
    pub fn new(name: &'static str, subtype: &'static str, history_path: Option<PathBuf>) -> Self {
        Self {
            name,
            subtype,
            history_path,
        }
    }

    pub fn chrome(ctx: &ScanContext) -> Self {
        let path = ctx.local_appdata.as_ref().map(|base| {
            base.join("Google")
                .join("Chrome")
                .join("User Data")
                .join("Default")
                .join("History")
        });
        Self::new("Chrome History", "Chrome", path)
    }

    pub fn edge(ctx: &ScanContext) -> Self {
        let path = ctx.local_appdata.as_ref().map(|base| {
            base.join("Microsoft")
                .join("Edge")
                .join("User Data")
                .join("Default")
                .join("History")
        });
        Self::new("Edge History", "Edge", path)
    }

    fn scan(&self, history_path: &Path) -> Result<Vec<ActivityEvent>, ExtractorError> {
        let (conn, tmp_path) = open_copy(history_path).map_err(|err| {
            ExtractorError::unreadable(
                self.source(),
                self.name,
                format!("{}: {}", history_path.display(), err),
            )
        })?;
        let result = self.scan_connection(&conn, history_path);
        drop(conn);
        let _ = std::fs::remove_file(&tmp_path);
        result
    }

    fn scan_connection(
        &self,
        conn: &Connection,
        history_path: &Path,
    ) -> Result<Vec<ActivityEvent>, ExtractorError> {
        let corrupted = |err: rusqlite::Error| {
            ExtractorError::corrupted(
                self.source(),
                self.name,
                format!("{}: {}", history_path.display(), err),
            )
        };
        let mut events = Vec::new();

        let mut stmt = conn.prepare(CHROMIUM_VISITS_QUERY).map_err(corrupted)?;
        let rows = stmt
            .query_map([], |row| {
                Ok((
                    row.get::<_, String>(0)?,
                    row.get::<_, Option<String>>(1)?,
                    row.get::<_, i64>(2)?,
                ))
            })
            .map_err(corrupted)?;
        let visits_origin = format!("{}#visits", history_path.display());
        for row in rows {
            let (url, title, visit_time) = row.map_err(corrupted)?;
            let Ok(norm) = normalize(TimeEncoding::WebkitMicros, RawTimestamp::Numeric(visit_time))
            else {
                debug!("{}: dropping visit with bad time {}", self.name, visit_time);
                continue;
            };
            events.push(ActivityEvent {
                source: self.source(),
                subtype: self.subtype.to_string(),
                timestamp: norm.timestamp,
                precision: norm.precision,
                subject: url,
                raw: vec![(
                    "title".to_string(),
                    title.unwrap_or_else(|| "No Title".to_string()),
                )],
                origin: visits_origin.clone(),
            });
        }

        let mut stmt = conn.prepare(CHROMIUM_DOWNLOADS_QUERY).map_err(corrupted)?;
        let rows = stmt
            .query_map([], |row| {
                Ok((
                    row.get::<_, String>(0)?,
                    row.get::<_, Option<String>>(1)?,
                    row.get::<_, i64>(2)?,
                    row.get::<_, i64>(3)?,
                    row.get::<_, i64>(4)?,
                ))
            })
            .map_err(corrupted)?;
        let downloads_origin = format!("{}#downloads", history_path.display());
        for row in rows {
            let (target_path, tab_url, start_time, end_time, total_bytes) =
                row.map_err(corrupted)?;
            let raw = vec![
                (
                    "source_url".to_string(),
                    tab_url.unwrap_or_else(|| "unknown".to_string()),
                ),
                ("total_bytes".to_string(), total_bytes.to_string()),
            ];
            // Start and completion are separate facts on the timeline
            if let Ok(norm) = normalize(TimeEncoding::WebkitMicros, RawTimestamp::Numeric(start_time))
            {
                events.push(ActivityEvent {
                    source: self.source(),
                    subtype: format!("{} Download Start", self.subtype),
                    timestamp: norm.timestamp,
                    precision: norm.precision,
                    subject: target_path.clone(),
                    raw: raw.clone(),
                    origin: downloads_origin.clone(),
                });
            }
            if let Ok(norm) = normalize(TimeEncoding::WebkitMicros, RawTimestamp::Numeric(end_time))
            {
                events.push(ActivityEvent {
                    source: self.source(),
                    subtype: format!("{} Download End", self.subtype),
                    timestamp: norm.timestamp,
                    precision: norm.precision,
                    subject: target_path,
                    raw,
                    origin: downloads_origin.clone(),
                });
            }
        }

        Ok(events)
    }
}

impl Extractor for ChromiumHistoryExtractor {
    fn source(&self) -> ArtifactSource {
        ArtifactSource::BrowserActivity
    }

    fn name(&self) -> &'static str {
        self.name
    }

    fn extract(&self) -> Result<Vec<ActivityEvent>, ExtractorError> {
        match &self.history_path {
            Some(path) if path.exists() => self.scan(path),
            // Browser not installed
            _ => Ok(Vec::new()),
        }
    }
}

/// Firefox places.sqlite extractor; reads the first default profile
pub struct FirefoxHistoryExtractor {
    profiles_dir: Option<PathBuf>,
}

impl FirefoxHistoryExtractor {
    pub fn new(ctx: &ScanContext) -> Self {
        Self {
            profiles_dir: ctx
                .appdata
                .as_ref()
                .map(|appdata| appdata.join("Mozilla").join("Firefox").join("Profiles")),
        }
    }

    /// Locate the first default profile's places.sqlite. No Profiles
    /// directory means Firefox is not installed; a Profiles directory that
    /// cannot be listed is an unreadable store.
    fn find_places_db(&self) -> Result<Option<PathBuf>, ExtractorError> {
        let Some(profiles_dir) = &self.profiles_dir else {
            return Ok(None);
        };
        let entries = match std::fs::read_dir(profiles_dir) {
            Ok(entries) => entries,
            Err(err) if err.kind() == std::io::ErrorKind::NotFound => return Ok(None),
            Err(err) => {
                return Err(ExtractorError::unreadable(
                    ArtifactSource::BrowserActivity,
                    "Firefox History",
                    format!("{}: {}", profiles_dir.display(), err),
                ))
            }
        };
        for entry in entries.flatten() {
            let name = entry.file_name();
            let name = name.to_string_lossy();
            if name.contains(".default") {
                let places = entry.path().join("places.sqlite");
                if places.exists() {
                    return Ok(Some(places));
                }
            }
        }
        Ok(None)
    }
}

impl Extractor for FirefoxHistoryExtractor {
    fn source(&self) -> ArtifactSource {
        ArtifactSource::BrowserActivity
    }

    fn name(&self) -> &'static str {
        "Firefox History"
    }

    fn extract(&self) -> Result<Vec<ActivityEvent>, ExtractorError> {
        let Some(places) = self.find_places_db()? else {
            return Ok(Vec::new());
        };
        let (conn, tmp_path) = open_copy(&places).map_err(|err| {
            ExtractorError::unreadable(
                self.source(),
                self.name(),
                format!("{}: {}", places.display(), err),
            )
        })?;
        let corrupted = |err: rusqlite::Error| {
            ExtractorError::corrupted(
                self.source(),
                self.name(),
                format!("{}: {}", places.display(), err),
            )
        };

        let result = (|| {
            let mut events = Vec::new();
            let mut stmt = conn.prepare(FIREFOX_VISITS_QUERY).map_err(corrupted)?;
            let rows = stmt
                .query_map([], |row| {
                    Ok((
                        row.get::<_, String>(0)?,
                        row.get::<_, Option<String>>(1)?,
                        row.get::<_, i64>(2)?,
                    ))
                })
                .map_err(corrupted)?;
            let origin = format!("{}#moz_historyvisits", places.display());
            for row in rows {
                let (url, title, visit_date) = row.map_err(corrupted)?;
                let Ok(norm) =
                    normalize(TimeEncoding::UnixMicros, RawTimestamp::Numeric(visit_date))
                else {
                    debug!("Firefox: dropping visit with bad time {}", visit_date);
                    continue;
                };
                events.push(ActivityEvent {
                    source: self.source(),
                    subtype: "Firefox".to_string(),
                    timestamp: norm.timestamp,
                    precision: norm.precision,
                    subject: url,
                    raw: vec![(
                        "title".to_string(),
                        title.unwrap_or_else(|| "No Title".to_string()),
                    )],
                    origin: origin.clone(),
                });
            }
            Ok(events)
        })();

        drop(conn);
        let _ = std::fs::remove_file(&tmp_path);
        result
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{DateTime, Datelike};

    const EPOCH_1601_TO_UNIX_SECS: i64 = 11_644_473_600;

    fn webkit_micros(unix_secs: i64) -> i64 {
        (unix_secs + EPOCH_1601_TO_UNIX_SECS) * 1_000_000
    }

    fn chromium_fixture(dir: &Path) -> PathBuf {
        std::fs::create_dir_all(dir).unwrap();
        let db_path = dir.join("History");
        let conn = Connection::open(&db_path).unwrap();
        conn.execute_batch(
            "CREATE TABLE urls (id INTEGER PRIMARY KEY, url TEXT, title TEXT, visit_count INTEGER);
             CREATE TABLE visits (id INTEGER PRIMARY KEY, url INTEGER, visit_time INTEGER);
             CREATE TABLE downloads (id INTEGER PRIMARY KEY, target_path TEXT, tab_url TEXT,
                                     start_time INTEGER, end_time INTEGER, total_bytes INTEGER);",
        )
        .unwrap();
        conn.execute(
            "INSERT INTO urls (id, url, title, visit_count) VALUES (1, 'https://example.com/', 'Example', 3)",
            [],
        )
        .unwrap();
        conn.execute(
            "INSERT INTO visits (url, visit_time) VALUES (1, ?1)",
            [webkit_micros(1_704_100_000)],
        )
        .unwrap();
        conn.execute(
            "INSERT INTO downloads (target_path, tab_url, start_time, end_time, total_bytes) \
             VALUES ('C:\\Users\\test\\payload.zip', 'https://example.com/payload.zip', ?1, ?2, 4096)",
            [webkit_micros(1_704_100_100), webkit_micros(1_704_100_160)],
        )
        .unwrap();
        db_path
    }

    #[test]
    fn test_chromium_visits_and_downloads() {
        let dir = std::env::temp_dir().join(format!("tf-test-chrome-{}", std::process::id()));
        let db_path = chromium_fixture(&dir);

        let extractor = ChromiumHistoryExtractor::new("Chrome History", "Chrome", Some(db_path));
        let events = extractor.extract().unwrap();

        // One visit plus download start and end
        assert_eq!(events.len(), 3);
        let visit = events.iter().find(|e| e.subtype == "Chrome").unwrap();
        assert_eq!(visit.subject, "https://example.com/");
        assert_eq!(visit.timestamp, DateTime::from_timestamp(1_704_100_000, 0).unwrap());
        assert_eq!(visit.timestamp.year(), 2024);
        assert!(visit.origin.ends_with("#visits"));

        let start = events
            .iter()
            .find(|e| e.subtype == "Chrome Download Start")
            .unwrap();
        let end = events
            .iter()
            .find(|e| e.subtype == "Chrome Download End")
            .unwrap();
        // Both download events share the subject
        assert_eq!(start.subject, end.subject);
        assert_eq!(start.subject, "C:\\Users\\test\\payload.zip");
        assert!(start.timestamp < end.timestamp);

        std::fs::remove_dir_all(&dir).ok();
    }

    #[test]
    fn test_browser_absent_is_empty_not_error() {
        let missing = std::env::temp_dir().join("tf-test-no-such-browser").join("History");
        let extractor = ChromiumHistoryExtractor::new("Edge History", "Edge", Some(missing));
        assert!(extractor.extract().unwrap().is_empty());
        let extractor = ChromiumHistoryExtractor::new("Edge History", "Edge", None);
        assert!(extractor.extract().unwrap().is_empty());

        // Firefox with no Profiles directory at all is equally routine
        let root = std::env::temp_dir().join("tf-test-no-such-firefox");
        let ctx = ScanContext::rooted_at(&root);
        assert!(FirefoxHistoryExtractor::new(&ctx).extract().unwrap().is_empty());
    }

    #[test]
    fn test_chromium_missing_schema_is_corrupted() {
        let dir = std::env::temp_dir().join(format!("tf-test-chrome-bad-{}", std::process::id()));
        std::fs::create_dir_all(&dir).unwrap();
        let db_path = dir.join("History");
        let conn = Connection::open(&db_path).unwrap();
        conn.execute_batch("CREATE TABLE unrelated (x INTEGER);").unwrap();
        drop(conn);

        let extractor = ChromiumHistoryExtractor::new("Chrome History", "Chrome", Some(db_path));
        let err = extractor.extract().unwrap_err();
        assert_eq!(err.kind, crate::error::ExtractorErrorKind::Corrupted);

        std::fs::remove_dir_all(&dir).ok();
    }

    #[test]
    fn test_firefox_unlistable_profiles_dir_is_unreadable() {
        let root = std::env::temp_dir().join(format!("tf-test-ffx-bad-{}", std::process::id()));
        let firefox = root
            .join("AppData")
            .join("Roaming")
            .join("Mozilla")
            .join("Firefox");
        std::fs::create_dir_all(&firefox).unwrap();
        // Profiles exists but cannot be enumerated as a directory
        std::fs::write(firefox.join("Profiles"), b"not a directory").unwrap();

        let ctx = ScanContext::rooted_at(&root);
        let err = FirefoxHistoryExtractor::new(&ctx).extract().unwrap_err();
        assert_eq!(err.kind, crate::error::ExtractorErrorKind::Unreadable);
        assert_eq!(err.source, ArtifactSource::BrowserActivity);

        std::fs::remove_dir_all(&root).ok();
    }

    #[test]
    fn test_firefox_profile_scan() {
        let root = std::env::temp_dir().join(format!("tf-test-ffx-{}", std::process::id()));
        let profile = root
            .join("AppData")
            .join("Roaming")
            .join("Mozilla")
            .join("Firefox")
            .join("Profiles")
            .join("abcd1234.default-release");
        std::fs::create_dir_all(&profile).unwrap();
        let conn = Connection::open(profile.join("places.sqlite")).unwrap();
        conn.execute_batch(
            "CREATE TABLE moz_places (id INTEGER PRIMARY KEY, url TEXT, title TEXT, visit_count INTEGER);
             CREATE TABLE moz_historyvisits (id INTEGER PRIMARY KEY, place_id INTEGER, visit_date INTEGER);",
        )
        .unwrap();
        conn.execute(
            "INSERT INTO moz_places (id, url, title, visit_count) VALUES (1, 'https://mozilla.org/', NULL, 1)",
            [],
        )
        .unwrap();
        conn.execute(
            "INSERT INTO moz_historyvisits (place_id, visit_date) VALUES (1, ?1)",
            [1_704_100_000i64 * 1_000_000],
        )
        .unwrap();
        drop(conn);

        let ctx = ScanContext::rooted_at(&root);
        let events = FirefoxHistoryExtractor::new(&ctx).extract().unwrap();
        assert_eq!(events.len(), 1);
        assert_eq!(events[0].subject, "https://mozilla.org/");
        assert_eq!(events[0].raw[0].1, "No Title");
        assert_eq!(
            events[0].timestamp,
            DateTime::from_timestamp(1_704_100_000, 0).unwrap()
        );

        std::fs::remove_dir_all(&root).ok();
    }
}
