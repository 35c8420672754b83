//! Explorer address-bar history extractor: the TypedPaths key.
//!
//! Values `url1..urlN` hold paths the user typed into the Explorer address
//! bar. The key records only one last-write time for the whole list, so every
//! entry carries container precision.

use crate::error::ExtractorError;
use crate::extractor::Extractor;
use crate::registry::{self, parse_utf16_string, RegistryKey, RegistryReadError, RegistryRoot};
use crate::types::{ActivityEvent, ArtifactSource, Precision};

const TYPED_PATHS_KEY: &str = r"Software\Microsoft\Windows\CurrentVersion\Explorer\TypedPaths";

/// Map a TypedPaths key snapshot to events. A key with no last-write time
/// yields nothing; undecodable values are skipped.
fn events_from_key(key: &RegistryKey) -> Vec<ActivityEvent> {
    let Some(timestamp) = key.last_write else {
        return Vec::new();
    };
    let mut events = Vec::new();
    for value in &key.values {
        let Some(path) = parse_utf16_string(&value.data) else {
            continue;
        };
        events.push(ActivityEvent {
            source: ArtifactSource::TypedPaths,
            subtype: "TypedPaths".to_string(),
            timestamp,
            precision: Precision::Container,
            subject: path,
            raw: vec![("entry".to_string(), value.name.clone())],
            origin: key.path.clone(),
        });
    }
    events
}

pub struct TypedPathsExtractor;

impl Extractor for TypedPathsExtractor {
    fn source(&self) -> ArtifactSource {
        ArtifactSource::TypedPaths
    }

    fn name(&self) -> &'static str {
        "TypedPaths"
    }

    fn extract(&self) -> Result<Vec<ActivityEvent>, ExtractorError> {
        let key = match registry::read_key(RegistryRoot::CurrentUser, TYPED_PATHS_KEY) {
            Ok(key) => key,
            Err(RegistryReadError::Absent) => return Ok(Vec::new()),
            Err(RegistryReadError::Unreadable(detail)) => {
                return Err(ExtractorError::unreadable(self.source(), self.name(), detail))
            }
        };
        Ok(events_from_key(&key))
    }
}
