//! Correlation: merge extractor output into one windowed, deduplicated,
//! chronologically ordered timeline.
//!
//! Extractors run as independent parallel tasks over disjoint read-only
//! stores; this module is the single join point. A failing extractor
//! contributes a recorded error and zero events, never blocks the others,
//! so "no evidence found" and "could not check" stay distinguishable.

use crate::error::ExtractorError;
use crate::extractor::Extractor;
use crate::types::{ActivityEvent, ArtifactSource};
use crate::window::TimeWindow;
use log::{info, warn};
use rayon::prelude::*;
use serde::Serialize;
use std::collections::{BTreeMap, HashSet};

/// The final product of one triage run: in-window events sorted ascending by
/// `(timestamp, source, origin)`, per-source match counts, and per-source
/// errors. Read-only after construction.
#[derive(Debug, Clone, Serialize)]
pub struct Timeline {
    pub window: TimeWindow,
    pub events: Vec<ActivityEvent>,
    pub counts: BTreeMap<ArtifactSource, usize>,
    pub errors: Vec<ExtractorError>,
}

impl Timeline {
    pub fn total_events(&self) -> usize {
        self.events.len()
    }
}

/// Run every extractor, admit events inside the closed window, de-duplicate,
/// and sort.
///
/// Duplicates (two passes recording the same fact) are events equal on
/// `(source, subtype, origin, timestamp, subject)`; the first is retained.
pub fn correlate(extractors: &[Box<dyn Extractor>], window: &TimeWindow) -> Timeline {
    // Counts start at zero for every enabled source so "checked, nothing
    // found" shows up in the report.
    let mut counts: BTreeMap<ArtifactSource, usize> = BTreeMap::new();
    for extractor in extractors {
        counts.entry(extractor.source()).or_insert(0);
    }

    // Independent read-only scans over disjoint stores; join-only aggregation
    let results: Vec<(&'static str, Result<Vec<ActivityEvent>, ExtractorError>)> = extractors
        .par_iter()
        .map(|extractor| (extractor.name(), extractor.extract()))
        .collect();

    let mut errors = Vec::new();
    let mut seen = HashSet::new();
    let mut events = Vec::new();
    for (name, result) in results {
        let extracted = match result {
            Ok(extracted) => extracted,
            Err(err) => {
                warn!("{}", err);
                errors.push(err);
                continue;
            }
        };
        info!("{}: {} entries scanned", name, extracted.len());
        for event in extracted {
            debug_assert!(!event.origin.is_empty(), "events must be traceable to a store");
            if !window.contains(event.timestamp) {
                continue;
            }
            let key = (
                event.source,
                event.subtype.clone(),
                event.origin.clone(),
                event.timestamp,
                event.subject.clone(),
            );
            if !seen.insert(key) {
                continue;
            }
            *counts.entry(event.source).or_insert(0) += 1;
            events.push(event);
        }
    }

    events.sort_by(|a, b| a.sort_key().cmp(&b.sort_key()));

    Timeline {
        window: *window,
        events,
        counts,
        errors,
    }
}
