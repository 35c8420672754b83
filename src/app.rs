//! Top-level run orchestration: build the enabled extractors, correlate,
//! and write the report.

use crate::browser::{ChromiumHistoryExtractor, FirefoxHistoryExtractor};
use crate::cli::Config;
use crate::commands::{PowerShellHistoryExtractor, RunMruExtractor};
use crate::correlate::{correlate, Timeline};
use crate::error::Result;
use crate::execution::{PrefetchExtractor, UserAssistExtractor};
use crate::extractor::{Extractor, ScanContext};
use crate::output::{create_writer, OutputFormat, ReportWriter};
use crate::recent_files::{RecentDocsExtractor, RecentFolderExtractor};
use crate::registry;
use crate::typed_paths::TypedPathsExtractor;
use crate::types::ArtifactSource;
use crate::usb::UsbHistoryExtractor;
use is_terminal::IsTerminal;
use log::{info, warn};

pub struct App {
    config: Config,
}

impl App {
    pub fn new(config: Config) -> Self {
        Self { config }
    }

    pub fn run(&self) -> Result<()> {
        if cfg!(windows) && !registry::is_elevated() {
            warn!(
                "not running elevated; Prefetch and USBSTOR may be unreadable \
                 and will be reported as extraction errors"
            );
        }

        let ctx = ScanContext::from_environment();
        let extractors = build_extractors(&ctx, &self.config);
        info!(
            "scanning {} extractors over window {} .. {}",
            extractors.len(),
            self.config.window.start().format("%Y-%m-%d %H:%M:%S"),
            self.config.window.end().format("%Y-%m-%d %H:%M:%S")
        );

        let mut timeline = correlate(&extractors, &self.config.window);
        if let Some(regex) = &self.config.filter_regex {
            apply_filter(&mut timeline, regex);
        }
        info!(
            "{} events in window, {} extraction errors",
            timeline.total_events(),
            timeline.errors.len()
        );

        let format = self.config.format.unwrap_or_else(|| {
            if self.config.output.is_none() && std::io::stdout().is_terminal() {
                OutputFormat::Table
            } else {
                OutputFormat::Json
            }
        });
        let writer = create_writer(self.config.output.as_deref())?;
        ReportWriter::write(&timeline, format, writer, self.config.timezone)?;

        if let Some(path) = &self.config.output {
            if path != "-" {
                info!("report written to {}", path);
            }
        }
        Ok(())
    }
}

/// Build one extractor per enabled artifact store. A source family can
/// contribute several extractors (e.g. browser covers Chrome, Edge and
/// Firefox).
fn build_extractors(ctx: &ScanContext, config: &Config) -> Vec<Box<dyn Extractor>> {
    let mut extractors: Vec<Box<dyn Extractor>> = Vec::new();
    for source in &config.enabled_sources {
        match source {
            ArtifactSource::ExecutionEvidence => {
                extractors.push(Box::new(UserAssistExtractor));
                extractors.push(Box::new(PrefetchExtractor::new(ctx)));
            }
            ArtifactSource::RecentFiles => {
                extractors.push(Box::new(RecentFolderExtractor::new(ctx)));
                extractors.push(Box::new(RecentDocsExtractor));
            }
            ArtifactSource::BrowserActivity => {
                extractors.push(Box::new(ChromiumHistoryExtractor::chrome(ctx)));
                extractors.push(Box::new(ChromiumHistoryExtractor::edge(ctx)));
                extractors.push(Box::new(FirefoxHistoryExtractor::new(ctx)));
            }
            ArtifactSource::UsbHistory => {
                extractors.push(Box::new(UsbHistoryExtractor));
            }
            ArtifactSource::CommandHistory => {
                extractors.push(Box::new(PowerShellHistoryExtractor::new(ctx)));
                extractors.push(Box::new(RunMruExtractor));
            }
            ArtifactSource::TypedPaths => {
                extractors.push(Box::new(TypedPathsExtractor));
            }
        }
    }
    extractors
}

/// Drop events whose subject and origin both fail the investigator's regex,
/// then rebuild the per-source counts so the summary matches what is shown.
fn apply_filter(timeline: &mut Timeline, regex: &regex::Regex) {
    timeline
        .events
        .retain(|e| regex.is_match(&e.subject) || regex.is_match(&e.origin));
    for count in timeline.counts.values_mut() {
        *count = 0;
    }
    for event in &timeline.events {
        *timeline.counts.entry(event.source).or_insert(0) += 1;
    }
}
