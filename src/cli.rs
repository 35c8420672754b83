//! Command-line interface definitions and parsing.

use crate::datetime::{parse_reference_time, parse_timezone};
use crate::error::{Error, Result};
use crate::output::OutputFormat;
use crate::types::ArtifactSource;
use crate::window::{TimeWindow, DEFAULT_WINDOW_MINUTES};
use chrono::{DateTime, Utc};
use clap::Parser;
use std::collections::BTreeSet;

/// tf - Windows Forensic Triage
#[derive(Parser, Debug)]
#[command(name = "tf")]
#[command(about = "tf - Windows Forensic Triage: what did this user do in the last N minutes?", version)]
#[command(long_about = "Scans Windows activity artifacts and reports every event inside a \
configurable trailing time window:
• Execution evidence (UserAssist run history, Prefetch)
• Recently used files (Recent folder shell links, RecentDocs)
• Browser history and downloads (Chrome, Edge, Firefox)
• USB device connection history (USBSTOR)
• Command history (PowerShell PSReadLine, RunMRU)
• Explorer address bar history (TypedPaths)

Artifacts are read live and read-only; the tool writes nothing to the system
it examines. Partial failures (a store that cannot be read) are reported and
never abort the run.")]
pub struct Args {
    /// Size of the trailing activity window in minutes
    #[arg(long, default_value_t = DEFAULT_WINDOW_MINUTES)]
    pub window: i64,

    /// Anchor the window at this UTC time instead of now ("YYYY-MM-DD HH:MM:SS" or "YYYY-MM-DD")
    #[arg(long)]
    pub reference_time: Option<String>,

    /// Comma-separated artifact sources to scan (default: all).
    /// Names: execution, recent-files, browser, usb, commands, typed-paths
    #[arg(long)]
    pub sources: Option<String>,

    /// Keep only events whose subject or origin matches this regex (case-insensitive)
    #[arg(long)]
    pub filter: Option<String>,

    /// Output file (use "-" for stdout, default: stdout)
    #[arg(long)]
    pub output: Option<String>,

    /// Output format (default: table on a terminal, json otherwise)
    #[arg(long, value_enum)]
    pub format: Option<OutputFormat>,

    /// Display timestamps in this timezone alongside UTC (e.g. "UTC+8", "UTC-5")
    #[arg(long, default_value = "UTC")]
    pub timezone: String,

    /// Verbose logging
    #[arg(short, long)]
    pub verbose: bool,
}

/// Parsed and validated run configuration
#[derive(Debug)]
pub struct Config {
    pub window: TimeWindow,
    pub enabled_sources: BTreeSet<ArtifactSource>,
    pub filter_regex: Option<regex::Regex>,
    pub output: Option<String>,
    pub format: Option<OutputFormat>,
    pub timezone: chrono_tz::Tz,
}

impl Config {
    /// Validate CLI arguments into a configuration. Any failure here is a
    /// configuration error and aborts the run before extraction begins;
    /// `now` is injected so runs are reproducible in tests.
    pub fn from_args(args: Args, now: DateTime<Utc>) -> Result<Self> {
        let reference = match &args.reference_time {
            Some(text) => parse_reference_time(text)?,
            None => now,
        };
        let window = TimeWindow::ending_at(reference, args.window)?;

        let enabled_sources = match &args.sources {
            Some(list) => {
                let mut set = BTreeSet::new();
                for part in list.split(',') {
                    let source = part
                        .parse::<ArtifactSource>()
                        .map_err(Error::InvalidInput)?;
                    set.insert(source);
                }
                if set.is_empty() {
                    return Err(Error::InvalidInput(
                        "at least one source must be enabled".to_string(),
                    ));
                }
                set
            }
            None => ArtifactSource::ALL.into_iter().collect(),
        };

        let filter_regex = match &args.filter {
            Some(pattern) => Some(
                regex::RegexBuilder::new(pattern)
                    .case_insensitive(true)
                    .build()
                    .map_err(|e| {
                        Error::InvalidInput(format!("Invalid regex pattern '{}': {}", pattern, e))
                    })?,
            ),
            None => None,
        };

        let timezone = parse_timezone(&args.timezone)?;

        Ok(Config {
            window,
            enabled_sources,
            filter_regex,
            output: args.output,
            format: args.format,
            timezone,
        })
    }
}
