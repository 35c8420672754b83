//! # TF (TraceFinder) - Windows Activity Triage
//!
//! A CLI tool that answers "what did this user do in the last N minutes?" by
//! scanning the Windows artifacts that record user activity and correlating
//! them into a single UTC-ordered timeline.
//!
//! ## Artifact sources
//!
//! - Execution evidence (UserAssist run history, Prefetch)
//! - Recently used files (Recent folder shell links, RecentDocs)
//! - Browser history and downloads (Chrome, Edge, Firefox)
//! - USB device connection history (USBSTOR)
//! - Command history (PowerShell PSReadLine, RunMRU)
//! - Explorer address bar history (TypedPaths)
//!
//! All reads are live and read-only; a store that cannot be read is reported
//! as an extraction error and never aborts the run. Output formats: table,
//! JSON, CSV.

pub mod app;
pub mod browser;
pub mod cli;
pub mod commands;
pub mod correlate;
pub mod datetime;
pub mod error;
pub mod execution;
pub mod extractor;
pub mod output;
pub mod recent_files;
pub mod registry;
pub mod typed_paths;
pub mod types;
pub mod usb;
pub mod window;

pub use correlate::{correlate, Timeline};
pub use error::{Error, ExtractorError, NormalizeError, Result};
pub use extractor::{Extractor, ScanContext};
pub use output::{OutputFormat, ReportWriter};
pub use types::{ActivityEvent, ArtifactSource, Precision};
pub use window::TimeWindow;
