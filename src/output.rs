//! Report rendering for the triage timeline: table, JSON and CSV.

use crate::correlate::Timeline;
use crate::datetime::{format_timestamp_in, format_timestamp_utc};
use crate::error::Result;
use crate::types::ArtifactSource;
use chrono_tz::Tz;
use std::io::{BufWriter, Write};

/// Supported output formats
#[derive(clap::ValueEnum, Clone, Copy, Debug, PartialEq, Eq)]
pub enum OutputFormat {
    /// Aligned console table with per-source summary
    Table,
    /// JSON for programmatic consumption
    Json,
    /// CSV for spreadsheet analysis
    Csv,
}

/// Create an output writer from an optional file path ("-" or none = stdout)
pub fn create_writer(output: Option<&str>) -> Result<Box<dyn Write>> {
    match output {
        None | Some("-") => Ok(Box::new(BufWriter::new(std::io::stdout()))),
        Some(path) => {
            let file = std::fs::File::create(path)?;
            Ok(Box::new(BufWriter::new(file)))
        }
    }
}

/// Renders a completed run
pub struct ReportWriter;

impl ReportWriter {
    pub fn write(
        timeline: &Timeline,
        format: OutputFormat,
        writer: Box<dyn Write>,
        timezone: Tz,
    ) -> Result<()> {
        match format {
            OutputFormat::Table => Self::write_table(timeline, writer, timezone),
            OutputFormat::Json => Self::write_json(timeline, writer),
            OutputFormat::Csv => Self::write_csv(timeline, writer),
        }
    }

    fn write_table(timeline: &Timeline, mut w: impl Write, timezone: Tz) -> Result<()> {
        let local_column = timezone != Tz::UTC;
        writeln!(w, "{}", "=".repeat(120))?;
        writeln!(
            w,
            "Activity window: {} UTC .. {} UTC",
            format_timestamp_utc(&timeline.window.start()),
            format_timestamp_utc(&timeline.window.end()),
        )?;
        writeln!(w, "{}", "=".repeat(120))?;

        if local_column {
            writeln!(
                w,
                "{:<19}  {:<19}  {:<12}  {:<22}  {:<45}  {:<40}  DETAILS",
                "TIMESTAMP (UTC)",
                format!("TIMESTAMP ({})", timezone),
                "SOURCE",
                "SUBTYPE",
                "SUBJECT",
                "ORIGIN"
            )?;
        } else {
            writeln!(
                w,
                "{:<19}  {:<12}  {:<22}  {:<45}  {:<40}  DETAILS",
                "TIMESTAMP (UTC)", "SOURCE", "SUBTYPE", "SUBJECT", "ORIGIN"
            )?;
        }
        writeln!(w, "{}", "-".repeat(120))?;

        for event in &timeline.events {
            let subject = truncate(&event.subject, 45);
            let subtype = truncate(&event.subtype, 22);
            let origin = truncate(&event.origin, 40);
            if local_column {
                writeln!(
                    w,
                    "{:<19}  {:<19}  {:<12}  {:<22}  {:<45}  {:<40}  {}",
                    format_timestamp_utc(&event.timestamp),
                    format_timestamp_in(&event.timestamp, timezone),
                    event.source.label(),
                    subtype,
                    subject,
                    origin,
                    event.details(),
                )?;
            } else {
                writeln!(
                    w,
                    "{:<19}  {:<12}  {:<22}  {:<45}  {:<40}  {}",
                    format_timestamp_utc(&event.timestamp),
                    event.source.label(),
                    subtype,
                    subject,
                    origin,
                    event.details(),
                )?;
            }
        }

        writeln!(w, "{}", "-".repeat(120))?;
        writeln!(w, "Total events: {}", timeline.total_events())?;
        for source in ArtifactSource::ALL {
            if let Some(count) = timeline.counts.get(&source) {
                writeln!(w, "  {:<14} {}", source.label(), count)?;
            }
        }
        if !timeline.errors.is_empty() {
            writeln!(w)?;
            writeln!(w, "Sources that could not be checked:")?;
            for error in &timeline.errors {
                writeln!(w, "  {}", error)?;
            }
        }
        w.flush()?;
        Ok(())
    }

    fn write_json(timeline: &Timeline, mut w: impl Write) -> Result<()> {
        serde_json::to_writer_pretty(&mut w, timeline)?;
        writeln!(w)?;
        w.flush()?;
        Ok(())
    }

    fn write_csv(timeline: &Timeline, w: impl Write) -> Result<()> {
        let mut csv_writer = csv::Writer::from_writer(w);
        csv_writer.write_record([
            "timestamp_utc",
            "source",
            "subtype",
            "subject",
            "origin",
            "precision",
            "details",
        ])?;
        for event in &timeline.events {
            csv_writer.write_record([
                format_timestamp_utc(&event.timestamp).as_str(),
                event.source.label(),
                event.subtype.as_str(),
                event.subject.as_str(),
                event.origin.as_str(),
                event.precision.label(),
                event.details().as_str(),
            ])?;
        }
        csv_writer.flush()?;
        Ok(())
    }
}

fn truncate(text: &str, max: usize) -> String {
    if text.chars().count() <= max {
        text.to_string()
    } else {
        let cut: String = text.chars().take(max.saturating_sub(1)).collect();
        format!("{}…", cut)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::{ActivityEvent, Precision};
    use crate::window::TimeWindow;
    use chrono::DateTime;
    use std::collections::BTreeMap;

    fn sample_timeline() -> Timeline {
        let end = DateTime::from_timestamp(1_704_114_000, 0).unwrap();
        let window = TimeWindow::ending_at(end, 180).unwrap();
        let event = ActivityEvent {
            source: ArtifactSource::ExecutionEvidence,
            subtype: "Prefetch".to_string(),
            timestamp: DateTime::from_timestamp(1_704_110_000, 0).unwrap(),
            precision: Precision::Second,
            subject: "CMD.EXE".to_string(),
            raw: vec![("file".to_string(), "CMD.EXE-0BD30981.pf".to_string())],
            origin: "C:\\Windows\\Prefetch\\CMD.EXE-0BD30981.pf".to_string(),
        };
        let mut counts = BTreeMap::new();
        counts.insert(ArtifactSource::ExecutionEvidence, 1);
        Timeline {
            window,
            events: vec![event],
            counts,
            errors: Vec::new(),
        }
    }

    #[test]
    fn test_csv_output() {
        let timeline = sample_timeline();
        let mut buffer = Vec::new();
        ReportWriter::write_csv(&timeline, &mut buffer).unwrap();
        let text = String::from_utf8(buffer).unwrap();
        let mut lines = text.lines();
        assert_eq!(
            lines.next().unwrap(),
            "timestamp_utc,source,subtype,subject,origin,precision,details"
        );
        let row = lines.next().unwrap();
        assert!(row.contains("CMD.EXE"));
        assert!(row.contains("Execution"));
        assert!(row.contains("second"));
    }

    #[test]
    fn test_json_output_is_valid() {
        let timeline = sample_timeline();
        let mut buffer = Vec::new();
        ReportWriter::write_json(&timeline, &mut buffer).unwrap();
        let value: serde_json::Value = serde_json::from_slice(&buffer).unwrap();
        assert_eq!(value["events"].as_array().unwrap().len(), 1);
        assert_eq!(value["events"][0]["subject"], "CMD.EXE");
    }

    #[test]
    fn test_table_output_mentions_window_and_counts() {
        let timeline = sample_timeline();
        let mut buffer = Vec::new();
        ReportWriter::write_table(&timeline, &mut buffer, Tz::UTC).unwrap();
        let text = String::from_utf8(buffer).unwrap();
        assert!(text.contains("Activity window:"));
        assert!(text.contains("CMD.EXE"));
        assert!(text.contains("Total events: 1"));
    }

    #[test]
    fn test_truncate() {
        assert_eq!(truncate("short", 10), "short");
        assert_eq!(truncate("abcdefghij", 5), "abcd…");
    }
}
