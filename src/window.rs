//! The triage time window: a closed UTC interval computed once per run.

use crate::error::{Error, Result};
use chrono::{DateTime, Duration, Utc};
use serde::Serialize;

/// Default trailing window size in minutes
pub const DEFAULT_WINDOW_MINUTES: i64 = 180;

/// A closed interval `[start, end]` in UTC with `start <= end`.
///
/// Constructed once from configuration and immutable for the run. Events are
/// admitted iff their timestamp falls inside the interval, boundaries
/// included.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct TimeWindow {
    start: DateTime<Utc>,
    end: DateTime<Utc>,
}

impl TimeWindow {
    /// Build a trailing window of `minutes` ending at `end` (either "now" or
    /// an investigator-supplied reference time).
    pub fn ending_at(end: DateTime<Utc>, minutes: i64) -> Result<Self> {
        if minutes <= 0 {
            return Err(Error::InvalidInput(format!(
                "window must be a positive number of minutes, got {}",
                minutes
            )));
        }
        let span = Duration::try_minutes(minutes).ok_or_else(|| {
            Error::InvalidInput(format!("window of {} minutes is out of range", minutes))
        })?;
        let start = end.checked_sub_signed(span).ok_or_else(|| {
            Error::InvalidInput(format!("window of {} minutes underflows the calendar", minutes))
        })?;
        Ok(Self { start, end })
    }

    pub fn start(&self) -> DateTime<Utc> {
        self.start
    }

    pub fn end(&self) -> DateTime<Utc> {
        self.end
    }

    /// Inclusive containment check; boundary events count.
    pub fn contains(&self, timestamp: DateTime<Utc>) -> bool {
        self.start <= timestamp && timestamp <= self.end
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDateTime;

    fn utc(s: &str) -> DateTime<Utc> {
        NaiveDateTime::parse_from_str(s, "%Y-%m-%d %H:%M:%S")
            .unwrap()
            .and_utc()
    }

    #[test]
    fn test_default_window_span() {
        let end = utc("2024-01-01 13:00:00");
        let w = TimeWindow::ending_at(end, DEFAULT_WINDOW_MINUTES).unwrap();
        assert_eq!(w.start(), utc("2024-01-01 10:00:00"));
        assert_eq!(w.end(), end);
    }

    #[test]
    fn test_boundaries_inclusive() {
        let w = TimeWindow::ending_at(utc("2024-01-01 13:00:00"), 180).unwrap();
        assert!(w.contains(utc("2024-01-01 10:00:00")));
        assert!(w.contains(utc("2024-01-01 13:00:00")));
        assert!(w.contains(utc("2024-01-01 12:30:00")));
        assert!(!w.contains(utc("2024-01-01 09:59:59")));
        assert!(!w.contains(utc("2024-01-01 13:00:01")));
    }

    #[test]
    fn test_rejects_non_positive_window() {
        let end = utc("2024-01-01 13:00:00");
        assert!(TimeWindow::ending_at(end, 0).is_err());
        assert!(TimeWindow::ending_at(end, -5).is_err());
    }

    #[test]
    fn test_huge_window_is_an_error_not_a_panic() {
        let end = utc("2024-01-01 13:00:00");
        // Does not fit in a Duration at all
        assert!(TimeWindow::ending_at(end, i64::MAX).is_err());
        // Fits in a Duration but underflows the calendar
        assert!(TimeWindow::ending_at(end, 1_000_000_000_000).is_err());
    }
}
