//! Timestamp normalization and display helpers.
//!
//! Every artifact store records time differently: 64-bit FILETIME counts of
//! 100-nanosecond intervals since 1601, WebKit microseconds since 1601, Unix
//! epoch seconds/milliseconds/microseconds, and fixed-format date-time
//! strings. This module converts each of them into one canonical
//! `DateTime<Utc>` with a declared precision so downstream logic compares
//! apples to apples.

use crate::error::{Error, NormalizeError, Result};
use crate::types::Precision;
use chrono::{DateTime, Datelike, NaiveDate, NaiveDateTime, TimeZone, Utc};
use chrono_tz::Tz;
use std::time::SystemTime;

/// Seconds between 1601-01-01 and 1970-01-01
const EPOCH_1601_TO_UNIX_SECS: i64 = 11_644_473_600;

/// Sane calendar bound for forensic timestamps; values outside are noise
const MIN_YEAR: i32 = 1980;
const MAX_YEAR: i32 = 2100;

/// Timestamp encodings produced by the supported artifact stores
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TimeEncoding {
    /// 100-nanosecond intervals since 1601-01-01 (registry, NTFS, LNK)
    Filetime,
    /// Microseconds since 1601-01-01 (Chrome/Edge history)
    WebkitMicros,
    /// Seconds since 1970-01-01 (file mtimes)
    UnixSeconds,
    /// Milliseconds since 1970-01-01
    UnixMillis,
    /// Microseconds since 1970-01-01 (Firefox places)
    UnixMicros,
    /// Fixed-format string: "YYYY-MM-DD HH:MM:SS" or "YYYY-MM-DD"
    Text,
}

/// Raw artifact-native timestamp value
#[derive(Debug, Clone, Copy)]
pub enum RawTimestamp<'a> {
    Numeric(i64),
    Text(&'a str),
}

/// Normalization result: canonical UTC instant plus declared resolution
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Normalized {
    pub timestamp: DateTime<Utc>,
    pub precision: Precision,
}

/// Convert an artifact-native timestamp into a canonical UTC instant.
///
/// Fails with `OutOfRange` when the value cannot represent a valid calendar
/// instant inside the 1980-2100 bound (zero FILETIME/WebKit values mean "no
/// timestamp" and are rejected the same way), and `MalformedEncoding` when
/// the raw variant does not fit the encoding kind or the text does not parse.
pub fn normalize(
    kind: TimeEncoding,
    raw: RawTimestamp<'_>,
) -> std::result::Result<Normalized, NormalizeError> {
    let (timestamp, precision) = match (kind, raw) {
        (TimeEncoding::Filetime, RawTimestamp::Numeric(ticks)) => {
            if ticks <= 0 {
                return Err(NormalizeError::OutOfRange);
            }
            let micros = (ticks / 10) - EPOCH_1601_TO_UNIX_SECS * 1_000_000;
            let ts = DateTime::from_timestamp_micros(micros).ok_or(NormalizeError::OutOfRange)?;
            (ts, Precision::Millisecond)
        }
        (TimeEncoding::WebkitMicros, RawTimestamp::Numeric(micros)) => {
            if micros <= 0 {
                return Err(NormalizeError::OutOfRange);
            }
            let unix_micros = micros - EPOCH_1601_TO_UNIX_SECS * 1_000_000;
            let ts =
                DateTime::from_timestamp_micros(unix_micros).ok_or(NormalizeError::OutOfRange)?;
            (ts, Precision::Millisecond)
        }
        (TimeEncoding::UnixSeconds, RawTimestamp::Numeric(secs)) => {
            let ts = DateTime::from_timestamp(secs, 0).ok_or(NormalizeError::OutOfRange)?;
            (ts, Precision::Second)
        }
        (TimeEncoding::UnixMillis, RawTimestamp::Numeric(millis)) => {
            let ts = DateTime::from_timestamp_millis(millis).ok_or(NormalizeError::OutOfRange)?;
            (ts, Precision::Millisecond)
        }
        (TimeEncoding::UnixMicros, RawTimestamp::Numeric(micros)) => {
            let ts = DateTime::from_timestamp_micros(micros).ok_or(NormalizeError::OutOfRange)?;
            (ts, Precision::Millisecond)
        }
        (TimeEncoding::Text, RawTimestamp::Text(text)) => {
            let ts = parse_fixed_datetime(text).ok_or(NormalizeError::MalformedEncoding)?;
            (ts, Precision::Second)
        }
        // Numeric value for a text encoding or vice versa
        _ => return Err(NormalizeError::MalformedEncoding),
    };

    if timestamp.year() < MIN_YEAR || timestamp.year() > MAX_YEAR {
        return Err(NormalizeError::OutOfRange);
    }
    Ok(Normalized {
        timestamp,
        precision,
    })
}

/// FILETIME convenience wrapper for registry last-write times and LNK headers
pub fn filetime_to_utc(filetime: u64) -> std::result::Result<Normalized, NormalizeError> {
    let ticks = i64::try_from(filetime).map_err(|_| NormalizeError::OutOfRange)?;
    normalize(TimeEncoding::Filetime, RawTimestamp::Numeric(ticks))
}

/// Convert a filesystem timestamp into a normalized UTC instant
pub fn system_time_to_utc(time: SystemTime) -> std::result::Result<Normalized, NormalizeError> {
    let secs = time
        .duration_since(SystemTime::UNIX_EPOCH)
        .map_err(|_| NormalizeError::OutOfRange)?
        .as_secs();
    let secs = i64::try_from(secs).map_err(|_| NormalizeError::OutOfRange)?;
    normalize(TimeEncoding::UnixSeconds, RawTimestamp::Numeric(secs))
}

fn parse_fixed_datetime(text: &str) -> Option<DateTime<Utc>> {
    if let Ok(naive) = NaiveDateTime::parse_from_str(text, "%Y-%m-%d %H:%M:%S") {
        return Some(Utc.from_utc_datetime(&naive));
    }
    if let Ok(date) = NaiveDate::parse_from_str(text, "%Y-%m-%d") {
        return Some(Utc.from_utc_datetime(&date.and_hms_opt(0, 0, 0)?));
    }
    None
}

/// Parse the `--reference-time` option; failure is a configuration error.
pub fn parse_reference_time(text: &str) -> Result<DateTime<Utc>> {
    parse_fixed_datetime(text).ok_or_else(|| {
        Error::InvalidInput(format!(
            "Invalid reference time '{}'. Use YYYY-MM-DD or YYYY-MM-DD HH:MM:SS (UTC)",
            text
        ))
    })
}

/// Parse display timezone string: "UTC" or UTC offset notation like "UTC+8"
pub fn parse_timezone(timezone_str: &str) -> Result<Tz> {
    match timezone_str {
        "UTC" => Ok(Tz::UTC),
        _ if timezone_str.starts_with("UTC") => {
            let offset_part = &timezone_str[3..];
            if offset_part.is_empty() {
                return Ok(Tz::UTC);
            }
            let offset_hours: i32 = offset_part.parse().map_err(|_| {
                Error::InvalidInput(format!(
                    "Invalid UTC offset '{}'. Use format like 'UTC+8' or 'UTC-5'",
                    timezone_str
                ))
            })?;
            // Representative zone per common offset
            match offset_hours {
                0 => Ok(Tz::UTC),
                1 => Ok(Tz::Europe__London),
                2 => Ok(Tz::Europe__Berlin),
                3 => Ok(Tz::Europe__Moscow),
                4 => Ok(Tz::Asia__Dubai),
                5 => Ok(Tz::Asia__Karachi),
                6 => Ok(Tz::Asia__Dhaka),
                7 => Ok(Tz::Asia__Bangkok),
                8 => Ok(Tz::Asia__Hong_Kong),
                9 => Ok(Tz::Asia__Tokyo),
                10 => Ok(Tz::Australia__Sydney),
                -5 => Ok(Tz::America__New_York),
                -6 => Ok(Tz::America__Chicago),
                -7 => Ok(Tz::America__Denver),
                -8 => Ok(Tz::America__Los_Angeles),
                -10 => Ok(Tz::Pacific__Honolulu),
                _ => Err(Error::InvalidInput(format!(
                    "Unsupported UTC offset '{}'. Supported: UTC+8, UTC-5, etc.",
                    timezone_str
                ))),
            }
        }
        _ => Err(Error::InvalidInput(format!(
            "Invalid timezone '{}'. Use 'UTC' or UTC offset notation like 'UTC+8'",
            timezone_str
        ))),
    }
}

/// Format a UTC instant for report display
pub fn format_timestamp_utc(dt: &DateTime<Utc>) -> String {
    dt.format("%Y-%m-%d %H:%M:%S").to_string()
}

/// Format a UTC instant converted to the display timezone
pub fn format_timestamp_in(dt: &DateTime<Utc>, tz: Tz) -> String {
    dt.with_timezone(&tz).format("%Y-%m-%d %H:%M:%S").to_string()
}
