//! Timestamp utilities.
//!
//! Run logs use a fixed human-readable UTC format
//! (`YYYY-MM-DD HH:MM:SS UTC`); serialized records use chrono's RFC 3339.

use chrono::{DateTime, NaiveDateTime, TimeZone, Utc};
use thiserror::Error;

/// Represents a timestamp that can be serialized/deserialized.
pub type Timestamp = DateTime<Utc>;

const LOG_FORMAT: &str = "%Y-%m-%d %H:%M:%S";
const LOG_SUFFIX: &str = " UTC";

/// Errors that can occur during timestamp parsing.
#[derive(Debug, Error)]
pub enum TimestampError {
    /// The timestamp string is empty.
    #[error("Empty timestamp string")]
    EmptyString,

    /// The timestamp value is invalid.
    #[error("Invalid timestamp: {0}")]
    InvalidFormat(String),
}

/// Returns the current UTC timestamp.
#[must_use]
pub fn now_utc() -> Timestamp {
    Utc::now()
}

/// Formats a timestamp in run log format (`YYYY-MM-DD HH:MM:SS UTC`).
///
/// ```
/// use chrono::{TimeZone, Utc};
/// use reportflow::utils::format_log_timestamp;
///
/// let dt = Utc.with_ymd_and_hms(2024, 1, 1, 0, 0, 0).unwrap();
/// assert_eq!(format_log_timestamp(&dt), "2024-01-01 00:00:00 UTC");
/// ```
#[must_use]
pub fn format_log_timestamp(dt: &Timestamp) -> String {
    format!("{}{LOG_SUFFIX}", dt.format(LOG_FORMAT))
}

/// Parses a timestamp written by [`format_log_timestamp`].
///
/// # Errors
///
/// Returns `TimestampError` if the input is empty or not in run log format.
pub fn parse_log_timestamp(input: &str) -> Result<Timestamp, TimestampError> {
    let trimmed = input.trim();

    if trimmed.is_empty() {
        return Err(TimestampError::EmptyString);
    }

    let without_zone = trimmed
        .strip_suffix(LOG_SUFFIX)
        .ok_or_else(|| TimestampError::InvalidFormat(trimmed.to_string()))?;

    NaiveDateTime::parse_from_str(without_zone, LOG_FORMAT)
        .map(|naive| Utc.from_utc_datetime(&naive))
        .map_err(|_| TimestampError::InvalidFormat(trimmed.to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{Datelike, Timelike};

    #[test]
    fn test_format_log_timestamp() {
        let dt = Utc.with_ymd_and_hms(2024, 3, 9, 7, 5, 1).unwrap();
        assert_eq!(format_log_timestamp(&dt), "2024-03-09 07:05:01 UTC");
    }

    #[test]
    fn test_parse_log_timestamp() {
        let dt = parse_log_timestamp("2023-10-05 14:30:00 UTC").unwrap();
        assert_eq!(dt.year(), 2023);
        assert_eq!(dt.month(), 10);
        assert_eq!(dt.day(), 5);
        assert_eq!(dt.hour(), 14);
    }

    #[test]
    fn test_parse_log_timestamp_requires_zone() {
        assert!(matches!(
            parse_log_timestamp("2023-10-05 14:30:00"),
            Err(TimestampError::InvalidFormat(_))
        ));
    }

    #[test]
    fn test_parse_empty_string() {
        assert!(matches!(
            parse_log_timestamp("  "),
            Err(TimestampError::EmptyString)
        ));
    }
}
