//! Timestamp utilities
//!
//! Timestamps are stored as fixed-width RFC 3339 UTC text
//! (`2024-05-01T12:00:00.000000Z`) so that lexical order in SQLite matches
//! chronological order.

use chrono::{DateTime, SecondsFormat, Utc};

use crate::{Error, Result};

/// Get current UTC timestamp
pub fn now() -> DateTime<Utc> {
    Utc::now()
}

/// Convert milliseconds to duration
pub fn millis_to_duration(millis: u64) -> std::time::Duration {
    std::time::Duration::from_millis(millis)
}

/// Format a timestamp for storage
pub fn to_db_timestamp(ts: &DateTime<Utc>) -> String {
    ts.to_rfc3339_opts(SecondsFormat::Micros, true)
}

/// Parse a stored timestamp back into UTC
pub fn parse_db_timestamp(value: &str) -> Result<DateTime<Utc>> {
    DateTime::parse_from_rfc3339(value)
        .map(|dt| dt.with_timezone(&Utc))
        .map_err(|e| Error::Internal(format!("Invalid stored timestamp '{}': {}", value, e)))
}

/// Milliseconds elapsed between `since` and `until` (negative if `until` is earlier)
pub fn elapsed_ms(since: &DateTime<Utc>, until: &DateTime<Utc>) -> i64 {
    until.signed_duration_since(*since).num_milliseconds()
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{Duration as ChronoDuration, TimeZone};
    use std::time::Duration;

    #[test]
    fn test_now_returns_valid_timestamp() {
        let timestamp = now();
        // After 2000-01-01 00:00:00 UTC
        assert!(timestamp.timestamp() > 946_684_800);
    }

    #[test]
    fn test_millis_to_duration() {
        assert_eq!(millis_to_duration(0), Duration::from_millis(0));
        assert_eq!(millis_to_duration(5000), Duration::from_secs(5));
    }

    #[test]
    fn test_db_timestamp_is_fixed_width() {
        let whole = Utc.with_ymd_and_hms(2024, 5, 1, 12, 0, 0).unwrap();
        let fractional = whole + ChronoDuration::microseconds(1_500);

        assert_eq!(to_db_timestamp(&whole), "2024-05-01T12:00:00.000000Z");
        assert_eq!(to_db_timestamp(&fractional), "2024-05-01T12:00:00.001500Z");
    }

    #[test]
    fn test_db_timestamp_round_trip_preserves_micros() {
        let ts = Utc.with_ymd_and_hms(2023, 12, 31, 23, 59, 59).unwrap()
            + ChronoDuration::microseconds(999_999);
        let parsed = parse_db_timestamp(&to_db_timestamp(&ts)).unwrap();
        assert_eq!(parsed, ts);
    }

    #[test]
    fn test_parse_accepts_offsets() {
        let parsed = parse_db_timestamp("2024-05-01T14:00:00+02:00").unwrap();
        assert_eq!(parsed, Utc.with_ymd_and_hms(2024, 5, 1, 12, 0, 0).unwrap());
    }

    #[test]
    fn test_parse_rejects_garbage() {
        assert!(parse_db_timestamp("yesterday").is_err());
    }

    #[test]
    fn test_elapsed_ms_sign() {
        let a = Utc.with_ymd_and_hms(2024, 5, 1, 12, 0, 0).unwrap();
        let b = a + ChronoDuration::milliseconds(4_250);
        assert_eq!(elapsed_ms(&a, &b), 4_250);
        assert_eq!(elapsed_ms(&b, &a), -4_250);
    }
}
