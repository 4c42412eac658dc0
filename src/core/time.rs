//! Timestamp parsing and span arithmetic
//!
//! All analysis time is absolute UTC instants. Input timestamps arrive as
//! ISO 8601 or `YYYY-MM-DD HH:MM:SS` text; naive values (no zone) are
//! interpreted as UTC so that ordering is well-defined for the whole batch.

use chrono::{DateTime, NaiveDateTime, Utc};

/// Accepted naive timestamp layouts. `%.f` tolerates optional fractional
/// seconds in both layouts.
const NAIVE_FORMATS: [&str; 2] = ["%Y-%m-%dT%H:%M:%S%.f", "%Y-%m-%d %H:%M:%S%.f"];

/// Parse a raw timestamp field into a UTC instant.
///
/// Accepts RFC 3339 (with zone offset or `Z`) and the two naive layouts
/// `YYYY-MM-DDTHH:MM:SS` / `YYYY-MM-DD HH:MM:SS`, each with optional
/// fractional seconds. Returns `None` for anything else.
///
/// # Example
/// ```
/// use mule_detection_core_rs::core::time::parse_timestamp;
///
/// let ts = parse_timestamp("2025-01-01 10:30:00").unwrap();
/// assert_eq!(ts, parse_timestamp("2025-01-01T10:30:00Z").unwrap());
/// ```
pub fn parse_timestamp(raw: &str) -> Option<DateTime<Utc>> {
    let raw = raw.trim();
    if raw.is_empty() {
        return None;
    }

    if let Ok(dt) = DateTime::parse_from_rfc3339(raw) {
        return Some(dt.with_timezone(&Utc));
    }

    for fmt in NAIVE_FORMATS {
        if let Ok(naive) = NaiveDateTime::parse_from_str(raw, fmt) {
            return Some(naive.and_utc());
        }
    }

    None
}

/// Span between two instants in fractional hours.
///
/// Millisecond precision; callers compare the result against hour-valued
/// caps (72h windows, 24h velocity windows).
pub fn span_hours(earliest: DateTime<Utc>, latest: DateTime<Utc>) -> f64 {
    (latest - earliest).num_milliseconds() as f64 / 3_600_000.0
}
