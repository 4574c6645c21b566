//! Timestamp parsing for departure events.
//!
//! The provider sends ISO-8601 instants (`2024-03-15T14:30:00Z`, sometimes
//! with an explicit offset or fractional seconds). A timestamp that fails to
//! parse is a display problem, never a crash: callers degrade to a sentinel.

use chrono::{DateTime, Utc};

/// Error returned when parsing a malformed timestamp.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("invalid timestamp: {input:?}")]
pub struct InvalidTimestamp {
    input: String,
}

/// Parse an ISO-8601 / RFC 3339 instant into UTC.
///
/// ```
/// use commuter::domain::parse_instant;
///
/// let t = parse_instant("2024-03-15T14:30:00+01:00").unwrap();
/// assert_eq!(t.to_rfc3339(), "2024-03-15T13:30:00+00:00");
/// assert!(parse_instant("14:30").is_err());
/// ```
pub fn parse_instant(s: &str) -> Result<DateTime<Utc>, InvalidTimestamp> {
    DateTime::parse_from_rfc3339(s.trim())
        .map(|dt| dt.with_timezone(&Utc))
        .map_err(|_| InvalidTimestamp {
            input: s.to_string(),
        })
}

/// Parse an optional timestamp, treating absence and garbage alike.
pub fn parse_optional(s: Option<&str>) -> Option<DateTime<Utc>> {
    s.and_then(|s| parse_instant(s).ok())
}
