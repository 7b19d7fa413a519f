//! Canonical timestamp handling.
//!
//! Window bounds are persisted and compared as text, so every timestamp the
//! poller produces goes through [`format_timestamp`]. The format is fixed
//! width (millisecond precision, trailing `Z`), which makes lexicographic
//! order equal chronological order.

use chrono::{DateTime, Duration, SecondsFormat, Timelike, Utc};

/// Formats a UTC instant as `YYYY-MM-DDTHH:MM:SS.sssZ`.
pub fn format_timestamp(instant: DateTime<Utc>) -> String {
    instant.to_rfc3339_opts(SecondsFormat::Millis, true)
}

/// Drops seconds and sub-second precision.
pub fn floor_to_minute(instant: DateTime<Utc>) -> DateTime<Utc> {
    instant
        .with_second(0)
        .and_then(|truncated| truncated.with_nanosecond(0))
        .unwrap_or(instant)
}

/// Converts a std duration into a chrono one, saturating on overflow.
pub fn to_chrono(duration: std::time::Duration) -> Duration {
    Duration::from_std(duration).unwrap_or(Duration::MAX)
}
