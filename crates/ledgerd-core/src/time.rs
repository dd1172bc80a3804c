//! Timestamp encoding shared by every table.
//!
//! All instants are stored as RFC 3339 UTC strings with a fixed millisecond
//! precision and a `Z` suffix, so lexical order in SQLite equals time order
//! and range filters can use plain `BETWEEN`.

use chrono::{DateTime, SecondsFormat, Utc};

use crate::error::{CoreError, Result};

/// Encode an instant for storage.
pub fn format_timestamp(at: DateTime<Utc>) -> String {
    at.to_rfc3339_opts(SecondsFormat::Millis, true)
}

/// Decode a stored instant. Accepts any RFC 3339 offset.
pub fn parse_timestamp(value: &str) -> Result<DateTime<Utc>> {
    DateTime::parse_from_rfc3339(value)
        .map(|dt| dt.with_timezone(&Utc))
        .map_err(|e| CoreError::Timestamp {
            value: value.to_string(),
            reason: e.to_string(),
        })
}
