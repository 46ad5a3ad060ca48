//! Timestamp parsing and canonical rendering.
//!
//! Search services and user input disagree on how timestamps are written
//! (`2020-01-01`, `2020-01-01T05:12:33.000000`, `2020-01-01T05:12:33Z`, ...).
//! Everything is normalized to UTC `OffsetDateTime` on the way in and
//! rendered as RFC 3339 UTC on the way out.

use time::format_description::well_known::Rfc3339;
use time::macros::format_description;
use time::{Date, OffsetDateTime, PrimitiveDateTime, UtcOffset};

use crate::error::CoreError;

/// Parse an ISO-8601-like timestamp into UTC.
///
/// Accepts RFC 3339 (any offset), naive date-times with or without
/// fractional seconds and an optional trailing `Z`, and plain dates
/// (midnight UTC). Naive values are taken to be UTC.
pub fn parse_timestamp(text: &str) -> Result<OffsetDateTime, CoreError> {
    let trimmed = text.trim();
    if let Ok(parsed) = OffsetDateTime::parse(trimmed, &Rfc3339) {
        return Ok(parsed.to_offset(UtcOffset::UTC));
    }

    let naive = trimmed.strip_suffix('Z').unwrap_or(trimmed);
    if let Some(parsed) = parse_naive(naive) {
        return Ok(parsed.assume_utc());
    }

    Date::parse(naive, format_description!("[year]-[month]-[day]"))
        .map(|date| date.midnight().assume_utc())
        .map_err(|_| CoreError::invalid(format!("unrecognized timestamp '{}'", text)))
}

fn parse_naive(text: &str) -> Option<PrimitiveDateTime> {
    PrimitiveDateTime::parse(
        text,
        format_description!("[year]-[month]-[day]T[hour]:[minute]:[second].[subsecond]"),
    )
    .or_else(|_| {
        PrimitiveDateTime::parse(
            text,
            format_description!("[year]-[month]-[day]T[hour]:[minute]:[second]"),
        )
    })
    .or_else(|_| {
        PrimitiveDateTime::parse(
            text,
            format_description!("[year]-[month]-[day] [hour]:[minute]:[second]"),
        )
    })
    .or_else(|_| {
        PrimitiveDateTime::parse(text, format_description!("[year]-[month]-[day]T[hour]:[minute]"))
    })
    .ok()
}

/// Render a timestamp as RFC 3339 in UTC.
pub fn format_timestamp(value: OffsetDateTime) -> String {
    let utc = value.to_offset(UtcOffset::UTC);
    utc.format(&Rfc3339).unwrap_or_else(|_| utc.to_string())
}
