use serde::{Deserialize, Serialize};
use time::{Duration, OffsetDateTime, UtcOffset};

use crate::error::CoreError;
use crate::timestamp::{format_timestamp, parse_timestamp};

/// A closed time interval `[start, end]` in UTC with `start <= end`.
///
/// Used both for product acquisition windows and for the requested time of
/// interest of a sample.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct TimeInterval {
    #[serde(with = "time::serde::rfc3339")]
    start: OffsetDateTime,
    #[serde(with = "time::serde::rfc3339")]
    end: OffsetDateTime,
}

impl TimeInterval {
    /// Build an interval, rejecting `start > end`.
    pub fn new(start: OffsetDateTime, end: OffsetDateTime) -> Result<Self, CoreError> {
        let start = start.to_offset(UtcOffset::UTC);
        let end = end.to_offset(UtcOffset::UTC);
        if start > end {
            return Err(CoreError::invalid(format!(
                "time window start {} is after end {}",
                format_timestamp(start),
                format_timestamp(end)
            )));
        }
        Ok(Self { start, end })
    }

    /// A zero-length interval at `at`.
    pub fn instant(at: OffsetDateTime) -> Self {
        let at = at.to_offset(UtcOffset::UTC);
        Self { start: at, end: at }
    }

    /// Normalize one or two time markers into an interval.
    ///
    /// One marker gives a zero-length window; two give `(start, end)`.
    /// Any other count is rejected.
    pub fn from_markers(markers: &[OffsetDateTime]) -> Result<Self, CoreError> {
        match markers {
            [at] => Ok(Self::instant(*at)),
            [start, end] => Self::new(*start, *end),
            _ => Err(CoreError::invalid(format!(
                "time of interest must have 1 or 2 markers, got {}",
                markers.len()
            ))),
        }
    }

    /// Parse textual markers, then normalize as in [`TimeInterval::from_markers`].
    pub fn parse_markers<S: AsRef<str>>(markers: &[S]) -> Result<Self, CoreError> {
        let parsed = markers
            .iter()
            .map(|m| parse_timestamp(m.as_ref()))
            .collect::<Result<Vec<_>, _>>()?;
        Self::from_markers(&parsed)
    }

    pub fn start(&self) -> OffsetDateTime {
        self.start
    }

    pub fn end(&self) -> OffsetDateTime {
        self.end
    }

    pub fn duration(&self) -> Duration {
        self.end - self.start
    }

    /// True when `next` (which starts no earlier than `self`) overlaps or
    /// touches this interval.
    pub fn is_adjacent_to(&self, next: &TimeInterval) -> bool {
        self.end >= next.start
    }

    /// True when `at` lies within the closed interval.
    pub fn contains(&self, at: OffsetDateTime) -> bool {
        self.start <= at && at <= self.end
    }

    /// Smallest interval covering both `self` and `other`.
    pub fn hull(&self, other: &TimeInterval) -> Self {
        Self {
            start: self.start.min(other.start),
            end: self.end.max(other.end),
        }
    }

    /// Widen both ends by `margin`.
    pub fn expanded(&self, margin: Duration) -> Self {
        Self {
            start: self.start - margin,
            end: self.end + margin,
        }
    }
}

impl std::fmt::Display for TimeInterval {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "{}/{}",
            format_timestamp(self.start),
            format_timestamp(self.end)
        )
    }
}
