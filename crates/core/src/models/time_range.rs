//! Half-open time intervals

use std::fmt;

use chrono::{DateTime, Datelike, Duration, Timelike, Utc};
use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};

/// A half-open interval `[start, end)`
///
/// Endpoints are truncated to whole microseconds, the precision timestamps
/// are stored at, and must fall in years 0000 through 9999 so that their
/// stored text sorts in time order. Construction guarantees `start < end`
/// after truncation, so an interval is never empty. Intervals that merely
/// touch (`a.end == b.start`) do not overlap.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct TimeRange {
    start: DateTime<Utc>,
    end: DateTime<Utc>,
}

impl TimeRange {
    pub fn new(start: DateTime<Utc>, end: DateTime<Utc>) -> Result<Self> {
        let start = to_stored_precision(start)?;
        let end = to_stored_precision(end)?;
        if end <= start {
            return Err(Error::Validation(format!(
                "end {} must be strictly after start {}",
                end.to_rfc3339(),
                start.to_rfc3339()
            )));
        }
        Ok(Self { start, end })
    }

    /// Build `[start, start + minutes)`
    pub fn starting_at(start: DateTime<Utc>, minutes: u32) -> Result<Self> {
        let end = start
            .checked_add_signed(Duration::minutes(i64::from(minutes)))
            .ok_or_else(|| Error::Validation("session end is out of range".into()))?;
        Self::new(start, end)
    }

    pub fn start(&self) -> DateTime<Utc> {
        self.start
    }

    pub fn end(&self) -> DateTime<Utc> {
        self.end
    }

    pub fn duration(&self) -> Duration {
        self.end - self.start
    }

    pub fn overlaps(&self, other: &TimeRange) -> bool {
        self.start < other.end && other.start < self.end
    }
}

/// Drop sub-microsecond digits and reject years outside 0000..=9999
fn to_stored_precision(at: DateTime<Utc>) -> Result<DateTime<Utc>> {
    if !(0..=9999).contains(&at.year()) {
        return Err(Error::Validation(format!(
            "timestamp {} is outside years 0000-9999",
            at.to_rfc3339()
        )));
    }
    at.with_nanosecond(at.nanosecond() / 1_000 * 1_000)
        .ok_or_else(|| Error::Validation(format!("timestamp {} cannot be stored", at.to_rfc3339())))
}

impl fmt::Display for TimeRange {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "[{}, {})", self.start.to_rfc3339(), self.end.to_rfc3339())
    }
}
