//! Core value types: instants, half-open intervals and segment identities.

use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::error::{Result, SegmentError};

/// An epoch instant in seconds.
pub type Timestamp = i64;

/// End bound used for footprints that never close.
pub const FOREVER: Timestamp = Timestamp::MAX;

/// Convert a UTC datetime to an epoch-seconds [`Timestamp`].
pub fn timestamp_from(dt: DateTime<Utc>) -> Timestamp {
    dt.timestamp()
}

/// Convert a [`Timestamp`] back to a UTC datetime, if it is representable.
pub fn datetime_from(ts: Timestamp) -> Option<DateTime<Utc>> {
    DateTime::from_timestamp(ts, 0)
}

/// Identity of a time segment. Always positive; `0` is reserved for the
/// "unassigned" task binding and is never issued.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(try_from = "i64", into = "i64")]
pub struct SegmentId(i64);

impl SegmentId {
    /// Raw `time_segment_id` value meaning "no segment assigned".
    pub const UNASSIGNED_RAW: i64 = 0;

    pub const MAX: SegmentId = SegmentId(i64::MAX);

    /// Wrap a raw id. Returns `None` for zero or negative values.
    pub fn new(raw: i64) -> Option<Self> {
        (raw > 0).then_some(SegmentId(raw))
    }

    pub fn get(self) -> i64 {
        self.0
    }
}

impl TryFrom<i64> for SegmentId {
    type Error = SegmentError;

    fn try_from(raw: i64) -> Result<Self> {
        SegmentId::new(raw).ok_or(SegmentError::InvalidSegment(raw))
    }
}

impl From<SegmentId> for i64 {
    fn from(id: SegmentId) -> i64 {
        id.0
    }
}

impl fmt::Display for SegmentId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// A half-open interval `[start, end)` with `start < end`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct Interval {
    pub start: Timestamp,
    pub end: Timestamp,
}

impl Interval {
    /// Build an interval, rejecting empty or inverted bounds.
    pub fn new(start: Timestamp, end: Timestamp) -> Result<Self> {
        if end <= start {
            return Err(SegmentError::InvalidRange { start, end });
        }
        Ok(Interval { start, end })
    }

    /// The open-ended interval `[start, FOREVER)`.
    pub fn from_start(start: Timestamp) -> Self {
        Interval { start, end: FOREVER }
    }

    pub fn from_datetimes(start: DateTime<Utc>, end: DateTime<Utc>) -> Result<Self> {
        Interval::new(timestamp_from(start), timestamp_from(end))
    }

    pub fn contains(&self, t: Timestamp) -> bool {
        self.start <= t && t < self.end
    }

    /// Adjacent intervals (`a.end == b.start`) do not overlap.
    pub fn overlaps(&self, other: &Interval) -> bool {
        self.start < other.end && other.start < self.end
    }

    /// Overlapping or adjacent.
    pub fn touches(&self, other: &Interval) -> bool {
        self.start <= other.end && other.start <= self.end
    }

    pub fn intersect(&self, other: &Interval) -> Option<Interval> {
        let start = self.start.max(other.start);
        let end = self.end.min(other.end);
        (start < end).then_some(Interval { start, end })
    }

    pub fn covers(&self, other: &Interval) -> bool {
        self.start <= other.start && other.end <= self.end
    }

    pub fn is_open_ended(&self) -> bool {
        self.end == FOREVER
    }

    /// Length of the interval; saturates for open-ended intervals.
    pub fn len(&self) -> i64 {
        self.end.saturating_sub(self.start)
    }

    pub fn is_empty(&self) -> bool {
        self.start >= self.end
    }
}

impl fmt::Display for Interval {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.is_open_ended() {
            write!(f, "[{}, ∞)", self.start)
        } else {
            write!(f, "[{}, {})", self.start, self.end)
        }
    }
}

/// Outcome of resolving a single instant.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", content = "segment", rename_all = "snake_case")]
pub enum Resolution {
    Segment(SegmentId),
    Unassigned,
}

impl Resolution {
    pub fn segment(self) -> Option<SegmentId> {
        match self {
            Resolution::Segment(id) => Some(id),
            Resolution::Unassigned => None,
        }
    }
}

/// Outcome attached to one sub-interval of a timetable. Unlike [`Resolution`],
/// conflicts are carried as data so a caller still gets the full partition.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", content = "segments", rename_all = "snake_case")]
pub enum SpanResolution {
    Segment(SegmentId),
    Unassigned,
    Ambiguous(Vec<SegmentId>),
}

impl From<Resolution> for SpanResolution {
    fn from(r: Resolution) -> Self {
        match r {
            Resolution::Segment(id) => SpanResolution::Segment(id),
            Resolution::Unassigned => SpanResolution::Unassigned,
        }
    }
}

/// One maximal sub-interval of constant resolution.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ResolvedSpan {
    pub interval: Interval,
    pub resolution: SpanResolution,
}
