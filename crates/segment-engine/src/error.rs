//! Error types for segment-engine operations.
//!
//! Every error is caused by caller input or stored data, never by a transient
//! condition, so none of them are retryable.

use thiserror::Error;

use crate::types::{Interval, SegmentId, Timestamp};

#[derive(Error, Debug)]
pub enum SegmentError {
    /// Segment creation or redefinition with `period <= 0`.
    #[error("Invalid period {0}: a segment period must be strictly positive")]
    InvalidPeriod(i64),

    /// An interval with `end <= start`.
    #[error("Invalid range [{start}, {end}): end must be after start")]
    InvalidRange { start: Timestamp, end: Timestamp },

    #[error("Segment name must not be empty")]
    EmptyName,

    /// The override range intersects a range owned by another segment.
    #[error("Override range {requested} for segment {segment} overlaps {existing} of segment {existing_segment}")]
    OverlapConflict {
        segment: SegmentId,
        requested: Interval,
        existing_segment: SegmentId,
        existing: Interval,
    },

    #[error("Unknown segment {0}")]
    UnknownSegment(SegmentId),

    /// Delete attempted while override ranges or task bindings still point at the segment.
    #[error("Segment {segment} is in use ({ranges} override range(s), {tasks} task binding(s))")]
    SegmentInUse {
        segment: SegmentId,
        ranges: usize,
        tasks: usize,
    },

    /// More than one recurring segment claims the same instant.
    #[error("Ambiguous schedule at {instant}: segments {} all recur there", format_ids(.candidates))]
    AmbiguousSchedule {
        instant: Timestamp,
        candidates: Vec<SegmentId>,
    },

    /// A task's `time_segment_id` does not name an existing segment.
    #[error("Invalid segment binding {0}")]
    InvalidSegment(i64),

    #[error("No override range of segment {segment} covers {interval}")]
    NotFound {
        segment: SegmentId,
        interval: Interval,
    },

    /// A recurrence version change that would rewrite history.
    #[error("Invalid revision of segment {segment}: {reason}")]
    InvalidRevision {
        segment: SegmentId,
        reason: String,
    },

    #[error("Duplicate segment {0} in snapshot")]
    DuplicateSegment(SegmentId),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

fn format_ids(ids: &[SegmentId]) -> String {
    ids.iter()
        .map(|id| id.to_string())
        .collect::<Vec<_>>()
        .join(", ")
}

pub type Result<T> = std::result::Result<T, SegmentError>;
