//! Task binding validation.
//!
//! Tasks live outside this crate; all the engine knows about them is the raw
//! `time_segment_id` they carry, where `0` means "unassigned". Validation is
//! advisory: nothing here writes to task storage.

use std::collections::HashMap;

use crate::error::{Result, SegmentError};
use crate::types::SegmentId;

/// Read-only view of which tasks point at which segment.
///
/// Implemented by whatever owns task storage; consulted before a segment is
/// deleted.
pub trait TaskBindings {
    /// Number of tasks whose `time_segment_id` is `segment`.
    fn bound_count(&self, segment: SegmentId) -> usize;
}

/// A binding view with no tasks at all.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoBindings;

impl TaskBindings for NoBindings {
    fn bound_count(&self, _segment: SegmentId) -> usize {
        0
    }
}

/// Raw `time_segment_id` column values.
impl TaskBindings for [i64] {
    fn bound_count(&self, segment: SegmentId) -> usize {
        self.iter().filter(|&&raw| raw == segment.get()).count()
    }
}

impl TaskBindings for Vec<i64> {
    fn bound_count(&self, segment: SegmentId) -> usize {
        self.as_slice().bound_count(segment)
    }
}

/// Pre-aggregated counts per segment.
impl TaskBindings for HashMap<SegmentId, usize> {
    fn bound_count(&self, segment: SegmentId) -> usize {
        self.get(&segment).copied().unwrap_or(0)
    }
}

/// Check a raw `time_segment_id` against the set of existing segments.
///
/// # Errors
/// `SegmentError::InvalidSegment` when `raw` is neither `0` nor an existing id.
pub fn validate_binding<F>(raw: i64, exists: F) -> Result<()>
where
    F: Fn(SegmentId) -> bool,
{
    if raw == SegmentId::UNASSIGNED_RAW {
        return Ok(());
    }
    match SegmentId::new(raw) {
        Some(id) if exists(id) => Ok(()),
        _ => Err(SegmentError::InvalidSegment(raw)),
    }
}
