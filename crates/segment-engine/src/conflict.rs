//! Detect segments whose recurrences claim the same instants.
//!
//! Performs pairwise comparison of segment footprints. Adjacent footprints
//! (where one ends exactly when another starts) are NOT conflicts.

use serde::{Deserialize, Serialize};

use crate::segment::TimeSegment;
use crate::types::{Interval, SegmentId};

/// Two segments whose recurrences both cover `overlap`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Ambiguity {
    pub segment_a: SegmentId,
    pub segment_b: SegmentId,
    /// The shared window; open-ended when both footprints are.
    pub overlap: Interval,
}

/// The first window in which `a` and `b` both recur, if any.
pub fn first_overlap(a: &TimeSegment, b: &TimeSegment) -> Option<Interval> {
    overlaps_between(a, b).into_iter().next()
}

fn overlaps_between(a: &TimeSegment, b: &TimeSegment) -> Vec<Interval> {
    let mut shared = Vec::new();
    for wa in a.footprint() {
        for wb in b.footprint() {
            if let Some(overlap) = wa.intersect(&wb) {
                shared.push(overlap);
            }
        }
    }
    shared.sort();
    shared
}

/// Find every pair of segments whose footprints overlap.
///
/// Each shared window is reported separately, ordered by segment pair then by
/// window start. `segment_a` always has the smaller id.
pub fn find_ambiguities<'a, I>(segments: I) -> Vec<Ambiguity>
where
    I: IntoIterator<Item = &'a TimeSegment>,
{
    let mut segments: Vec<&TimeSegment> = segments.into_iter().collect();
    segments.sort_by_key(|s| s.id);

    let mut found = Vec::new();
    for (i, a) in segments.iter().enumerate() {
        for b in &segments[i + 1..] {
            for overlap in overlaps_between(a, b) {
                found.push(Ambiguity {
                    segment_a: a.id,
                    segment_b: b.id,
                    overlap,
                });
            }
        }
    }
    found
}
