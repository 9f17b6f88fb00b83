//! Override range storage.
//!
//! An override range pins `[start, end)` to one segment regardless of what any
//! recurrence computes. Ranges of different segments never overlap. Ranges of
//! the same segment that overlap or touch are coalesced into one, so the stored
//! ranges are pairwise disjoint and can live in a `BTreeMap` keyed by start:
//! point and window lookups cost O(log n + k).

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::error::{Result, SegmentError};
use crate::types::{Interval, SegmentId, Timestamp};

/// An explicit carve-out assigning an interval to a segment.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct OverrideRange {
    pub segment_id: SegmentId,
    pub interval: Interval,
}

#[derive(Debug, Clone, Default)]
pub struct OverrideStore {
    by_start: BTreeMap<Timestamp, OverrideRange>,
}

impl OverrideStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.by_start.len()
    }

    pub fn is_empty(&self) -> bool {
        self.by_start.is_empty()
    }

    /// All stored ranges ordered by start.
    pub fn iter(&self) -> impl Iterator<Item = &OverrideRange> {
        self.by_start.values()
    }

    /// The stored range covering `t`, if any.
    pub fn range_at(&self, t: Timestamp) -> Option<&OverrideRange> {
        self.by_start
            .range(..=t)
            .next_back()
            .map(|(_, r)| r)
            .filter(|r| r.interval.contains(t))
    }

    /// The segment an override pins `t` to, if any.
    pub fn override_at(&self, t: Timestamp) -> Option<SegmentId> {
        self.range_at(t).map(|r| r.segment_id)
    }

    /// Stored ranges intersecting `window`, ordered by start.
    pub fn overlapping(&self, window: Interval) -> impl Iterator<Item = &OverrideRange> {
        let straddling = self
            .by_start
            .range(..window.start)
            .next_back()
            .map(|(_, r)| r)
            .filter(move |r| r.interval.end > window.start);
        straddling.into_iter().chain(
            self.by_start
                .range(window.start..window.end)
                .map(|(_, r)| r),
        )
    }

    /// Stored ranges overlapping or adjacent to `window`, newest-start first.
    fn touching(&self, window: Interval) -> Vec<OverrideRange> {
        // Disjoint ranges sorted by start are also sorted by end.
        self.by_start
            .range(..=window.end)
            .rev()
            .map(|(_, r)| *r)
            .take_while(|r| r.interval.end >= window.start)
            .collect()
    }

    pub fn ranges_for(&self, segment: SegmentId) -> impl Iterator<Item = &OverrideRange> {
        self.by_start
            .values()
            .filter(move |r| r.segment_id == segment)
    }

    pub fn count_for(&self, segment: SegmentId) -> usize {
        self.ranges_for(segment).count()
    }

    /// Check that `interval` could be inserted for `segment` without touching
    /// the store.
    pub fn check_insert(&self, segment: SegmentId, interval: Interval) -> Result<()> {
        let conflict = self
            .touching(interval)
            .into_iter()
            .find(|r| r.segment_id != segment && r.interval.overlaps(&interval));
        match conflict {
            Some(existing) => Err(SegmentError::OverlapConflict {
                segment,
                requested: interval,
                existing_segment: existing.segment_id,
                existing: existing.interval,
            }),
            None => Ok(()),
        }
    }

    /// Insert an override, coalescing it with same-segment neighbours.
    ///
    /// Returns the stored range, which may be wider than `interval`. On
    /// `OverlapConflict` the store is left unchanged.
    pub fn insert(&mut self, segment: SegmentId, interval: Interval) -> Result<OverrideRange> {
        self.check_insert(segment, interval)?;

        let mut merged = interval;
        for r in self.touching(interval) {
            if r.segment_id == segment {
                merged.start = merged.start.min(r.interval.start);
                merged.end = merged.end.max(r.interval.end);
                self.by_start.remove(&r.interval.start);
            }
        }
        if merged != interval {
            debug!(segment = %segment, requested = %interval, stored = %merged, "coalesced override range");
        }
        let stored = OverrideRange {
            segment_id: segment,
            interval: merged,
        };
        self.by_start.insert(merged.start, stored);
        Ok(stored)
    }

    /// Carve `interval` out of `segment`'s overrides, splitting a stored range
    /// when the interval falls strictly inside it.
    ///
    /// # Errors
    /// `SegmentError::NotFound` unless the segment's overrides cover all of
    /// `interval`. The store is unchanged on error.
    pub fn remove(&mut self, segment: SegmentId, interval: Interval) -> Result<()> {
        let host = self
            .range_at(interval.start)
            .copied()
            .filter(|r| r.segment_id == segment && r.interval.covers(&interval))
            .ok_or(SegmentError::NotFound { segment, interval })?;

        self.by_start.remove(&host.interval.start);
        if host.interval.start < interval.start {
            let left = Interval {
                start: host.interval.start,
                end: interval.start,
            };
            self.by_start.insert(
                left.start,
                OverrideRange {
                    segment_id: segment,
                    interval: left,
                },
            );
        }
        if interval.end < host.interval.end {
            let right = Interval {
                start: interval.end,
                end: host.interval.end,
            };
            self.by_start.insert(
                right.start,
                OverrideRange {
                    segment_id: segment,
                    interval: right,
                },
            );
        }
        Ok(())
    }

    /// Drop every range of `segment`, returning how many were removed.
    pub fn remove_all(&mut self, segment: SegmentId) -> usize {
        let before = self.by_start.len();
        self.by_start.retain(|_, r| r.segment_id != segment);
        before - self.by_start.len()
    }
}
