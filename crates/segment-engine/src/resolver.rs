//! Segment resolution: the single owner of all segments and override ranges.
//!
//! Resolution of an instant consults the override store first; overrides
//! always win. Otherwise every segment's recurrence is evaluated. Exactly one
//! covering segment resolves; none is `Unassigned`; more than one is an
//! `AmbiguousSchedule` error naming every candidate. No precedence rule ever
//! picks between competing recurrences.
//!
//! Mutations validate fully before changing anything, so a failed call leaves
//! the schedule exactly as it was.

use std::collections::{BTreeMap, BTreeSet};

use tracing::{debug, info, trace, warn};

use crate::binding::{self, TaskBindings};
use crate::config::{ConflictPolicy, EngineConfig};
use crate::conflict::{self, Ambiguity};
use crate::error::{Result, SegmentError};
use crate::overrides::{OverrideRange, OverrideStore};
use crate::recurrence::RecurrenceInstance;
use crate::segment::TimeSegment;
use crate::types::{Interval, Resolution, ResolvedSpan, SegmentId, SpanResolution, Timestamp};

#[derive(Debug, Clone, Default)]
pub struct Schedule {
    config: EngineConfig,
    segments: BTreeMap<SegmentId, TimeSegment>,
    overrides: OverrideStore,
    last_id: i64,
}

impl Schedule {
    pub fn new(config: EngineConfig) -> Self {
        Schedule {
            config,
            ..Default::default()
        }
    }

    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    pub fn segment(&self, id: SegmentId) -> Option<&TimeSegment> {
        self.segments.get(&id)
    }

    /// All segments ordered by id.
    pub fn segments(&self) -> impl Iterator<Item = &TimeSegment> {
        self.segments.values()
    }

    pub fn overrides(&self) -> &OverrideStore {
        &self.overrides
    }

    // ── Segment lifecycle ──────────────────────────────────────────────────

    /// Create an open-ended recurring segment and return its new id.
    ///
    /// # Errors
    /// `InvalidPeriod`, `EmptyName`, or `AmbiguousSchedule` under
    /// [`ConflictPolicy::Reject`] when the recurrence collides with another
    /// segment's.
    pub fn create_segment(&mut self, name: &str, start: Timestamp, period: i64) -> Result<SegmentId> {
        let result = self.next_id().and_then(|id| {
            let segment = TimeSegment::new(id, name, start, period)?;
            self.admit(&segment)?;
            Ok(segment)
        });
        let segment = rejected("create_segment", result)?;
        let id = segment.id;
        self.last_id = id.get();
        info!(segment = %id, name = %segment.name, start, period, "segment created");
        self.segments.insert(id, segment);
        Ok(id)
    }

    /// Open a new recurrence version at `start`, closing the current one there.
    pub fn redefine_segment(&mut self, id: SegmentId, start: Timestamp, period: i64) -> Result<()> {
        let result = self.known(id).and_then(|segment| {
            let updated = segment.redefined(start, period)?;
            self.admit(&updated)?;
            Ok(updated)
        });
        let updated = rejected("redefine_segment", result)?;
        info!(segment = %id, start, period, versions = updated.versions().len(), "segment redefined");
        self.segments.insert(id, updated);
        Ok(())
    }

    /// Stop the segment's recurrence at `at`. Earlier instants are unaffected.
    pub fn retire_segment(&mut self, id: SegmentId, at: Timestamp) -> Result<()> {
        let result = self.known(id).and_then(|segment| segment.retired(at));
        let updated = rejected("retire_segment", result)?;
        info!(segment = %id, at, "segment retired");
        self.segments.insert(id, updated);
        Ok(())
    }

    /// Delete a segment nothing depends on.
    ///
    /// # Errors
    /// `UnknownSegment`, or `SegmentInUse` while override ranges or task
    /// bindings still reference it. Dependents are never removed implicitly.
    pub fn delete_segment<B>(&mut self, id: SegmentId, bindings: &B) -> Result<TimeSegment>
    where
        B: TaskBindings + ?Sized,
    {
        let result = self.known(id).and_then(|_| {
            let ranges = self.overrides.count_for(id);
            let tasks = bindings.bound_count(id);
            if ranges > 0 || tasks > 0 {
                return Err(SegmentError::SegmentInUse {
                    segment: id,
                    ranges,
                    tasks,
                });
            }
            Ok(())
        });
        rejected("delete_segment", result)?;
        info!(segment = %id, "segment deleted");
        self.segments
            .remove(&id)
            .ok_or(SegmentError::UnknownSegment(id))
    }

    // ── Override ranges ────────────────────────────────────────────────────

    /// Pin `[start, end)` to `segment_id`.
    ///
    /// Returns the stored range, which is wider than requested when it was
    /// coalesced with the same segment's neighbouring ranges.
    pub fn add_override_range(
        &mut self,
        segment_id: SegmentId,
        start: Timestamp,
        end: Timestamp,
    ) -> Result<OverrideRange> {
        let result = Interval::new(start, end).and_then(|interval| {
            self.known(segment_id)?;
            self.overrides.check_insert(segment_id, interval)?;
            Ok(interval)
        });
        let interval = rejected("add_override_range", result)?;
        let stored = self.overrides.insert(segment_id, interval)?;
        info!(segment = %segment_id, range = %stored.interval, "override range added");
        Ok(stored)
    }

    /// Carve `[start, end)` out of `segment_id`'s override ranges.
    pub fn remove_override_range(
        &mut self,
        segment_id: SegmentId,
        start: Timestamp,
        end: Timestamp,
    ) -> Result<()> {
        let result = Interval::new(start, end)
            .and_then(|interval| self.overrides.remove(segment_id, interval).map(|_| interval));
        let interval = rejected("remove_override_range", result)?;
        info!(segment = %segment_id, range = %interval, "override range removed");
        Ok(())
    }

    /// Remove every override range of a segment, e.g. ahead of deleting it.
    pub fn clear_overrides(&mut self, segment_id: SegmentId) -> Result<usize> {
        rejected("clear_overrides", self.known(segment_id).map(|_| ()))?;
        let removed = self.overrides.remove_all(segment_id);
        info!(segment = %segment_id, removed, "override ranges cleared");
        Ok(removed)
    }

    // ── Resolution ─────────────────────────────────────────────────────────

    /// The segment governing instant `t`.
    ///
    /// # Errors
    /// `AmbiguousSchedule` when no override applies and several recurrences
    /// cover `t`.
    pub fn resolve(&self, t: Timestamp) -> Result<Resolution> {
        if let Some(id) = self.overrides.override_at(t) {
            trace!(instant = t, segment = %id, "resolved by override");
            return Ok(Resolution::Segment(id));
        }
        let candidates = self.recurring_at(t);
        match candidates.as_slice() {
            [] => Ok(Resolution::Unassigned),
            [id] => {
                trace!(instant = t, segment = %id, "resolved by recurrence");
                Ok(Resolution::Segment(*id))
            }
            _ => {
                warn!(instant = t, candidates = ?candidates, "ambiguous schedule");
                Err(SegmentError::AmbiguousSchedule {
                    instant: t,
                    candidates,
                })
            }
        }
    }

    /// Partition `[lo, hi)` into maximal sub-intervals of constant resolution.
    ///
    /// Resolution can only change where an override range or a segment
    /// footprint starts or ends, so the cost depends on how many of those fall
    /// inside the window and never on recurrence periods. Conflicts are
    /// reported per span as [`SpanResolution::Ambiguous`]. An empty window
    /// (`lo == hi`) yields no spans.
    ///
    /// # Errors
    /// `InvalidRange` when `hi < lo`.
    pub fn resolve_range(&self, lo: Timestamp, hi: Timestamp) -> Result<Vec<ResolvedSpan>> {
        if lo == hi {
            return Ok(Vec::new());
        }
        let window = Interval::new(lo, hi)?;

        let mut cuts: BTreeSet<Timestamp> = BTreeSet::from([lo, hi]);
        let inside = |t: &Timestamp| lo < *t && *t < hi;
        for segment in self.segments.values() {
            cuts.extend(segment.boundaries().filter(inside));
        }
        for r in self.overrides.overlapping(window) {
            cuts.extend([r.interval.start, r.interval.end].into_iter().filter(inside));
        }

        let points: Vec<Timestamp> = cuts.into_iter().collect();
        let mut spans: Vec<ResolvedSpan> = Vec::new();
        for pair in points.windows(2) {
            let (start, end) = (pair[0], pair[1]);
            let resolution = self.span_resolution_at(start);
            if let Some(last) = spans.last_mut() {
                if last.resolution == resolution {
                    last.interval.end = end;
                    continue;
                }
            }
            spans.push(ResolvedSpan {
                interval: Interval { start, end },
                resolution,
            });
        }

        let ambiguous = spans
            .iter()
            .filter(|s| matches!(s.resolution, SpanResolution::Ambiguous(_)))
            .count();
        if ambiguous > 0 {
            warn!(window = %window, ambiguous, "timetable contains ambiguous spans");
        }
        debug!(window = %window, spans = spans.len(), "resolved range");
        Ok(spans)
    }

    /// Recurrence instances of one segment intersecting `[lo, hi)`, lazily.
    pub fn instances(
        &self,
        id: SegmentId,
        lo: Timestamp,
        hi: Timestamp,
    ) -> Result<impl DoubleEndedIterator<Item = RecurrenceInstance> + '_> {
        let window = Interval::new(lo, hi)?;
        Ok(self.known(id)?.instances_overlapping(window))
    }

    /// Every pair of segments whose recurrences claim the same instants.
    pub fn find_ambiguities(&self) -> Vec<Ambiguity> {
        conflict::find_ambiguities(self.segments.values())
    }

    // ── Task bindings ──────────────────────────────────────────────────────

    /// Check a task's raw `time_segment_id`; `0` (unassigned) is always valid.
    pub fn validate_binding(&self, time_segment_id: i64) -> Result<()> {
        binding::validate_binding(time_segment_id, |id| self.segments.contains_key(&id))
    }

    /// The raw ids among `time_segment_ids` that fail [`Self::validate_binding`],
    /// in input order.
    pub fn invalid_bindings<I>(&self, time_segment_ids: I) -> Vec<i64>
    where
        I: IntoIterator<Item = i64>,
    {
        time_segment_ids
            .into_iter()
            .filter(|&raw| self.validate_binding(raw).is_err())
            .collect()
    }

    // ── Internals ──────────────────────────────────────────────────────────

    /// Ids of segments whose recurrence covers `t`, ascending.
    fn recurring_at(&self, t: Timestamp) -> Vec<SegmentId> {
        self.segments
            .values()
            .filter(|s| s.covers(t))
            .map(|s| s.id)
            .collect()
    }

    fn span_resolution_at(&self, t: Timestamp) -> SpanResolution {
        if let Some(id) = self.overrides.override_at(t) {
            return SpanResolution::Segment(id);
        }
        let candidates = self.recurring_at(t);
        match candidates.as_slice() {
            [] => SpanResolution::Unassigned,
            [id] => SpanResolution::Segment(*id),
            _ => SpanResolution::Ambiguous(candidates),
        }
    }

    fn known(&self, id: SegmentId) -> Result<&TimeSegment> {
        self.segments
            .get(&id)
            .ok_or(SegmentError::UnknownSegment(id))
    }

    fn next_id(&self) -> Result<SegmentId> {
        self.last_id
            .checked_add(1)
            .and_then(SegmentId::new)
            .ok_or_else(|| SegmentError::InvalidRevision {
                segment: SegmentId::new(self.last_id).unwrap_or(SegmentId::MAX),
                reason: "segment id space exhausted".to_string(),
            })
    }

    /// Apply the configured conflict policy to a new or changed segment.
    fn admit(&self, candidate: &TimeSegment) -> Result<()> {
        self.admit_under(candidate, self.config.conflict_policy)
    }

    fn admit_under(&self, candidate: &TimeSegment, policy: ConflictPolicy) -> Result<()> {
        for other in self.segments.values().filter(|s| s.id != candidate.id) {
            let Some(overlap) = conflict::first_overlap(candidate, other) else {
                continue;
            };
            let mut candidates = vec![other.id, candidate.id];
            candidates.sort();
            match policy {
                ConflictPolicy::Reject => {
                    return Err(SegmentError::AmbiguousSchedule {
                        instant: overlap.start,
                        candidates,
                    });
                }
                ConflictPolicy::Defer => {
                    warn!(
                        segment = %candidate.id,
                        other = %other.id,
                        overlap = %overlap,
                        "recurrences overlap; resolution will report an ambiguous schedule"
                    );
                }
            }
        }
        Ok(())
    }

    /// Register a segment rebuilt from storage, keeping its id.
    ///
    /// Stored overlaps are accepted whatever the policy: the policy gates new
    /// mutations, and `resolve` and `find_ambiguities` report what was stored.
    pub(crate) fn restore_segment(&mut self, segment: TimeSegment) -> Result<()> {
        if self.segments.contains_key(&segment.id) {
            return Err(SegmentError::DuplicateSegment(segment.id));
        }
        self.admit_under(&segment, ConflictPolicy::Defer)?;
        self.reserve_ids(segment.id.get());
        self.segments.insert(segment.id, segment);
        Ok(())
    }

    /// Highest id ever issued, including ids of deleted segments.
    pub(crate) fn last_issued_id(&self) -> i64 {
        self.last_id
    }

    /// Never issue `last` or any id below it again.
    pub(crate) fn reserve_ids(&mut self, last: i64) {
        self.last_id = self.last_id.max(last);
    }
}

/// Log a rejected mutation and pass the result through.
fn rejected<T>(operation: &'static str, result: Result<T>) -> Result<T> {
    if let Err(err) = &result {
        warn!(operation, error = %err, "mutation rejected");
    }
    result
}
