//! The `TimeSegment` entity and its recurrence history.
//!
//! A segment keeps an ordered list of [`Recurrence`] versions. Versions never
//! overlap and only the last one may be open-ended. Changing a segment's rule
//! closes the current version and appends a new one, so instants before the
//! change keep resolving exactly as they did.

use serde::Serialize;

use crate::error::{Result, SegmentError};
use crate::recurrence::{Recurrence, RecurrenceInstance};
use crate::types::{Interval, SegmentId, Timestamp};

/// A named recurring time window. Deserialization goes through
/// [`TimeSegment::from_versions`] so stored data is re-validated.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct TimeSegment {
    pub id: SegmentId,
    pub name: String,
    versions: Vec<Recurrence>,
}

impl TimeSegment {
    /// Build a single-version, open-ended segment.
    pub fn new(id: SegmentId, name: &str, start: Timestamp, period: i64) -> Result<Self> {
        if name.trim().is_empty() {
            return Err(SegmentError::EmptyName);
        }
        Ok(TimeSegment {
            id,
            name: name.to_string(),
            versions: vec![Recurrence::new(start, period)?],
        })
    }

    /// Rebuild a segment from stored versions (sorted here by start).
    pub fn from_versions(id: SegmentId, name: &str, mut versions: Vec<Recurrence>) -> Result<Self> {
        if name.trim().is_empty() {
            return Err(SegmentError::EmptyName);
        }
        versions.sort_by_key(|v| v.start);
        if versions.is_empty() {
            return Err(SegmentError::InvalidRevision {
                segment: id,
                reason: "a segment needs at least one recurrence version".to_string(),
            });
        }
        for v in &versions {
            Recurrence::new(v.start, v.period)?;
            if let Some(until) = v.until {
                Interval::new(v.start, until)?;
            }
        }
        for pair in versions.windows(2) {
            match pair[0].until {
                Some(until) if until <= pair[1].start => {}
                _ => {
                    return Err(SegmentError::InvalidRevision {
                        segment: id,
                        reason: format!(
                            "version starting at {} overlaps the version starting at {}",
                            pair[0].start, pair[1].start
                        ),
                    })
                }
            }
        }
        Ok(TimeSegment {
            id,
            name: name.to_string(),
            versions,
        })
    }

    pub fn versions(&self) -> &[Recurrence] {
        &self.versions
    }

    /// The most recent recurrence version.
    pub fn current(&self) -> &Recurrence {
        // `new`/`from_versions` guarantee at least one version.
        &self.versions[self.versions.len() - 1]
    }

    /// Origin of the first version.
    pub fn start(&self) -> Timestamp {
        self.versions[0].start
    }

    /// Period of the most recent version.
    pub fn period(&self) -> i64 {
        self.current().period
    }

    pub fn is_retired(&self) -> bool {
        !self.current().is_open()
    }

    /// The version governing `t`, if any.
    pub fn version_at(&self, t: Timestamp) -> Option<&Recurrence> {
        let idx = self.versions.partition_point(|v| v.start <= t);
        idx.checked_sub(1)
            .map(|i| &self.versions[i])
            .filter(|v| v.covers(t))
    }

    /// Whether some recurrence instance of this segment covers `t`.
    pub fn covers(&self, t: Timestamp) -> bool {
        self.version_at(t).is_some()
    }

    pub fn instance_at(&self, t: Timestamp) -> Option<RecurrenceInstance> {
        self.version_at(t).and_then(|v| v.instance_at(t))
    }

    /// Instances of every version that intersect `query`, in time order.
    pub fn instances_overlapping(
        &self,
        query: Interval,
    ) -> impl DoubleEndedIterator<Item = RecurrenceInstance> + '_ {
        self.versions
            .iter()
            .filter(move |v| v.window().overlaps(&query))
            .flat_map(move |v| v.instances_overlapping(query))
    }

    /// Merged windows during which this segment's recurrence is authoritative.
    pub fn footprint(&self) -> Vec<Interval> {
        let mut merged: Vec<Interval> = Vec::with_capacity(self.versions.len());
        for window in self.versions.iter().map(Recurrence::window) {
            if let Some(last) = merged.last_mut() {
                if window.start <= last.end {
                    last.end = last.end.max(window.end);
                    continue;
                }
            }
            merged.push(window);
        }
        merged
    }

    /// Instants at which coverage by this segment may start or stop.
    pub(crate) fn boundaries(&self) -> impl Iterator<Item = Timestamp> + '_ {
        self.footprint()
            .into_iter()
            .flat_map(|w| [w.start, w.end])
    }

    /// Copy of this segment with a new version opened at `start`.
    ///
    /// An open current version is closed at `start`. A retired segment may be
    /// reopened at or after its retirement instant.
    pub fn redefined(&self, start: Timestamp, period: i64) -> Result<TimeSegment> {
        let next = Recurrence::new(start, period)?;
        let current = self.current();
        if start <= current.start {
            return Err(self.revision_error(format!(
                "new version must start after {} (got {})",
                current.start, start
            )));
        }
        if let Some(until) = current.until {
            if start < until {
                return Err(self.revision_error(format!(
                    "segment is retired at {}; a new version cannot start before that (got {})",
                    until, start
                )));
            }
        }
        let mut updated = self.clone();
        let last = updated.versions.len() - 1;
        if updated.versions[last].until.is_none() {
            updated.versions[last].until = Some(start);
        }
        updated.versions.push(next);
        Ok(updated)
    }

    /// Copy of this segment whose current version stops at `at`.
    pub fn retired(&self, at: Timestamp) -> Result<TimeSegment> {
        let current = self.current();
        if let Some(until) = current.until {
            return Err(self.revision_error(format!("segment already retired at {}", until)));
        }
        if at <= current.start {
            return Err(self.revision_error(format!(
                "retirement must be after the current version's start {} (got {})",
                current.start, at
            )));
        }
        let mut updated = self.clone();
        let last = updated.versions.len() - 1;
        updated.versions[last].until = Some(at);
        Ok(updated)
    }

    fn revision_error(&self, reason: String) -> SegmentError {
        SegmentError::InvalidRevision {
            segment: self.id,
            reason,
        }
    }
}
