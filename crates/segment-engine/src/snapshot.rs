//! Persisted state layout and the load/save port.
//!
//! The engine does not own storage. A collaborator hands it a
//! [`ScheduleSnapshot`] (rows shaped like the persisted tables) and takes one
//! back after mutations. Loading re-validates every invariant, so a hand-edited
//! or corrupted snapshot is rejected rather than resolved incorrectly.

use std::collections::BTreeMap;
use std::fs;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use std::sync::Mutex;

use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use crate::config::EngineConfig;
use crate::error::{Result, SegmentError};
use crate::recurrence::Recurrence;
use crate::resolver::Schedule;
use crate::segment::TimeSegment;
use crate::types::{SegmentId, Timestamp};

/// One recurrence version of a segment. A segment that was never redefined
/// is a single row `{id, name, start, period}`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SegmentRow {
    pub id: i64,
    pub name: String,
    pub start: Timestamp,
    pub period: i64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub until: Option<Timestamp>,
}

/// An override range. Ranges have no identity of their own.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct RangeRow {
    pub segment_id: i64,
    pub start: Timestamp,
    pub end: Timestamp,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ScheduleSnapshot {
    #[serde(default)]
    pub segments: Vec<SegmentRow>,
    #[serde(default)]
    pub ranges: Vec<RangeRow>,
    /// Id the next created segment receives. Deleted segments' ids stay
    /// below it, so they are never reissued. `0` when unknown.
    #[serde(default)]
    pub next_id: i64,
}

impl ScheduleSnapshot {
    pub fn from_json(json: &str) -> Result<Self> {
        Ok(serde_json::from_str(json)?)
    }

    pub fn to_json(&self) -> Result<String> {
        Ok(serde_json::to_string_pretty(self)?)
    }
}

impl Schedule {
    /// Export the current state as persistable rows.
    pub fn snapshot(&self) -> ScheduleSnapshot {
        let segments = self
            .segments()
            .flat_map(|s| {
                s.versions().iter().map(move |v| SegmentRow {
                    id: s.id.get(),
                    name: s.name.clone(),
                    start: v.start,
                    period: v.period,
                    until: v.until,
                })
            })
            .collect();
        let ranges = self
            .overrides()
            .iter()
            .map(|r| RangeRow {
                segment_id: r.segment_id.get(),
                start: r.interval.start,
                end: r.interval.end,
            })
            .collect();
        ScheduleSnapshot {
            segments,
            ranges,
            next_id: self.last_issued_id().saturating_add(1),
        }
    }

    /// Rebuild a schedule from stored rows, keeping segment ids.
    ///
    /// Rows sharing an id are versions of one segment and must share its name
    /// (`InvalidRevision` otherwise). Stored segments are accepted even where
    /// their recurrences overlap; `config`'s policy applies to later
    /// mutations. Ranges go through the same checks as
    /// [`Schedule::add_override_range`]. New ids continue after both
    /// `next_id` and the largest stored id.
    pub fn from_snapshot(snapshot: &ScheduleSnapshot, config: EngineConfig) -> Result<Self> {
        let mut grouped: BTreeMap<SegmentId, (&str, Vec<Recurrence>)> = BTreeMap::new();
        for row in &snapshot.segments {
            let id = SegmentId::try_from(row.id)?;
            let entry = grouped
                .entry(id)
                .or_insert_with(|| (row.name.as_str(), Vec::new()));
            if entry.0 != row.name {
                return Err(SegmentError::InvalidRevision {
                    segment: id,
                    reason: format!(
                        "version rows disagree on the name ('{}' vs '{}')",
                        entry.0, row.name
                    ),
                });
            }
            entry.1.push(Recurrence {
                start: row.start,
                period: row.period,
                until: row.until,
            });
        }

        let mut schedule = Schedule::new(config);
        schedule.reserve_ids(snapshot.next_id.saturating_sub(1));
        for (id, (name, versions)) in grouped {
            schedule.restore_segment(TimeSegment::from_versions(id, name, versions)?)?;
        }
        for row in &snapshot.ranges {
            let id = SegmentId::new(row.segment_id)
                .ok_or(SegmentError::InvalidSegment(row.segment_id))?;
            schedule.add_override_range(id, row.start, row.end)?;
        }
        debug!(
            segments = snapshot.segments.len(),
            ranges = snapshot.ranges.len(),
            "schedule restored from snapshot"
        );
        Ok(schedule)
    }
}

/// Load/save port implemented by whatever persists the schedule.
pub trait SnapshotStore {
    fn load(&self) -> Result<ScheduleSnapshot>;
    fn save(&self, snapshot: &ScheduleSnapshot) -> Result<()>;
}

/// Pretty-printed JSON document on disk. A missing file loads as empty.
#[derive(Debug, Clone)]
pub struct JsonFileStore {
    path: PathBuf,
}

impl JsonFileStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        JsonFileStore { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl SnapshotStore for JsonFileStore {
    fn load(&self) -> Result<ScheduleSnapshot> {
        match fs::read_to_string(&self.path) {
            Ok(json) => ScheduleSnapshot::from_json(&json),
            Err(err) if err.kind() == ErrorKind::NotFound => {
                debug!(path = %self.path.display(), "no snapshot file, starting empty");
                Ok(ScheduleSnapshot::default())
            }
            Err(err) => Err(err.into()),
        }
    }

    fn save(&self, snapshot: &ScheduleSnapshot) -> Result<()> {
        let json = snapshot.to_json()?;
        // Replace the target with a rename; never truncate it in place.
        let tmp = self.path.with_extension("json.tmp");
        fs::write(&tmp, json)?;
        fs::rename(&tmp, &self.path)?;
        info!(
            path = %self.path.display(),
            segments = snapshot.segments.len(),
            ranges = snapshot.ranges.len(),
            "snapshot saved"
        );
        Ok(())
    }
}

/// In-process store, mostly for tests and embedding.
#[derive(Debug, Default)]
pub struct MemorySnapshotStore {
    inner: Mutex<ScheduleSnapshot>,
}

impl MemorySnapshotStore {
    pub fn new(snapshot: ScheduleSnapshot) -> Self {
        MemorySnapshotStore {
            inner: Mutex::new(snapshot),
        }
    }
}

impl SnapshotStore for MemorySnapshotStore {
    fn load(&self) -> Result<ScheduleSnapshot> {
        Ok(self
            .inner
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .clone())
    }

    fn save(&self, snapshot: &ScheduleSnapshot) -> Result<()> {
        *self
            .inner
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner()) = snapshot.clone();
        Ok(())
    }
}
