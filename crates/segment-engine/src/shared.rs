//! Thread-shareable handle around a [`Schedule`].
//!
//! Resolutions take the read lock and run in parallel. Mutations take the
//! write lock for their whole validate-then-commit sequence, so a reader
//! never observes a half-applied change.

use std::sync::{Arc, PoisonError, RwLock, RwLockReadGuard, RwLockWriteGuard};

use crate::binding::TaskBindings;
use crate::config::EngineConfig;
use crate::error::Result;
use crate::overrides::OverrideRange;
use crate::resolver::Schedule;
use crate::snapshot::{ScheduleSnapshot, SnapshotStore};
use crate::types::{Resolution, ResolvedSpan, SegmentId, Timestamp};

#[derive(Debug, Clone, Default)]
pub struct SharedSchedule {
    inner: Arc<RwLock<Schedule>>,
}

impl SharedSchedule {
    pub fn new(schedule: Schedule) -> Self {
        SharedSchedule {
            inner: Arc::new(RwLock::new(schedule)),
        }
    }

    /// Load a schedule through `store`.
    pub fn load<S: SnapshotStore + ?Sized>(store: &S, config: EngineConfig) -> Result<Self> {
        let snapshot = store.load()?;
        Ok(SharedSchedule::new(Schedule::from_snapshot(&snapshot, config)?))
    }

    /// Persist a consistent snapshot through `store`.
    pub fn save<S: SnapshotStore + ?Sized>(&self, store: &S) -> Result<()> {
        let snapshot = self.snapshot();
        store.save(&snapshot)
    }

    // Mutations are validated before anything is written, so a poisoned lock
    // still guards a consistent schedule.
    fn read_guard(&self) -> RwLockReadGuard<'_, Schedule> {
        self.inner.read().unwrap_or_else(PoisonError::into_inner)
    }

    fn write_guard(&self) -> RwLockWriteGuard<'_, Schedule> {
        self.inner.write().unwrap_or_else(PoisonError::into_inner)
    }

    /// Run `f` against a consistent view.
    pub fn read<R>(&self, f: impl FnOnce(&Schedule) -> R) -> R {
        f(&self.read_guard())
    }

    /// Run `f` with exclusive access.
    pub fn write<R>(&self, f: impl FnOnce(&mut Schedule) -> R) -> R {
        f(&mut self.write_guard())
    }

    pub fn snapshot(&self) -> ScheduleSnapshot {
        self.read(Schedule::snapshot)
    }

    pub fn resolve(&self, t: Timestamp) -> Result<Resolution> {
        self.read(|s| s.resolve(t))
    }

    pub fn resolve_range(&self, lo: Timestamp, hi: Timestamp) -> Result<Vec<ResolvedSpan>> {
        self.read(|s| s.resolve_range(lo, hi))
    }

    pub fn validate_binding(&self, time_segment_id: i64) -> Result<()> {
        self.read(|s| s.validate_binding(time_segment_id))
    }

    pub fn create_segment(&self, name: &str, start: Timestamp, period: i64) -> Result<SegmentId> {
        self.write(|s| s.create_segment(name, start, period))
    }

    pub fn delete_segment<B>(&self, id: SegmentId, bindings: &B) -> Result<()>
    where
        B: TaskBindings + ?Sized,
    {
        self.write(|s| s.delete_segment(id, bindings).map(|_| ()))
    }

    pub fn add_override_range(
        &self,
        segment_id: SegmentId,
        start: Timestamp,
        end: Timestamp,
    ) -> Result<OverrideRange> {
        self.write(|s| s.add_override_range(segment_id, start, end))
    }

    pub fn remove_override_range(
        &self,
        segment_id: SegmentId,
        start: Timestamp,
        end: Timestamp,
    ) -> Result<()> {
        self.write(|s| s.remove_override_range(segment_id, start, end))
    }
}
