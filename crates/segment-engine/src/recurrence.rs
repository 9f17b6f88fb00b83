//! Recurrence evaluation: which periodic instance of a segment covers an
//! instant, and which instances intersect a window.
//!
//! Instance `k` of a recurrence covers `[start + k*period, start + (k+1)*period)`.
//! Instants before `start` are never covered. All index math is done by
//! division in 128-bit space, so evaluating a window never steps through
//! instances outside it, whatever the ratio of window length to period.

use serde::{Deserialize, Serialize};

use crate::error::{Result, SegmentError};
use crate::types::{Interval, Timestamp, FOREVER};

/// One version of a segment's periodic rule, active on `[start, until)`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Recurrence {
    pub start: Timestamp,
    pub period: i64,
    /// Closing instant of this version. `None` while the version is current.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub until: Option<Timestamp>,
}

/// A concrete occurrence of a recurrence.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct RecurrenceInstance {
    pub index: u64,
    pub interval: Interval,
}

impl Recurrence {
    /// An open-ended recurrence starting at `start`.
    ///
    /// # Errors
    /// Returns `SegmentError::InvalidPeriod` if `period <= 0`.
    pub fn new(start: Timestamp, period: i64) -> Result<Self> {
        if period <= 0 {
            return Err(SegmentError::InvalidPeriod(period));
        }
        Ok(Recurrence {
            start,
            period,
            until: None,
        })
    }

    /// A recurrence that stops covering instants at `until`.
    pub fn bounded(start: Timestamp, period: i64, until: Timestamp) -> Result<Self> {
        let mut rec = Recurrence::new(start, period)?;
        Interval::new(start, until)?;
        rec.until = Some(until);
        Ok(rec)
    }

    /// The span this version is authoritative for.
    pub fn window(&self) -> Interval {
        Interval {
            start: self.start,
            end: self.until.unwrap_or(FOREVER),
        }
    }

    pub fn is_open(&self) -> bool {
        self.until.is_none()
    }

    /// Index of the instance covering `t`, or `None` outside the window.
    pub fn instance_index(&self, t: Timestamp) -> Option<u64> {
        if !self.covers(t) {
            return None;
        }
        Some(self.index_unchecked(t))
    }

    /// Whether any instance of this recurrence covers `t`.
    ///
    /// Checked against `until` directly: the `FOREVER` end of an open
    /// [`Self::window`] is exclusive, but an open version covers `i64::MAX`.
    pub fn covers(&self, t: Timestamp) -> bool {
        t >= self.start && self.until.is_none_or(|until| t < until)
    }

    /// Bounds of instance `index`. The last instance of a closed version is
    /// truncated at `until`.
    pub fn instance(&self, index: u64) -> RecurrenceInstance {
        let lo = self.start as i128 + index as i128 * self.period as i128;
        let hi = lo + self.period as i128;
        let start = clamp_i64(lo.max(self.start as i128));
        let end = match self.until {
            Some(until) => clamp_i64(hi.min(until as i128)),
            None => clamp_i64(hi),
        };
        RecurrenceInstance {
            index,
            interval: Interval { start, end },
        }
    }

    /// The instance covering `t`, if any.
    pub fn instance_at(&self, t: Timestamp) -> Option<RecurrenceInstance> {
        self.instance_index(t).map(|k| self.instance(k))
    }

    /// Lazily enumerate the instances intersecting `query`.
    ///
    /// Only the index range `[first, last]` whose instances meet `query` is
    /// ever visited; both bounds are computed arithmetically.
    pub fn instances_overlapping(&self, query: Interval) -> Instances {
        match self.window().intersect(&query) {
            Some(clipped) => Instances {
                recurrence: *self,
                next: self.index_unchecked(clipped.start),
                end: self.index_unchecked(clipped.end - 1) + 1,
            },
            None => Instances {
                recurrence: *self,
                next: 0,
                end: 0,
            },
        }
    }

    fn index_unchecked(&self, t: Timestamp) -> u64 {
        ((t as i128 - self.start as i128) / self.period as i128) as u64
    }
}

fn clamp_i64(v: i128) -> i64 {
    v.clamp(i64::MIN as i128, i64::MAX as i128) as i64
}

/// Iterator returned by [`Recurrence::instances_overlapping`].
#[derive(Debug, Clone)]
pub struct Instances {
    recurrence: Recurrence,
    next: u64,
    end: u64,
}

impl Iterator for Instances {
    type Item = RecurrenceInstance;

    fn next(&mut self) -> Option<Self::Item> {
        if self.next >= self.end {
            return None;
        }
        let instance = self.recurrence.instance(self.next);
        self.next += 1;
        Some(instance)
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        let remaining = self.end.saturating_sub(self.next);
        match usize::try_from(remaining) {
            Ok(n) => (n, Some(n)),
            Err(_) => (usize::MAX, None),
        }
    }

    fn nth(&mut self, n: usize) -> Option<Self::Item> {
        self.next = self.next.saturating_add(n as u64).min(self.end);
        self.next()
    }
}

impl DoubleEndedIterator for Instances {
    fn next_back(&mut self) -> Option<Self::Item> {
        if self.next >= self.end {
            return None;
        }
        self.end -= 1;
        Some(self.recurrence.instance(self.end))
    }
}

impl std::iter::FusedIterator for Instances {}
