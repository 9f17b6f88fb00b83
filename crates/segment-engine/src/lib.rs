//! # segment-engine
//!
//! Resolves which recurring time segment (shift, window, cycle) governs an
//! instant or a range of instants.
//!
//! A segment recurs every `period` seconds from its `start`. Explicit override
//! ranges pin an interval to one segment and always beat recurrence. When two
//! recurrences claim the same instant the engine reports an
//! `AmbiguousSchedule` instead of picking one. There is no precedence rule
//! between recurrences.
//!
//! ```rust
//! use segment_engine::{ConflictPolicy, EngineConfig, Resolution, Schedule};
//!
//! let mut schedule = Schedule::new(EngineConfig::with_policy(ConflictPolicy::Defer));
//! let hourly = schedule.create_segment("hourly", 1_000, 3_600).unwrap();
//! let night = schedule.create_segment("night", 1_000_000, 3_600).unwrap();
//! schedule.add_override_range(night, 2_000, 2_500).unwrap();
//!
//! assert_eq!(schedule.resolve(999).unwrap(), Resolution::Unassigned);
//! assert_eq!(schedule.resolve(2_200).unwrap(), Resolution::Segment(night));
//! assert_eq!(schedule.resolve(2_600).unwrap(), Resolution::Segment(hourly));
//! ```
//!
//! ## Modules
//!
//! - [`recurrence`]: instance arithmetic for one periodic rule
//! - [`segment`]: `TimeSegment` and its versioned recurrence history
//! - [`overrides`]: override range store with the no-cross-segment-overlap invariant
//! - [`resolver`]: `Schedule`, point and range resolution, segment lifecycle
//! - [`binding`]: task `time_segment_id` validation
//! - [`conflict`]: pairwise ambiguity audit
//! - [`snapshot`]: persisted row layout and the load/save port
//! - [`shared`]: lock-guarded handle for concurrent readers
//! - [`config`]: conflict policy
//! - [`error`]: Error types

pub mod binding;
pub mod config;
pub mod conflict;
pub mod error;
pub mod overrides;
pub mod recurrence;
pub mod resolver;
pub mod segment;
pub mod shared;
pub mod snapshot;
pub mod types;

pub use binding::{validate_binding, NoBindings, TaskBindings};
pub use config::{ConflictPolicy, EngineConfig};
pub use conflict::{find_ambiguities, Ambiguity};
pub use error::SegmentError;
pub use overrides::{OverrideRange, OverrideStore};
pub use recurrence::{Recurrence, RecurrenceInstance};
pub use resolver::Schedule;
pub use segment::TimeSegment;
pub use shared::SharedSchedule;
pub use snapshot::{JsonFileStore, MemorySnapshotStore, ScheduleSnapshot, SnapshotStore};
pub use types::{Interval, Resolution, ResolvedSpan, SegmentId, SpanResolution, Timestamp};
