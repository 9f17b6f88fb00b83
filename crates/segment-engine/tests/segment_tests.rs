//! Tests for `TimeSegment` recurrence versions.

use segment_engine::recurrence::Recurrence;
use segment_engine::{Interval, SegmentError, SegmentId, TimeSegment};

fn id(raw: i64) -> SegmentId {
    SegmentId::new(raw).unwrap()
}

fn iv(start: i64, end: i64) -> Interval {
    Interval::new(start, end).unwrap()
}

fn shift(start: i64, period: i64) -> TimeSegment {
    TimeSegment::new(id(1), "shift", start, period).unwrap()
}

// ── Construction ────────────────────────────────────────────────────────────

#[test]
fn blank_name_rejected() {
    assert!(matches!(
        TimeSegment::new(id(1), "  ", 0, 10),
        Err(SegmentError::EmptyName)
    ));
}

#[test]
fn stored_versions_must_not_overlap() {
    let versions = vec![
        Recurrence::new(0, 10).unwrap(),
        Recurrence::new(50, 10).unwrap(),
    ];
    assert!(matches!(
        TimeSegment::from_versions(id(1), "x", versions),
        Err(SegmentError::InvalidRevision { .. })
    ));
}

#[test]
fn stored_versions_are_sorted_by_start() {
    let versions = vec![
        Recurrence::new(50, 5).unwrap(),
        Recurrence::bounded(0, 10, 50).unwrap(),
    ];
    let seg = TimeSegment::from_versions(id(1), "x", versions).unwrap();
    assert_eq!(seg.start(), 0);
    assert_eq!(seg.period(), 5);
}

// ── Versioning ──────────────────────────────────────────────────────────────

#[test]
fn redefinition_keeps_history() {
    let seg = shift(0, 10).redefined(95, 20).unwrap();

    // Before the change: old 10-unit instances, the last one cut at 95.
    assert_eq!(seg.instance_at(94).map(|i| i.interval), Some(iv(90, 95)));
    // After: new 20-unit instances anchored at 95.
    assert_eq!(seg.instance_at(120).map(|i| i.interval), Some(iv(115, 135)));
    assert_eq!(seg.footprint(), vec![Interval::from_start(0)]);
}

#[test]
fn redefinition_cannot_rewrite_the_past() {
    let seg = shift(100, 10);
    assert!(matches!(
        seg.redefined(100, 5),
        Err(SegmentError::InvalidRevision { .. })
    ));
    assert!(matches!(
        seg.redefined(50, 5),
        Err(SegmentError::InvalidRevision { .. })
    ));
}

#[test]
fn retired_segment_stops_covering() {
    let seg = shift(0, 10).retired(35).unwrap();
    assert!(seg.is_retired());
    assert!(seg.covers(34));
    assert!(!seg.covers(35));
    assert_eq!(seg.instance_at(34).map(|i| i.interval), Some(iv(30, 35)));
    assert!(seg.retired(50).is_err());
}

#[test]
fn reopened_segment_has_gap_in_footprint() {
    let seg = shift(0, 10)
        .retired(30)
        .unwrap()
        .redefined(50, 10)
        .unwrap();
    assert_eq!(
        seg.footprint(),
        vec![iv(0, 30), Interval::from_start(50)]
    );
    assert!(!seg.covers(40));
    let starts: Vec<_> = seg
        .instances_overlapping(iv(20, 70))
        .map(|i| i.interval.start)
        .collect();
    assert_eq!(starts, vec![20, 50, 60]);
}

#[test]
fn reopening_before_retirement_is_rejected() {
    let seg = shift(0, 10).retired(30).unwrap();
    assert!(matches!(
        seg.redefined(20, 10),
        Err(SegmentError::InvalidRevision { .. })
    ));
    assert!(seg.redefined(30, 10).is_ok());
}
