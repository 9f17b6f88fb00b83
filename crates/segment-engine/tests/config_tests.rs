//! Tests for engine configuration and task binding validation.

use std::collections::HashMap;

use segment_engine::{
    validate_binding, ConflictPolicy, EngineConfig, NoBindings, SegmentError, SegmentId,
    TaskBindings,
};

// ── Config ──────────────────────────────────────────────────────────────────

#[test]
fn empty_document_uses_defaults() {
    let config = EngineConfig::from_json("{}").unwrap();
    assert_eq!(config.conflict_policy, ConflictPolicy::Reject);
}

#[test]
fn policy_parses_snake_case() {
    let config = EngineConfig::from_json(r#"{"conflict_policy":"defer"}"#).unwrap();
    assert_eq!(config, EngineConfig::with_policy(ConflictPolicy::Defer));
    assert!(EngineConfig::from_json(r#"{"conflict_policy":"lowest_id"}"#).is_err());
}

// ── Bindings ────────────────────────────────────────────────────────────────

#[test]
fn sentinel_is_valid_even_with_no_segments() {
    assert!(validate_binding(0, |_| false).is_ok());
}

#[test]
fn unknown_and_negative_ids_are_invalid() {
    assert!(matches!(
        validate_binding(-1, |_| true),
        Err(SegmentError::InvalidSegment(-1))
    ));
    assert!(matches!(
        validate_binding(5, |_| false),
        Err(SegmentError::InvalidSegment(5))
    ));
    assert!(validate_binding(5, |id| id.get() == 5).is_ok());
}

#[test]
fn binding_views_count_matching_tasks() {
    let three = SegmentId::new(3).unwrap();
    let rows: &[i64] = &[0, 3, 3, 4];
    assert_eq!(rows.bound_count(three), 2);
    assert_eq!(rows.to_vec().bound_count(three), 2);
    assert_eq!(NoBindings.bound_count(three), 0);

    let counts = HashMap::from([(three, 7usize)]);
    assert_eq!(counts.bound_count(three), 7);
    assert_eq!(counts.bound_count(SegmentId::new(4).unwrap()), 0);
}
