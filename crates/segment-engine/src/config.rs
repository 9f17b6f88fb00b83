//! Engine configuration.

use serde::{Deserialize, Serialize};

use crate::error::Result;

/// What to do when a new or changed segment's recurrence would claim instants
/// another segment already claims.
///
/// No option picks a winner: ambiguous instants are always reported, either
/// up front or when resolved. The policy gates mutations only; a loaded
/// snapshot is taken as stored.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ConflictPolicy {
    /// Refuse the mutation with `AmbiguousSchedule`.
    #[default]
    Reject,
    /// Accept the mutation and log a warning; resolution reports the conflict.
    Defer,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct EngineConfig {
    pub conflict_policy: ConflictPolicy,
}

impl EngineConfig {
    pub fn with_policy(conflict_policy: ConflictPolicy) -> Self {
        EngineConfig { conflict_policy }
    }

    /// Parse a JSON config document. Missing fields take their defaults.
    pub fn from_json(json: &str) -> Result<Self> {
        Ok(serde_json::from_str(json)?)
    }
}
