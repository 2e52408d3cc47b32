//! Structural diff between import batches
//!
//! Compares candidate-event sets from two batches (or one batch against the
//! Event Store) for admin review before confirm/undo decisions.

use std::fmt;

use serde::{Deserialize, Serialize};

use super::import::CandidateEvent;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DiffKind {
    Added,
    Removed,
    Changed,
}

impl fmt::Display for DiffKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            DiffKind::Added => write!(f, "+"),
            DiffKind::Removed => write!(f, "-"),
            DiffKind::Changed => write!(f, "~"),
        }
    }
}

/// One entry of a batch comparison
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CandidateDiff {
    pub kind: DiffKind,
    /// Identity key the two sides were matched on.
    pub key: String,
    pub before: Option<CandidateEvent>,
    pub after: Option<CandidateEvent>,
    /// Field names that differ, populated for `Changed` entries.
    pub changed_fields: Vec<String>,
}

/// Result of comparing two candidate-event sets
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct BatchComparison {
    pub added: usize,
    pub removed: usize,
    pub changed: usize,
    pub entries: Vec<CandidateDiff>,
}
