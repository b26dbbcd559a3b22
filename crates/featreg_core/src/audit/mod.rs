//! Version and audit tracking.
//!
//! # Responsibility
//! - Assign per-object versions and commit timestamps.
//! - Describe the append-only change history written with every commit.
//!
//! # Invariants
//! - Versions strictly increase per `(kind, project, name)` identity,
//!   including across delete and re-create.
//! - No-op applies never reach the tracker.

pub mod tracker;

use crate::model::ObjectKind;
use serde::{Deserialize, Serialize};

pub use tracker::{Clock, SystemClock, VersionStamp, VersionTracker};

/// What a committed version did to the object.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ChangeType {
    Create,
    Update,
    Delete,
}

impl ChangeType {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Create => "create",
            Self::Update => "update",
            Self::Delete => "delete",
        }
    }

    pub fn parse(value: &str) -> Option<Self> {
        match value {
            "create" => Some(Self::Create),
            "update" => Some(Self::Update),
            "delete" => Some(Self::Delete),
            _ => None,
        }
    }
}

/// One committed version of an object, as recorded in `object_history`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct HistoryEntry {
    pub kind: ObjectKind,
    pub project: String,
    pub name: String,
    pub version: u64,
    pub change: ChangeType,
    /// Canonical JSON of the spec at this version.
    pub spec_json: String,
    /// Epoch ms.
    pub committed_at: i64,
}
