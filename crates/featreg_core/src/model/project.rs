//! Project (namespace) model.
//!
//! # Invariants
//! - Project names are globally unique.
//! - `archived` only ever flips from `false` to `true`.

use serde::{Deserialize, Serialize};

/// Namespace used when a request leaves the project empty.
pub const DEFAULT_PROJECT: &str = "default";

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Project {
    pub name: String,
    pub archived: bool,
    /// Epoch ms.
    pub created_at: i64,
}

impl Project {
    pub fn new(name: impl Into<String>, created_at: i64) -> Self {
        Self {
            name: name.into(),
            archived: false,
            created_at,
        }
    }

    pub fn is_active(&self) -> bool {
        !self.archived
    }
}

/// Maps an empty or blank project reference to [`DEFAULT_PROJECT`].
pub fn project_or_default(name: &str) -> &str {
    let trimmed = name.trim();
    if trimmed.is_empty() {
        DEFAULT_PROJECT
    } else {
        trimmed
    }
}
