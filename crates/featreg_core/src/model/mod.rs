//! Registry domain model.
//!
//! # Responsibility
//! - Define the spec shapes clients submit (entity, feature table, store).
//! - Define the versioned envelope the registry returns for stored objects.
//! - Own well-formedness validation for every object kind.
//!
//! # Invariants
//! - Object identity is `(kind, project, name)`; stores use the empty scope.
//! - Specs are canonicalized before comparison and persistence, so two specs
//!   that mean the same thing serialize to the same bytes.
//! - Deletion is represented by a tombstone flag on the stored record.

pub mod entity;
pub mod feature_table;
pub mod project;
pub mod store;
pub mod validation;
pub mod value_type;

use self::validation::SpecValidationError;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};

/// Registry object kinds that go through the apply engine.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ObjectKind {
    Entity,
    FeatureTable,
    Store,
}

impl ObjectKind {
    /// Stable storage/wire name.
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Entity => "entity",
            Self::FeatureTable => "feature_table",
            Self::Store => "store",
        }
    }

    pub fn parse(value: &str) -> Option<Self> {
        match value {
            "entity" => Some(Self::Entity),
            "feature_table" => Some(Self::FeatureTable),
            "store" => Some(Self::Store),
            _ => None,
        }
    }

    /// Whether objects of this kind live inside a project namespace.
    ///
    /// Stores are global; they reach projects through subscriptions.
    pub fn is_project_scoped(self) -> bool {
        !matches!(self, Self::Store)
    }
}

/// Bookkeeping stamped on every committed object version.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ObjectMeta {
    /// Per-identity version, starting at 1 and bumped on every commit.
    pub version: u64,
    /// Epoch ms of the commit that created the current incarnation.
    pub created_at: i64,
    /// Epoch ms of the latest commit.
    pub updated_at: i64,
    /// Tombstone marker written by deletes.
    pub is_deleted: bool,
}

/// A stored spec together with its scope and version metadata.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Versioned<T> {
    /// Owning project; empty for global kinds.
    pub project: String,
    pub spec: T,
    pub meta: ObjectMeta,
}

impl<T> Versioned<T> {
    pub fn version(&self) -> u64 {
        self.meta.version
    }

    /// Returns whether this record is live (not tombstoned).
    pub fn is_active(&self) -> bool {
        !self.meta.is_deleted
    }
}

/// Contract shared by every spec the registry can store.
pub trait RegistryObject:
    Clone + PartialEq + std::fmt::Debug + Serialize + DeserializeOwned
{
    const KIND: ObjectKind;

    /// Identity within the object's scope.
    fn name(&self) -> &str;

    /// Checks the spec in isolation, without looking at stored state.
    fn validate(&self) -> Result<(), SpecValidationError>;

    /// Returns the canonical form used for diffing and persistence.
    fn canonicalize(self) -> Self;
}

/// Decodes a client-submitted JSON spec.
///
/// Unknown enum values (for example an unsupported value type) and missing
/// required fields surface as validation errors rather than transport errors.
pub fn decode_spec<T: RegistryObject>(json: &str) -> Result<T, SpecValidationError> {
    serde_json::from_str(json).map_err(|err| SpecValidationError::Malformed {
        kind: T::KIND,
        message: err.to_string(),
    })
}
