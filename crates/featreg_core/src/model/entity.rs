//! Entity model.
//!
//! # Invariants
//! - `name` and `value_type` never change once committed.
//! - `description` and `labels` are freely mutable.

use super::validation::{validate_labels, validate_object_name, SpecValidationError};
use super::value_type::ValueType;
use super::{ObjectKind, RegistryObject, Versioned};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Desired state of an entity, as submitted by clients.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EntitySpec {
    pub name: String,
    pub value_type: ValueType,
    #[serde(default)]
    pub description: String,
    #[serde(default)]
    pub labels: BTreeMap<String, String>,
}

/// Stored entity with version metadata.
pub type Entity = Versioned<EntitySpec>;

impl EntitySpec {
    pub fn new(name: impl Into<String>, value_type: ValueType) -> Self {
        Self {
            name: name.into(),
            value_type,
            description: String::new(),
            labels: BTreeMap::new(),
        }
    }

    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = description.into();
        self
    }

    pub fn with_label(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.labels.insert(key.into(), value.into());
        self
    }
}

impl RegistryObject for EntitySpec {
    const KIND: ObjectKind = ObjectKind::Entity;

    fn name(&self) -> &str {
        &self.name
    }

    fn validate(&self) -> Result<(), SpecValidationError> {
        validate_object_name("entity", &self.name)?;
        validate_labels(&self.name, &self.labels)
    }

    fn canonicalize(self) -> Self {
        self
    }
}
