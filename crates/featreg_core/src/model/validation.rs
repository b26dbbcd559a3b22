//! Well-formedness rules shared by all object kinds.
//!
//! # Invariants
//! - Object and feature names match `^[A-Za-z_][A-Za-z0-9_]*$`.
//! - Project names match `^[A-Za-z0-9_]+$`.
//! - Label keys are never empty.

use super::ObjectKind;
use once_cell::sync::Lazy;
use regex::Regex;
use std::collections::BTreeMap;
use std::error::Error;
use std::fmt::{Display, Formatter};

static OBJECT_NAME_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^[A-Za-z_][A-Za-z0-9_]*$").expect("valid object name regex"));
static PROJECT_NAME_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^[A-Za-z0-9_]+$").expect("valid project name regex"));

/// Column names the offline/online stores reserve for bookkeeping.
pub const RESERVED_FEATURE_NAMES: &[&str] = &[
    "created_timestamp",
    "event_timestamp",
    "ingestion_id",
    "job_id",
];

/// Spec-level validation failure. Always maps to an invalid-argument error.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SpecValidationError {
    /// Required name is empty.
    EmptyName { what: &'static str },
    /// Name does not match the naming pattern for its kind.
    InvalidName { what: &'static str, value: String },
    /// A label map contains an empty key.
    EmptyLabelKey { owner: String },
    /// The same feature name appears twice in one payload.
    DuplicateFeature { table: String, feature: String },
    /// The same entity appears twice in one table payload.
    DuplicateEntity { table: String, entity: String },
    /// Feature table declares no entities.
    MissingEntities { table: String },
    /// Feature uses a reserved column name.
    ReservedFeatureName { table: String, feature: String },
    /// Feature name collides with one of the table's entities.
    FeatureShadowsEntity { table: String, feature: String },
    /// Feature table references an entity not registered in its project.
    UnknownEntity { table: String, entity: String },
    /// Data source is missing a required column or mapping entry.
    InvalidDataSource { table: String, message: String },
    /// Store subscription field is empty.
    EmptySubscriptionField {
        store: String,
        field: &'static str,
    },
    /// Value type string is not part of the supported set.
    UnknownValueType(String),
    /// Payload could not be decoded into a spec.
    Malformed { kind: ObjectKind, message: String },
}

impl Display for SpecValidationError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::EmptyName { what } => write!(f, "{what} name must not be empty"),
            Self::InvalidName { what, value } => write!(f, "invalid {what} name `{value}`"),
            Self::EmptyLabelKey { owner } => write!(f, "label keys on `{owner}` must not be empty"),
            Self::DuplicateFeature { table, feature } => {
                write!(f, "feature `{feature}` declared more than once in table `{table}`")
            }
            Self::DuplicateEntity { table, entity } => {
                write!(f, "entity `{entity}` declared more than once in table `{table}`")
            }
            Self::MissingEntities { table } => {
                write!(f, "feature table `{table}` must declare at least one entity")
            }
            Self::ReservedFeatureName { table, feature } => {
                write!(f, "feature `{feature}` in table `{table}` uses a reserved name")
            }
            Self::FeatureShadowsEntity { table, feature } => write!(
                f,
                "feature `{feature}` in table `{table}` has the same name as an entity"
            ),
            Self::UnknownEntity { table, entity } => write!(
                f,
                "feature table `{table}` references unregistered entity `{entity}`"
            ),
            Self::InvalidDataSource { table, message } => {
                write!(f, "invalid data source on table `{table}`: {message}")
            }
            Self::EmptySubscriptionField { store, field } => {
                write!(f, "store `{store}` has a subscription with empty `{field}`")
            }
            Self::UnknownValueType(value) => write!(f, "unknown value type `{value}`"),
            Self::Malformed { kind, message } => {
                write!(f, "malformed {} spec: {message}", kind.as_str())
            }
        }
    }
}

impl Error for SpecValidationError {}

/// Validates an entity, feature table, feature or store name.
pub fn validate_object_name(what: &'static str, value: &str) -> Result<(), SpecValidationError> {
    if value.is_empty() {
        return Err(SpecValidationError::EmptyName { what });
    }
    if !OBJECT_NAME_RE.is_match(value) {
        return Err(SpecValidationError::InvalidName {
            what,
            value: value.to_string(),
        });
    }
    Ok(())
}

/// Validates a project name after trimming by the caller.
pub fn validate_project_name(value: &str) -> Result<(), SpecValidationError> {
    if value.is_empty() {
        return Err(SpecValidationError::EmptyName { what: "project" });
    }
    if !PROJECT_NAME_RE.is_match(value) {
        return Err(SpecValidationError::InvalidName {
            what: "project",
            value: value.to_string(),
        });
    }
    Ok(())
}

pub fn validate_labels(
    owner: &str,
    labels: &BTreeMap<String, String>,
) -> Result<(), SpecValidationError> {
    if labels.keys().any(|key| key.trim().is_empty()) {
        return Err(SpecValidationError::EmptyLabelKey {
            owner: owner.to_string(),
        });
    }
    Ok(())
}

pub fn is_reserved_feature_name(name: &str) -> bool {
    RESERVED_FEATURE_NAMES.contains(&name)
}
