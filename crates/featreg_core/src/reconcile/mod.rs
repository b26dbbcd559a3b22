//! Field-classified diffing between stored and desired specs.
//!
//! # Responsibility
//! - Declare, per object kind, which fields are mutable, immutable or
//!   additive-only.
//! - Merge a desired spec over the stored one, or reject it on the first
//!   immutable-field mismatch.
//!
//! # Invariants
//! - Reconciliation is pure: no I/O, no clock.
//! - Inputs are expected in canonical form; the merged output is canonical.
//! - `Unchanged` is returned only when the merged spec equals the stored one.

mod rules;

use crate::model::RegistryObject;
use std::error::Error;
use std::fmt::{Display, Formatter};

pub use rules::{ENTITY_FIELDS, FEATURE_TABLE_FIELDS, STORE_FIELDS};

/// How a field may change once the object is committed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FieldClass {
    /// Desired value replaces stored value.
    Mutable,
    /// Any difference rejects the apply.
    Immutable,
    /// Entries may be added or have mutable attributes updated; the identity
    /// of existing entries is fixed and absent entries are retained.
    AdditiveOnly,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FieldRule {
    pub field: &'static str,
    pub class: FieldClass,
}

impl FieldRule {
    pub const fn new(field: &'static str, class: FieldClass) -> Self {
        Self { field, class }
    }
}

/// Rejected change to a field that cannot change after creation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ImmutableFieldViolation {
    /// Dotted field path, e.g. `value_type` or `features.trips.value_type`.
    pub field: String,
    pub current: String,
    pub desired: String,
}

impl Display for ImmutableFieldViolation {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "field `{}` is immutable: stored `{}`, requested `{}`",
            self.field, self.current, self.desired
        )
    }
}

impl Error for ImmutableFieldViolation {}

/// Outcome of reconciling a desired spec with the stored one.
#[derive(Debug, Clone, PartialEq)]
pub enum Reconciliation<T> {
    Unchanged,
    Changed {
        merged: T,
        changed_fields: Vec<&'static str>,
    },
}

/// Per-kind field accessors driven by the kind's rule table.
pub trait Reconcile: RegistryObject {
    /// Every field of the spec, with its class.
    const FIELD_RULES: &'static [FieldRule];

    fn field_eq(field: &str, left: &Self, right: &Self) -> bool;

    /// Renders a field value for error messages.
    fn describe_field(field: &str, spec: &Self) -> String;

    /// Copies a mutable field from `source` into `target`.
    fn take_field(field: &str, target: &mut Self, source: &Self);

    /// Merges an additive-only field. Returns whether `target` changed.
    fn merge_additive(
        field: &str,
        target: &mut Self,
        source: &Self,
    ) -> Result<bool, ImmutableFieldViolation> {
        let _ = (field, target, source);
        Ok(false)
    }
}

/// Reconciles canonical `desired` against canonical `current`.
pub fn reconcile<T: Reconcile>(
    current: &T,
    desired: &T,
) -> Result<Reconciliation<T>, ImmutableFieldViolation> {
    let mut merged = current.clone();
    let mut changed_fields = Vec::new();

    for rule in T::FIELD_RULES {
        match rule.class {
            FieldClass::Immutable => {
                if !T::field_eq(rule.field, current, desired) {
                    return Err(ImmutableFieldViolation {
                        field: rule.field.to_string(),
                        current: T::describe_field(rule.field, current),
                        desired: T::describe_field(rule.field, desired),
                    });
                }
            }
            FieldClass::Mutable => {
                if !T::field_eq(rule.field, current, desired) {
                    T::take_field(rule.field, &mut merged, desired);
                    changed_fields.push(rule.field);
                }
            }
            FieldClass::AdditiveOnly => {
                if T::merge_additive(rule.field, &mut merged, desired)? {
                    changed_fields.push(rule.field);
                }
            }
        }
    }

    if changed_fields.is_empty() || merged == *current {
        return Ok(Reconciliation::Unchanged);
    }
    Ok(Reconciliation::Changed {
        merged: merged.canonicalize(),
        changed_fields,
    })
}
