//! Registry-level error taxonomy returned by every service operation.

use crate::model::validation::SpecValidationError;
use crate::model::ObjectKind;
use crate::reconcile::ImmutableFieldViolation;
use crate::repo::RepoError;
use std::error::Error;
use std::fmt::{Display, Formatter};

pub type RegistryResult<T> = Result<T, RegistryError>;

/// Errors surfaced to registry callers.
///
/// Every variant except `Storage` is detected before any write, so a failed
/// call never leaves partial state behind.
#[derive(Debug)]
pub enum RegistryError {
    /// Get/delete/archive targeted a missing project or object.
    NotFound(String),
    /// Project name is already taken (active or archived).
    AlreadyExists(String),
    /// Spec or request argument is malformed.
    InvalidArgument(SpecValidationError),
    /// Apply tried to change a field fixed at creation.
    ImmutableFieldViolation {
        kind: ObjectKind,
        name: String,
        violation: ImmutableFieldViolation,
    },
    /// Compare-and-swap kept losing until the retry budget ran out.
    Conflict {
        kind: ObjectKind,
        name: String,
        attempts: u32,
    },
    /// Operation is not allowed in the target's current state.
    PreconditionFailed(String),
    /// Persistence-layer failure.
    Storage(RepoError),
}

impl RegistryError {
    /// Stable machine-readable code, used in log events.
    pub fn code(&self) -> &'static str {
        match self {
            Self::NotFound(_) => "not_found",
            Self::AlreadyExists(_) => "already_exists",
            Self::InvalidArgument(_) => "invalid_argument",
            Self::ImmutableFieldViolation { .. } => "immutable_field_violation",
            Self::Conflict { .. } => "conflict",
            Self::PreconditionFailed(_) => "precondition_failed",
            Self::Storage(_) => "storage",
        }
    }

    pub(crate) fn object_not_found(kind: ObjectKind, project: &str, name: &str) -> Self {
        if kind.is_project_scoped() {
            Self::NotFound(format!(
                "{} `{name}` not found in project `{project}`",
                kind.as_str()
            ))
        } else {
            Self::NotFound(format!("{} `{name}` not found", kind.as_str()))
        }
    }
}

impl Display for RegistryError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::NotFound(message) => write!(f, "{message}"),
            Self::AlreadyExists(name) => write!(f, "project already exists: {name}"),
            Self::InvalidArgument(err) => write!(f, "invalid argument: {err}"),
            Self::ImmutableFieldViolation {
                kind,
                name,
                violation,
            } => write!(f, "cannot update {} `{name}`: {violation}", kind.as_str()),
            Self::Conflict {
                kind,
                name,
                attempts,
            } => write!(
                f,
                "concurrent modification of {} `{name}`; gave up after {attempts} attempts",
                kind.as_str()
            ),
            Self::PreconditionFailed(message) => write!(f, "precondition failed: {message}"),
            Self::Storage(err) => write!(f, "{err}"),
        }
    }
}

impl Error for RegistryError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            Self::InvalidArgument(err) => Some(err),
            Self::ImmutableFieldViolation { violation, .. } => Some(violation),
            Self::Storage(err) => Some(err),
            _ => None,
        }
    }
}

impl From<SpecValidationError> for RegistryError {
    fn from(value: SpecValidationError) -> Self {
        Self::InvalidArgument(value)
    }
}

impl From<RepoError> for RegistryError {
    fn from(value: RepoError) -> Self {
        match value {
            RepoError::ProjectExists(name) => Self::AlreadyExists(name),
            RepoError::ProjectNotFound(name) => {
                Self::NotFound(format!("project not found: {name}"))
            }
            RepoError::ProjectArchived(name) => {
                Self::PreconditionFailed(format!("project `{name}` is archived"))
            }
            other => Self::Storage(other),
        }
    }
}
