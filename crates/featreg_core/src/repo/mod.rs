//! Registry store abstractions and SQLite persistence.
//!
//! # Responsibility
//! - Define the transactional store contract the apply engine relies on:
//!   get-by-key, compare-and-swap, scan-by-scope.
//! - Keep SQL and JSON encoding details away from service orchestration.
//!
//! # Invariants
//! - Every write is conditional on the version the writer loaded.
//! - Object writes and their history rows commit in one transaction.
//! - Read paths reject undecodable persisted state instead of masking it.

pub mod object_repo;
pub mod project_repo;

use crate::db::migrations::latest_version;
use crate::db::DbError;
use rusqlite::Connection;
use std::error::Error;
use std::fmt::{Display, Formatter};

pub use object_repo::{CasOutcome, ObjectRepository, ObjectWrite};
pub use project_repo::ProjectRepository;

pub type RepoResult<T> = Result<T, RepoError>;

/// Persistence-layer error for registry objects and projects.
#[derive(Debug)]
pub enum RepoError {
    Db(DbError),
    /// Project insert hit an existing name.
    ProjectExists(String),
    /// Project lookup/update targeted an unknown name.
    ProjectNotFound(String),
    /// Archive targeted an already archived project.
    ProjectArchived(String),
    /// Connection schema is not at the expected migrated version.
    UninitializedConnection {
        expected_version: u32,
        actual_version: u32,
    },
    /// Spec could not be serialized for storage.
    Encode(String),
    /// Persisted data cannot be converted to a valid read model.
    InvalidData(String),
}

impl Display for RepoError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Db(err) => write!(f, "{err}"),
            Self::ProjectExists(name) => write!(f, "project already exists: {name}"),
            Self::ProjectNotFound(name) => write!(f, "project not found: {name}"),
            Self::ProjectArchived(name) => write!(f, "project is archived: {name}"),
            Self::UninitializedConnection {
                expected_version,
                actual_version,
            } => write!(
                f,
                "registry repository requires schema version {expected_version}, got {actual_version}"
            ),
            Self::Encode(message) => write!(f, "cannot encode spec: {message}"),
            Self::InvalidData(message) => write!(f, "invalid persisted registry data: {message}"),
        }
    }
}

impl Error for RepoError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            Self::Db(err) => Some(err),
            _ => None,
        }
    }
}

impl From<DbError> for RepoError {
    fn from(value: DbError) -> Self {
        Self::Db(value)
    }
}

impl From<rusqlite::Error> for RepoError {
    fn from(value: rusqlite::Error) -> Self {
        Self::Db(DbError::Sqlite(value))
    }
}

/// SQLite-backed registry store.
///
/// Borrowing a connection keeps the repository cheap to copy; each worker
/// thread opens its own connection and builds its own repository.
#[derive(Debug, Clone, Copy)]
pub struct SqliteRegistryRepository<'conn> {
    conn: &'conn Connection,
}

impl<'conn> SqliteRegistryRepository<'conn> {
    /// Creates a repository from a migrated connection.
    pub fn try_new(conn: &'conn Connection) -> RepoResult<Self> {
        let expected_version = latest_version();
        let actual_version: u32 =
            conn.query_row("PRAGMA user_version;", [], |row| row.get(0))?;
        if actual_version != expected_version {
            return Err(RepoError::UninitializedConnection {
                expected_version,
                actual_version,
            });
        }
        Ok(Self { conn })
    }

    pub(crate) fn conn(&self) -> &'conn Connection {
        self.conn
    }
}

pub(crate) fn bool_to_int(value: bool) -> i64 {
    if value {
        1
    } else {
        0
    }
}

pub(crate) fn int_to_bool(value: i64, column: &str) -> RepoResult<bool> {
    match value {
        0 => Ok(false),
        1 => Ok(true),
        other => Err(RepoError::InvalidData(format!(
            "invalid boolean value `{other}` in {column}"
        ))),
    }
}

pub(crate) fn version_to_db(version: u64) -> RepoResult<i64> {
    i64::try_from(version)
        .map_err(|_| RepoError::InvalidData(format!("version {version} exceeds storage range")))
}

pub(crate) fn version_from_db(value: i64, column: &str) -> RepoResult<u64> {
    u64::try_from(value)
        .ok()
        .filter(|version| *version >= 1)
        .ok_or_else(|| RepoError::InvalidData(format!("invalid version `{value}` in {column}")))
}
