//! Versioned object storage with compare-and-swap commits.
//!
//! # Responsibility
//! - Store every registry object kind as canonical JSON keyed by
//!   `(kind, project, name)`.
//! - Provide conditional writes that fail cleanly when the stored version
//!   moved since the caller loaded it.
//!
//! # Invariants
//! - A CAS with `expected_version = None` succeeds only if the identity has
//!   never been stored (tombstones count as stored).
//! - A CAS with `Some(v)` succeeds only if the stored version is still `v`.
//! - A conflicting CAS leaves no trace, including in `object_history`.
//! - Project-scoped writes commit only while their project row exists and is
//!   active, checked under the same write lock as the version compare.

use super::{
    bool_to_int, int_to_bool, version_from_db, version_to_db, RepoError, RepoResult,
    SqliteRegistryRepository,
};
use crate::audit::{ChangeType, HistoryEntry, VersionStamp};
use crate::model::{ObjectKind, ObjectMeta, RegistryObject, Versioned};
use rusqlite::{params, OptionalExtension, Row, Transaction, TransactionBehavior};

const OBJECT_SELECT_SQL: &str = "SELECT
    project,
    name,
    spec_json,
    version,
    is_deleted,
    created_at,
    updated_at
FROM registry_objects";

/// One conditional write request.
#[derive(Debug, Clone)]
pub struct ObjectWrite<'a, T> {
    /// Project name, or empty for global kinds.
    pub scope: &'a str,
    pub spec: &'a T,
    /// Version the writer loaded; `None` when it saw no record at all.
    pub expected_version: Option<u64>,
    pub stamp: VersionStamp,
    pub change: ChangeType,
}

/// Result of a conditional write.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CasOutcome {
    Committed(ObjectMeta),
    /// Another writer committed first; nothing was written.
    Conflict { expected_version: Option<u64> },
}

/// Registry store contract used by the apply engine and list paths.
pub trait ObjectRepository {
    /// Loads one object; tombstones are returned only with `include_deleted`.
    fn get_object<T: RegistryObject>(
        &self,
        scope: &str,
        name: &str,
        include_deleted: bool,
    ) -> RepoResult<Option<Versioned<T>>>;
    /// Lists live objects of one kind in one scope, ordered by name.
    fn scan_objects<T: RegistryObject>(&self, scope: &str) -> RepoResult<Vec<Versioned<T>>>;
    /// Commits `write` if the stored version still matches.
    fn compare_and_swap<T: RegistryObject>(
        &self,
        write: &ObjectWrite<'_, T>,
    ) -> RepoResult<CasOutcome>;
    /// Returns committed versions of one identity, oldest first.
    fn list_history(
        &self,
        kind: ObjectKind,
        scope: &str,
        name: &str,
    ) -> RepoResult<Vec<HistoryEntry>>;
}

impl ObjectRepository for SqliteRegistryRepository<'_> {
    fn get_object<T: RegistryObject>(
        &self,
        scope: &str,
        name: &str,
        include_deleted: bool,
    ) -> RepoResult<Option<Versioned<T>>> {
        let mut stmt = self.conn().prepare(&format!(
            "{OBJECT_SELECT_SQL}
             WHERE kind = ?1
               AND project = ?2
               AND name = ?3
               AND (?4 = 1 OR is_deleted = 0);"
        ))?;
        let mut rows = stmt.query(params![
            T::KIND.as_str(),
            scope,
            name,
            bool_to_int(include_deleted)
        ])?;
        if let Some(row) = rows.next()? {
            return Ok(Some(parse_object_row(row)?));
        }
        Ok(None)
    }

    fn scan_objects<T: RegistryObject>(&self, scope: &str) -> RepoResult<Vec<Versioned<T>>> {
        let mut stmt = self.conn().prepare(&format!(
            "{OBJECT_SELECT_SQL}
             WHERE kind = ?1
               AND project = ?2
               AND is_deleted = 0
             ORDER BY name ASC;"
        ))?;
        let mut rows = stmt.query(params![T::KIND.as_str(), scope])?;
        let mut objects = Vec::new();
        while let Some(row) = rows.next()? {
            objects.push(parse_object_row(row)?);
        }
        Ok(objects)
    }

    fn compare_and_swap<T: RegistryObject>(
        &self,
        write: &ObjectWrite<'_, T>,
    ) -> RepoResult<CasOutcome> {
        debug_assert_eq!(
            write.stamp.version,
            write.expected_version.map_or(1, |version| version + 1)
        );
        let spec_json =
            serde_json::to_string(write.spec).map_err(|err| RepoError::Encode(err.to_string()))?;
        let kind = T::KIND.as_str();
        let name = write.spec.name();
        let is_deleted = write.change == ChangeType::Delete;
        let new_version = version_to_db(write.stamp.version)?;

        let tx = Transaction::new_unchecked(self.conn(), TransactionBehavior::Immediate)?;
        if T::KIND.is_project_scoped() {
            ensure_project_writable(&tx, write.scope)?;
        }
        let changed = match write.expected_version {
            None => tx.execute(
                "INSERT INTO registry_objects (
                    kind,
                    project,
                    name,
                    spec_json,
                    version,
                    is_deleted,
                    created_at,
                    updated_at
                ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8)
                ON CONFLICT (kind, project, name) DO NOTHING;",
                params![
                    kind,
                    write.scope,
                    name,
                    spec_json.as_str(),
                    new_version,
                    bool_to_int(is_deleted),
                    write.stamp.created_at,
                    write.stamp.updated_at,
                ],
            )?,
            Some(expected) => tx.execute(
                "UPDATE registry_objects
                 SET
                    spec_json = ?4,
                    version = ?5,
                    is_deleted = ?6,
                    created_at = ?7,
                    updated_at = ?8
                 WHERE kind = ?1
                   AND project = ?2
                   AND name = ?3
                   AND version = ?9;",
                params![
                    kind,
                    write.scope,
                    name,
                    spec_json.as_str(),
                    new_version,
                    bool_to_int(is_deleted),
                    write.stamp.created_at,
                    write.stamp.updated_at,
                    version_to_db(expected)?,
                ],
            )?,
        };

        if changed == 0 {
            // Dropping the transaction rolls it back.
            return Ok(CasOutcome::Conflict {
                expected_version: write.expected_version,
            });
        }

        tx.execute(
            "INSERT INTO object_history (
                kind,
                project,
                name,
                version,
                change_type,
                spec_json,
                committed_at
            ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7);",
            params![
                kind,
                write.scope,
                name,
                new_version,
                write.change.as_str(),
                spec_json.as_str(),
                write.stamp.updated_at,
            ],
        )?;
        tx.commit()?;

        Ok(CasOutcome::Committed(ObjectMeta {
            version: write.stamp.version,
            created_at: write.stamp.created_at,
            updated_at: write.stamp.updated_at,
            is_deleted,
        }))
    }

    fn list_history(
        &self,
        kind: ObjectKind,
        scope: &str,
        name: &str,
    ) -> RepoResult<Vec<HistoryEntry>> {
        let mut stmt = self.conn().prepare(
            "SELECT
                kind,
                project,
                name,
                version,
                change_type,
                spec_json,
                committed_at
             FROM object_history
             WHERE kind = ?1
               AND project = ?2
               AND name = ?3
             ORDER BY version ASC;",
        )?;
        let mut rows = stmt.query(params![kind.as_str(), scope, name])?;
        let mut entries = Vec::new();
        while let Some(row) = rows.next()? {
            entries.push(parse_history_row(row)?);
        }
        Ok(entries)
    }
}

/// Rejects writes into missing or archived projects. Dropping `tx` on the
/// error path rolls it back.
fn ensure_project_writable(tx: &Transaction<'_>, project: &str) -> RepoResult<()> {
    let archived: Option<i64> = tx
        .query_row(
            "SELECT archived FROM projects WHERE name = ?1;",
            [project],
            |row| row.get(0),
        )
        .optional()?;
    match archived {
        None => Err(RepoError::ProjectNotFound(project.to_string())),
        Some(flag) if int_to_bool(flag, "projects.archived")? => {
            Err(RepoError::ProjectArchived(project.to_string()))
        }
        Some(_) => Ok(()),
    }
}

fn parse_object_row<T: RegistryObject>(row: &Row<'_>) -> RepoResult<Versioned<T>> {
    let name: String = row.get("name")?;
    let spec_json: String = row.get("spec_json")?;
    let spec: T = serde_json::from_str(&spec_json).map_err(|err| {
        RepoError::InvalidData(format!(
            "undecodable {} spec `{name}` in registry_objects.spec_json: {err}",
            T::KIND.as_str()
        ))
    })?;
    if spec.name() != name {
        return Err(RepoError::InvalidData(format!(
            "spec name `{}` does not match row key `{name}`",
            spec.name()
        )));
    }
    spec.validate().map_err(|err| {
        RepoError::InvalidData(format!("stored {} `{name}` is invalid: {err}", T::KIND.as_str()))
    })?;

    Ok(Versioned {
        project: row.get("project")?,
        spec,
        meta: ObjectMeta {
            version: version_from_db(row.get("version")?, "registry_objects.version")?,
            created_at: row.get("created_at")?,
            updated_at: row.get("updated_at")?,
            is_deleted: int_to_bool(row.get("is_deleted")?, "registry_objects.is_deleted")?,
        },
    })
}

fn parse_history_row(row: &Row<'_>) -> RepoResult<HistoryEntry> {
    let kind_text: String = row.get("kind")?;
    let kind = ObjectKind::parse(&kind_text).ok_or_else(|| {
        RepoError::InvalidData(format!("invalid kind `{kind_text}` in object_history.kind"))
    })?;
    let change_text: String = row.get("change_type")?;
    let change = ChangeType::parse(&change_text).ok_or_else(|| {
        RepoError::InvalidData(format!(
            "invalid change type `{change_text}` in object_history.change_type"
        ))
    })?;

    Ok(HistoryEntry {
        kind,
        project: row.get("project")?,
        name: row.get("name")?,
        version: version_from_db(row.get("version")?, "object_history.version")?,
        change,
        spec_json: row.get("spec_json")?,
        committed_at: row.get("committed_at")?,
    })
}
