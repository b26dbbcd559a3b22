//! Project persistence.
//!
//! # Invariants
//! - Project rows are never deleted.
//! - `archived` transitions only from 0 to 1.

use super::{bool_to_int, int_to_bool, RepoError, RepoResult, SqliteRegistryRepository};
use crate::model::project::Project;
use rusqlite::{params, OptionalExtension, Row};

const PROJECT_SELECT_SQL: &str = "SELECT name, archived, created_at FROM projects";

/// Repository interface for project lifecycle operations.
pub trait ProjectRepository {
    /// Inserts a new project; fails with `ProjectExists` on any existing row.
    fn insert_project(&self, project: &Project) -> RepoResult<()>;
    /// Returns the project row, creating an active one if absent.
    fn ensure_project(&self, name: &str, created_at: i64) -> RepoResult<Project>;
    /// Loads one project, archived or not.
    fn get_project(&self, name: &str) -> RepoResult<Option<Project>>;
    /// Flips `archived` to true.
    fn archive_project(&self, name: &str) -> RepoResult<()>;
    /// Lists projects sorted by name.
    fn list_projects(&self, include_archived: bool) -> RepoResult<Vec<Project>>;
}

impl ProjectRepository for SqliteRegistryRepository<'_> {
    fn insert_project(&self, project: &Project) -> RepoResult<()> {
        let changed = self.conn().execute(
            "INSERT INTO projects (name, archived, created_at)
             VALUES (?1, ?2, ?3)
             ON CONFLICT (name) DO NOTHING;",
            params![
                project.name.as_str(),
                bool_to_int(project.archived),
                project.created_at,
            ],
        )?;
        if changed == 0 {
            return Err(RepoError::ProjectExists(project.name.clone()));
        }
        Ok(())
    }

    fn ensure_project(&self, name: &str, created_at: i64) -> RepoResult<Project> {
        self.conn().execute(
            "INSERT INTO projects (name, archived, created_at)
             VALUES (?1, 0, ?2)
             ON CONFLICT (name) DO NOTHING;",
            params![name, created_at],
        )?;
        self.get_project(name)?
            .ok_or_else(|| RepoError::ProjectNotFound(name.to_string()))
    }

    fn get_project(&self, name: &str) -> RepoResult<Option<Project>> {
        let row = self
            .conn()
            .query_row(
                &format!("{PROJECT_SELECT_SQL} WHERE name = ?1;"),
                [name],
                |row| Ok(parse_project_row(row)),
            )
            .optional()?;
        row.transpose()
    }

    fn archive_project(&self, name: &str) -> RepoResult<()> {
        let changed = self.conn().execute(
            "UPDATE projects SET archived = 1 WHERE name = ?1 AND archived = 0;",
            [name],
        )?;
        if changed == 1 {
            return Ok(());
        }
        match self.get_project(name)? {
            None => Err(RepoError::ProjectNotFound(name.to_string())),
            Some(_) => Err(RepoError::ProjectArchived(name.to_string())),
        }
    }

    fn list_projects(&self, include_archived: bool) -> RepoResult<Vec<Project>> {
        let mut stmt = self.conn().prepare(&format!(
            "{PROJECT_SELECT_SQL}
             WHERE (?1 = 1 OR archived = 0)
             ORDER BY name ASC;"
        ))?;
        let mut rows = stmt.query([bool_to_int(include_archived)])?;
        let mut projects = Vec::new();
        while let Some(row) = rows.next()? {
            projects.push(parse_project_row(row)?);
        }
        Ok(projects)
    }
}

fn parse_project_row(row: &Row<'_>) -> RepoResult<Project> {
    Ok(Project {
        name: row.get("name")?,
        archived: int_to_bool(row.get("archived")?, "projects.archived")?,
        created_at: row.get("created_at")?,
    })
}
