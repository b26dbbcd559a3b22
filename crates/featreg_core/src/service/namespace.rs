//! Project lifecycle use-cases.
//!
//! # Responsibility
//! - Create, archive and list projects.
//! - Resolve the project a request targets, creating it lazily for writes.
//!
//! # Invariants
//! - Explicit creation is not idempotent: existing names are rejected.
//! - Archival is terminal; archived projects reject writes.
//! - Read paths never create projects.

use crate::audit::VersionTracker;
use crate::model::project::{project_or_default, Project};
use crate::model::validation::validate_project_name;
use crate::repo::ProjectRepository;
use crate::service::error::{RegistryError, RegistryResult};
use log::{debug, info};

/// Project operations over a borrowed repository.
pub struct NamespaceManager<'a, R: ProjectRepository> {
    repo: &'a R,
    tracker: &'a VersionTracker,
}

impl<'a, R: ProjectRepository> NamespaceManager<'a, R> {
    pub fn new(repo: &'a R, tracker: &'a VersionTracker) -> Self {
        Self { repo, tracker }
    }

    /// Creates a project; fails if the name exists, archived or not.
    pub fn create_project(&self, name: &str) -> RegistryResult<Project> {
        let name = name.trim();
        validate_project_name(name)?;

        let project = Project::new(name, self.tracker.now());
        self.repo.insert_project(&project)?;
        info!(
            "event=project_create module=namespace status=ok project={}",
            project.name
        );
        Ok(project)
    }

    /// Archives an existing active project.
    pub fn archive_project(&self, name: &str) -> RegistryResult<()> {
        let name = name.trim();
        validate_project_name(name)?;

        self.repo.archive_project(name)?;
        info!("event=project_archive module=namespace status=ok project={name}");
        Ok(())
    }

    /// Returns active project names, sorted.
    pub fn list_projects(&self) -> RegistryResult<Vec<String>> {
        Ok(self
            .repo
            .list_projects(false)?
            .into_iter()
            .map(|project| project.name)
            .collect())
    }

    /// Normalizes a write target and rejects archived projects, without
    /// creating anything.
    pub fn check_writable(&self, name: &str) -> RegistryResult<String> {
        let name = project_or_default(name);
        validate_project_name(name)?;
        if let Some(project) = self.repo.get_project(name)? {
            if project.archived {
                return Err(RegistryError::PreconditionFailed(format!(
                    "project `{name}` is archived"
                )));
            }
        }
        Ok(name.to_string())
    }

    /// Resolves the project a write targets, creating it when absent.
    ///
    /// Empty names resolve to `default`.
    pub fn resolve_project(&self, name: &str) -> RegistryResult<Project> {
        let name = self.check_writable(name)?;
        let project = self.repo.ensure_project(&name, self.tracker.now())?;
        if project.archived {
            // Archived between the check and the insert.
            return Err(RegistryError::PreconditionFailed(format!(
                "project `{name}` is archived"
            )));
        }
        debug!("event=project_resolve module=namespace status=ok project={name}");
        Ok(project)
    }

    /// Looks up an active project for reads. Unknown, invalid and archived
    /// names all yield `None`.
    pub fn lookup_active(&self, name: &str) -> RegistryResult<Option<Project>> {
        let name = project_or_default(name);
        if validate_project_name(name).is_err() {
            return Ok(None);
        }
        Ok(self
            .repo
            .get_project(name)?
            .filter(|project| project.is_active()))
    }
}
