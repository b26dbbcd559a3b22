//! Registry use-case service.
//!
//! # Responsibility
//! - Expose one method per registry RPC.
//! - Route writes through namespace resolution and the apply engine, and
//!   reads through the list filters.
//!
//! # Invariants
//! - Every argument and spec is validated before any project is created or
//!   any object is written.
//! - Read paths never create projects; unknown or archived projects read as
//!   empty.
//! - Store hook failures are logged and never fail the store update.

use crate::audit::{Clock, HistoryEntry, VersionTracker};
use crate::model::entity::{Entity, EntitySpec};
use crate::model::feature_table::{FeatureSpec, FeatureTable, FeatureTableSpec};
use crate::model::project::{project_or_default, Project};
use crate::model::store::{Store, StoreSpec};
use crate::model::validation::SpecValidationError;
use crate::model::{ObjectKind, RegistryObject};
use crate::query::filter::{EntityFilter, FeatureFilter, FeatureTableFilter, StoreFilter};
use crate::repo::{ObjectRepository, ProjectRepository};
use crate::service::apply::{ApplyEngine, ApplyOutcome, ApplyStatus, DEFAULT_MAX_APPLY_ATTEMPTS};
use crate::service::error::{RegistryError, RegistryResult};
use crate::service::jobs::{NoopJobTrigger, PopulationJobTrigger};
use crate::service::namespace::NamespaceManager;
use log::{info, warn};
use std::collections::BTreeMap;
use std::sync::Arc;

/// Scope key for kinds that are not project-scoped.
const GLOBAL_SCOPE: &str = "";

/// Result status of `update_store`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UpdateStoreStatus {
    NoChange,
    Updated,
}

/// Registry facade over one repository handle.
pub struct RegistryService<R: ProjectRepository + ObjectRepository> {
    repo: R,
    tracker: VersionTracker,
    max_apply_attempts: u32,
    job_trigger: Arc<dyn PopulationJobTrigger>,
}

impl<R: ProjectRepository + ObjectRepository> RegistryService<R> {
    pub fn new(repo: R) -> Self {
        Self {
            repo,
            tracker: VersionTracker::default(),
            max_apply_attempts: DEFAULT_MAX_APPLY_ATTEMPTS,
            job_trigger: Arc::new(NoopJobTrigger),
        }
    }

    /// Replaces the timestamp source.
    pub fn with_clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.tracker = VersionTracker::new(clock);
        self
    }

    pub fn with_job_trigger(mut self, trigger: Arc<dyn PopulationJobTrigger>) -> Self {
        self.job_trigger = trigger;
        self
    }

    /// Sets the compare-and-swap attempt budget per apply (minimum 1).
    pub fn with_max_apply_attempts(mut self, attempts: u32) -> Self {
        self.max_apply_attempts = attempts.max(1);
        self
    }

    pub fn max_apply_attempts(&self) -> u32 {
        self.max_apply_attempts
    }

    /// Returns the registry build version.
    pub fn get_version(&self) -> String {
        crate::core_version().to_string()
    }

    pub fn create_project(&self, name: &str) -> RegistryResult<Project> {
        self.namespace().create_project(name)
    }

    pub fn archive_project(&self, name: &str) -> RegistryResult<()> {
        self.namespace().archive_project(name)
    }

    /// Active project names, sorted.
    pub fn list_projects(&self) -> RegistryResult<Vec<String>> {
        self.namespace().list_projects()
    }

    /// Resolves a write target project, creating it when absent.
    pub fn resolve_project(&self, name: &str) -> RegistryResult<Project> {
        self.namespace().resolve_project(name)
    }

    pub fn apply_entity(&self, spec: EntitySpec, project: &str) -> RegistryResult<Entity> {
        Ok(self.apply_entity_with_status(spec, project)?.object)
    }

    pub fn apply_entity_with_status(
        &self,
        spec: EntitySpec,
        project: &str,
    ) -> RegistryResult<ApplyOutcome<EntitySpec>> {
        let project = self.prepare_write(project, &spec)?;
        self.engine().apply(&project, spec)
    }

    pub fn get_entity(&self, name: &str, project: &str) -> RegistryResult<Entity> {
        self.get_scoped::<EntitySpec>(project, name)
    }

    pub fn list_entities(&self, filter: &EntityFilter) -> RegistryResult<Vec<Entity>> {
        let Some(project) = self.namespace().lookup_active(&filter.project)? else {
            return Ok(Vec::new());
        };
        Ok(self
            .repo
            .scan_objects::<EntitySpec>(&project.name)?
            .into_iter()
            .filter(|entity| filter.matches(&entity.spec))
            .collect())
    }

    pub fn apply_feature_table(
        &self,
        project: &str,
        spec: FeatureTableSpec,
    ) -> RegistryResult<FeatureTable> {
        Ok(self.apply_feature_table_with_status(project, spec)?.object)
    }

    /// Applies a feature table; every referenced entity must already be
    /// registered in the same project.
    pub fn apply_feature_table_with_status(
        &self,
        project: &str,
        spec: FeatureTableSpec,
    ) -> RegistryResult<ApplyOutcome<FeatureTableSpec>> {
        let namespace = self.namespace();
        let project_name = namespace.check_writable(project)?;
        spec.validate()?;
        for entity in &spec.entities {
            let registered = self
                .repo
                .get_object::<EntitySpec>(&project_name, entity.trim(), false)?
                .is_some();
            if !registered {
                return Err(SpecValidationError::UnknownEntity {
                    table: spec.name.clone(),
                    entity: entity.clone(),
                }
                .into());
            }
        }
        namespace.resolve_project(&project_name)?;
        self.engine().apply(&project_name, spec)
    }

    pub fn get_feature_table(&self, project: &str, name: &str) -> RegistryResult<FeatureTable> {
        self.get_scoped::<FeatureTableSpec>(project, name)
    }

    pub fn list_feature_tables(
        &self,
        filter: &FeatureTableFilter,
    ) -> RegistryResult<Vec<FeatureTable>> {
        let Some(project) = self.namespace().lookup_active(&filter.project)? else {
            return Ok(Vec::new());
        };
        Ok(self
            .repo
            .scan_objects::<FeatureTableSpec>(&project.name)?
            .into_iter()
            .filter(|table| filter.matches(&table.spec))
            .collect())
    }

    /// Tombstones a feature table. A later apply with the same name starts a
    /// new incarnation whose version continues after the tombstone.
    pub fn delete_feature_table(&self, project: &str, name: &str) -> RegistryResult<FeatureTable> {
        let project = self.namespace().check_writable(project)?;
        let deleted = self
            .engine()
            .delete::<FeatureTableSpec>(&project, name.trim())?;
        info!(
            "event=table_delete module=registry status=ok project={} name={} version={}",
            project, deleted.spec.name, deleted.meta.version
        );
        Ok(deleted)
    }

    /// Features matching `filter`, keyed by `table:feature` reference.
    pub fn list_features(
        &self,
        filter: &FeatureFilter,
    ) -> RegistryResult<BTreeMap<String, FeatureSpec>> {
        let Some(project) = self.namespace().lookup_active(&filter.project)? else {
            return Ok(BTreeMap::new());
        };
        let tables = self.repo.scan_objects::<FeatureTableSpec>(&project.name)?;
        Ok(filter.select(&tables))
    }

    /// Creates or updates a store and notifies the job trigger when the
    /// stored spec changed.
    pub fn update_store(&self, spec: StoreSpec) -> RegistryResult<(Store, UpdateStoreStatus)> {
        let outcome = self.engine().apply(GLOBAL_SCOPE, spec)?;
        if outcome.status == ApplyStatus::NoChange {
            return Ok((outcome.object, UpdateStoreStatus::NoChange));
        }

        match self.job_trigger.store_changed(&outcome.object) {
            Ok(()) => info!(
                "event=store_job_trigger module=registry status=ok store={} version={}",
                outcome.object.spec.name, outcome.object.meta.version
            ),
            Err(err) => warn!(
                "event=store_job_trigger module=registry status=error store={} version={} error={}",
                outcome.object.spec.name, outcome.object.meta.version, err
            ),
        }
        Ok((outcome.object, UpdateStoreStatus::Updated))
    }

    pub fn list_stores(&self, filter: &StoreFilter) -> RegistryResult<Vec<Store>> {
        Ok(self
            .repo
            .scan_objects::<StoreSpec>(GLOBAL_SCOPE)?
            .into_iter()
            .filter(|store| filter.matches(&store.spec))
            .collect())
    }

    /// Committed versions of one object, oldest first. `project` is ignored
    /// for global kinds.
    pub fn list_history(
        &self,
        kind: ObjectKind,
        project: &str,
        name: &str,
    ) -> RegistryResult<Vec<HistoryEntry>> {
        let scope = if kind.is_project_scoped() {
            project_or_default(project)
        } else {
            GLOBAL_SCOPE
        };
        Ok(self.repo.list_history(kind, scope, name.trim())?)
    }

    fn namespace(&self) -> NamespaceManager<'_, R> {
        NamespaceManager::new(&self.repo, &self.tracker)
    }

    fn engine(&self) -> ApplyEngine<'_, R> {
        ApplyEngine::new(&self.repo, &self.tracker, self.max_apply_attempts)
    }

    fn prepare_write<T: RegistryObject>(&self, project: &str, spec: &T) -> RegistryResult<String> {
        let namespace = self.namespace();
        let project = namespace.check_writable(project)?;
        spec.validate()?;
        namespace.resolve_project(&project)?;
        Ok(project)
    }

    fn get_scoped<T: RegistryObject>(
        &self,
        project: &str,
        name: &str,
    ) -> RegistryResult<crate::model::Versioned<T>> {
        let project = project_or_default(project);
        let name = name.trim();
        let found = match self.namespace().lookup_active(project)? {
            Some(active) => self.repo.get_object::<T>(&active.name, name, false)?,
            None => None,
        };
        found.ok_or_else(|| RegistryError::object_not_found(T::KIND, project, name))
    }
}
