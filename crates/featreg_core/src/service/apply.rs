//! Apply/reconciliation engine.
//!
//! # Responsibility
//! - Turn a desired spec into NO_CHANGE, CREATE or UPDATE against the
//!   stored object, and commit writes with compare-and-swap.
//! - Tombstone objects on delete with the same optimistic protocol.
//!
//! # Invariants
//! - Validation and immutability checks run before any write.
//! - NO_CHANGE performs no write and bumps no version.
//! - Every attempt re-reads stored state; nothing is cached across retries
//!   and no lock is held between the read and the conditional write.
//! - Retries are bounded by `max_attempts`; exhaustion surfaces `Conflict`.

use crate::audit::{ChangeType, VersionStamp, VersionTracker};
use crate::model::{RegistryObject, Versioned};
use crate::reconcile::{reconcile, Reconcile, Reconciliation};
use crate::repo::{CasOutcome, ObjectRepository, ObjectWrite};
use crate::service::error::{RegistryError, RegistryResult};
use log::{debug, error, info, warn};

/// Compare-and-swap attempts per apply when not configured otherwise.
pub const DEFAULT_MAX_APPLY_ATTEMPTS: u32 = 5;

/// What an apply did.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ApplyStatus {
    NoChange,
    Create,
    Update,
}

impl ApplyStatus {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::NoChange => "no_change",
            Self::Create => "create",
            Self::Update => "update",
        }
    }
}

/// Apply result: the status plus the authoritative stored object.
#[derive(Debug, Clone, PartialEq)]
pub struct ApplyOutcome<T> {
    pub status: ApplyStatus,
    pub object: Versioned<T>,
}

struct WritePlan<T> {
    spec: T,
    status: ApplyStatus,
    expected_version: Option<u64>,
    stamp: VersionStamp,
    changed_fields: String,
}

/// Stateless engine over a borrowed repository.
pub struct ApplyEngine<'a, R: ObjectRepository> {
    repo: &'a R,
    tracker: &'a VersionTracker,
    max_attempts: u32,
}

impl<'a, R: ObjectRepository> ApplyEngine<'a, R> {
    pub fn new(repo: &'a R, tracker: &'a VersionTracker, max_attempts: u32) -> Self {
        Self {
            repo,
            tracker,
            max_attempts: max_attempts.max(1),
        }
    }

    /// Applies `desired` inside `scope` (project name, or empty for global
    /// kinds).
    pub fn apply<T: Reconcile>(&self, scope: &str, desired: T) -> RegistryResult<ApplyOutcome<T>> {
        desired.validate()?;
        let desired = desired.canonicalize();
        let name = desired.name().to_string();

        for attempt in 1..=self.max_attempts {
            let current = self.repo.get_object::<T>(scope, &name, true)?;
            let plan = match current {
                Some(stored) if stored.is_active() => {
                    let reconciled = reconcile(&stored.spec, &desired).map_err(|violation| {
                        RegistryError::ImmutableFieldViolation {
                            kind: T::KIND,
                            name: name.clone(),
                            violation,
                        }
                    })?;
                    match reconciled {
                        Reconciliation::Unchanged => {
                            debug!(
                                "event=apply module=apply status=no_change kind={} project={} name={} version={}",
                                T::KIND.as_str(),
                                scope,
                                name,
                                stored.meta.version
                            );
                            return Ok(ApplyOutcome {
                                status: ApplyStatus::NoChange,
                                object: stored,
                            });
                        }
                        Reconciliation::Changed {
                            merged,
                            changed_fields,
                        } => WritePlan {
                            spec: merged,
                            status: ApplyStatus::Update,
                            expected_version: VersionTracker::expected_version(Some(&stored.meta)),
                            stamp: self.tracker.stamp_update(&stored.meta),
                            changed_fields: changed_fields.join(","),
                        },
                    }
                }
                tombstone => {
                    let tombstone = tombstone.map(|stored| stored.meta);
                    WritePlan {
                        spec: desired.clone(),
                        status: ApplyStatus::Create,
                        expected_version: VersionTracker::expected_version(tombstone.as_ref()),
                        stamp: self.tracker.stamp_create(tombstone.as_ref()),
                        changed_fields: "*".to_string(),
                    }
                }
            };

            let change = match plan.status {
                ApplyStatus::Update => ChangeType::Update,
                _ => ChangeType::Create,
            };
            let write = ObjectWrite {
                scope,
                spec: &plan.spec,
                expected_version: plan.expected_version,
                stamp: plan.stamp,
                change,
            };

            match self.repo.compare_and_swap(&write)? {
                CasOutcome::Committed(meta) => {
                    info!(
                        "event=apply module=apply status={} kind={} project={} name={} version={} attempt={} fields={}",
                        plan.status.as_str(),
                        T::KIND.as_str(),
                        scope,
                        name,
                        meta.version,
                        attempt,
                        plan.changed_fields
                    );
                    return Ok(ApplyOutcome {
                        status: plan.status,
                        object: Versioned {
                            project: scope.to_string(),
                            spec: plan.spec,
                            meta,
                        },
                    });
                }
                CasOutcome::Conflict { expected_version } => {
                    warn!(
                        "event=apply_conflict module=apply status=retry kind={} project={} name={} expected_version={:?} attempt={}",
                        T::KIND.as_str(),
                        scope,
                        name,
                        expected_version,
                        attempt
                    );
                }
            }
        }

        error!(
            "event=apply module=apply status=error error_code=conflict kind={} project={} name={} attempts={}",
            T::KIND.as_str(),
            scope,
            name,
            self.max_attempts
        );
        Err(RegistryError::Conflict {
            kind: T::KIND,
            name,
            attempts: self.max_attempts,
        })
    }

    /// Tombstones a live object, returning the deleted record.
    pub fn delete<T: RegistryObject>(&self, scope: &str, name: &str) -> RegistryResult<Versioned<T>> {
        for attempt in 1..=self.max_attempts {
            let current = self
                .repo
                .get_object::<T>(scope, name, false)?
                .ok_or_else(|| RegistryError::object_not_found(T::KIND, scope, name))?;

            let write = ObjectWrite {
                scope,
                spec: &current.spec,
                expected_version: Some(current.meta.version),
                stamp: self.tracker.stamp_update(&current.meta),
                change: ChangeType::Delete,
            };
            match self.repo.compare_and_swap(&write)? {
                CasOutcome::Committed(meta) => {
                    info!(
                        "event=delete module=apply status=ok kind={} project={} name={} version={}",
                        T::KIND.as_str(),
                        scope,
                        name,
                        meta.version
                    );
                    return Ok(Versioned {
                        project: scope.to_string(),
                        spec: current.spec,
                        meta,
                    });
                }
                CasOutcome::Conflict { expected_version } => {
                    warn!(
                        "event=delete_conflict module=apply status=retry kind={} project={} name={} expected_version={:?} attempt={}",
                        T::KIND.as_str(),
                        scope,
                        name,
                        expected_version,
                        attempt
                    );
                }
            }
        }

        error!(
            "event=delete module=apply status=error error_code=conflict kind={} project={} name={} attempts={}",
            T::KIND.as_str(),
            scope,
            name,
            self.max_attempts
        );
        Err(RegistryError::Conflict {
            kind: T::KIND,
            name: name.to_string(),
            attempts: self.max_attempts,
        })
    }
}
