//! Core domain logic for the feature registry.
//! This crate is the single source of truth for registry invariants.

pub mod audit;
pub mod config;
pub mod db;
pub mod logging;
pub mod model;
pub mod query;
pub mod reconcile;
pub mod repo;
pub mod service;

pub use audit::{ChangeType, Clock, HistoryEntry, SystemClock, VersionTracker};
pub use config::{ConfigError, LoggingConfig, RegistryConfig};
pub use logging::{default_log_level, init_logging, logging_status, LoggingError};
pub use model::entity::{Entity, EntitySpec};
pub use model::feature_table::{
    feature_ref, DataSource, FeatureSpec, FeatureTable, FeatureTableSpec, SourceType,
};
pub use model::project::{Project, DEFAULT_PROJECT};
pub use model::store::{Store, StoreSpec, StoreType, Subscription};
pub use model::validation::SpecValidationError;
pub use model::value_type::ValueType;
pub use model::{decode_spec, ObjectKind, ObjectMeta, RegistryObject, Versioned};
pub use query::filter::{EntityFilter, FeatureFilter, FeatureTableFilter, StoreFilter};
pub use repo::{RepoError, RepoResult, SqliteRegistryRepository};
pub use service::{
    ApplyOutcome, ApplyStatus, PopulationJobTrigger, RegistryError, RegistryResult,
    RegistryService, UpdateStoreStatus,
};

/// Returns the core crate version.
pub fn core_version() -> &'static str {
    env!("CARGO_PKG_VERSION")
}
