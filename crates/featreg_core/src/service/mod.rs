//! Core use-case services.
//!
//! # Responsibility
//! - Orchestrate repository calls into registry RPC level APIs.
//! - Keep callers decoupled from storage details.

pub mod apply;
pub mod error;
pub mod jobs;
pub mod namespace;
pub mod registry_service;

pub use apply::{ApplyEngine, ApplyOutcome, ApplyStatus, DEFAULT_MAX_APPLY_ATTEMPTS};
pub use error::{RegistryError, RegistryResult};
pub use jobs::{JobTriggerError, NoopJobTrigger, PopulationJobTrigger, RecordingJobTrigger};
pub use namespace::NamespaceManager;
pub use registry_service::{RegistryService, UpdateStoreStatus};
