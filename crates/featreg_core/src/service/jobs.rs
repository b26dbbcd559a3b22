//! Hook invoked after store specs change.
//!
//! Online stores are filled by ingestion jobs that live outside the registry.
//! The registry only tells them that a store's subscriptions or config moved.

use crate::model::store::Store;
use std::error::Error;
use std::fmt::{Display, Formatter};
use std::sync::Mutex;

/// Failure reported by a job trigger. Never fails the originating apply.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct JobTriggerError {
    pub message: String,
}

impl JobTriggerError {
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
        }
    }
}

impl Display for JobTriggerError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "population job trigger failed: {}", self.message)
    }
}

impl Error for JobTriggerError {}

/// Starts (or restarts) population jobs for a store.
pub trait PopulationJobTrigger: Send + Sync {
    /// Called once per committed store create/update, after the commit.
    fn store_changed(&self, store: &Store) -> Result<(), JobTriggerError>;
}

/// Trigger that does nothing.
#[derive(Debug, Default, Clone, Copy)]
pub struct NoopJobTrigger;

impl PopulationJobTrigger for NoopJobTrigger {
    fn store_changed(&self, _store: &Store) -> Result<(), JobTriggerError> {
        Ok(())
    }
}

/// Trigger that records `(store name, version)` pairs.
///
/// Useful for embedding hosts that poll for pending job work instead of
/// receiving callbacks.
#[derive(Debug, Default)]
pub struct RecordingJobTrigger {
    seen: Mutex<Vec<(String, u64)>>,
}

impl RecordingJobTrigger {
    pub fn new() -> Self {
        Self::default()
    }

    /// Drains recorded notifications, oldest first.
    pub fn take(&self) -> Vec<(String, u64)> {
        match self.seen.lock() {
            Ok(mut seen) => std::mem::take(&mut *seen),
            Err(poisoned) => std::mem::take(&mut *poisoned.into_inner()),
        }
    }
}

impl PopulationJobTrigger for RecordingJobTrigger {
    fn store_changed(&self, store: &Store) -> Result<(), JobTriggerError> {
        let mut seen = self
            .seen
            .lock()
            .map_err(|_| JobTriggerError::new("recording trigger lock poisoned"))?;
        seen.push((store.spec.name.clone(), store.meta.version));
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::{PopulationJobTrigger, RecordingJobTrigger};
    use crate::model::store::{StoreSpec, StoreType};
    use crate::model::{ObjectMeta, Versioned};

    #[test]
    fn recording_trigger_drains_in_order() {
        let trigger = RecordingJobTrigger::new();
        for version in 1..=2 {
            let store = Versioned {
                project: String::new(),
                spec: StoreSpec::new("online", StoreType::Redis),
                meta: ObjectMeta {
                    version,
                    created_at: 0,
                    updated_at: 0,
                    is_deleted: false,
                },
            };
            trigger.store_changed(&store).expect("record should succeed");
        }

        assert_eq!(
            trigger.take(),
            vec![("online".to_string(), 1), ("online".to_string(), 2)]
        );
        assert!(trigger.take().is_empty());
    }
}
