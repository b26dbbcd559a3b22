//! Version stamping for committed mutations.

use crate::model::ObjectMeta;
use std::fmt::Debug;
use std::sync::Arc;
use std::time::{SystemTime, UNIX_EPOCH};

/// Source of commit timestamps.
pub trait Clock: Send + Sync + Debug {
    /// Current time in epoch milliseconds.
    fn now_epoch_ms(&self) -> i64;
}

/// Wall clock.
#[derive(Debug, Default, Clone, Copy)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now_epoch_ms(&self) -> i64 {
        SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .map(|elapsed| i64::try_from(elapsed.as_millis()).unwrap_or(i64::MAX))
            .unwrap_or(0)
    }
}

/// Version and timestamps to write with one commit.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct VersionStamp {
    pub version: u64,
    pub created_at: i64,
    pub updated_at: i64,
}

/// Assigns versions and timestamps; the atomic commit itself belongs to the
/// repository's compare-and-swap.
#[derive(Debug, Clone)]
pub struct VersionTracker {
    clock: Arc<dyn Clock>,
}

impl Default for VersionTracker {
    fn default() -> Self {
        Self::new(Arc::new(SystemClock))
    }
}

impl VersionTracker {
    pub fn new(clock: Arc<dyn Clock>) -> Self {
        Self { clock }
    }

    pub fn now(&self) -> i64 {
        self.clock.now_epoch_ms()
    }

    /// Version a writer must observe for its commit to succeed.
    ///
    /// `None` means the identity must not exist yet.
    pub fn expected_version(current: Option<&ObjectMeta>) -> Option<u64> {
        current.map(|meta| meta.version)
    }

    /// Stamp for creating an object, optionally over a tombstone.
    pub fn stamp_create(&self, tombstone: Option<&ObjectMeta>) -> VersionStamp {
        let now = self.now();
        match tombstone {
            Some(previous) => VersionStamp {
                version: previous.version + 1,
                created_at: now.max(previous.updated_at),
                updated_at: now.max(previous.updated_at),
            },
            None => VersionStamp {
                version: 1,
                created_at: now,
                updated_at: now,
            },
        }
    }

    /// Stamp for updating or tombstoning a live object.
    pub fn stamp_update(&self, current: &ObjectMeta) -> VersionStamp {
        VersionStamp {
            version: current.version + 1,
            created_at: current.created_at,
            updated_at: self.now().max(current.updated_at),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::{Clock, VersionTracker};
    use crate::model::ObjectMeta;
    use std::sync::Arc;

    #[derive(Debug)]
    struct FixedClock(i64);

    impl Clock for FixedClock {
        fn now_epoch_ms(&self) -> i64 {
            self.0
        }
    }

    fn meta(version: u64, updated_at: i64) -> ObjectMeta {
        ObjectMeta {
            version,
            created_at: 10,
            updated_at,
            is_deleted: false,
        }
    }

    #[test]
    fn first_create_starts_at_version_one() {
        let tracker = VersionTracker::new(Arc::new(FixedClock(1_000)));
        let stamp = tracker.stamp_create(None);
        assert_eq!(stamp.version, 1);
        assert_eq!(stamp.created_at, 1_000);
        assert_eq!(stamp.updated_at, 1_000);
    }

    #[test]
    fn create_over_tombstone_continues_version_sequence() {
        let tracker = VersionTracker::new(Arc::new(FixedClock(1_000)));
        let mut tombstone = meta(4, 900);
        tombstone.is_deleted = true;
        assert_eq!(tracker.stamp_create(Some(&tombstone)).version, 5);
    }

    #[test]
    fn update_keeps_created_at_and_never_moves_updated_at_backwards() {
        let tracker = VersionTracker::new(Arc::new(FixedClock(500)));
        let stamp = tracker.stamp_update(&meta(2, 800));
        assert_eq!(stamp.version, 3);
        assert_eq!(stamp.created_at, 10);
        assert_eq!(stamp.updated_at, 800);
    }

    #[test]
    fn expected_version_mirrors_loaded_state() {
        assert_eq!(VersionTracker::expected_version(None), None);
        assert_eq!(VersionTracker::expected_version(Some(&meta(7, 0))), Some(7));
    }
}
