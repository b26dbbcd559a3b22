use featreg_core::db::open_db;
use featreg_core::repo::{CasOutcome, ObjectRepository, ObjectWrite, ProjectRepository};
use featreg_core::{
    ApplyStatus, EntitySpec, FeatureSpec, FeatureTableSpec, HistoryEntry, ObjectKind, Project,
    RegistryError, RegistryObject, RegistryService, RepoResult, SqliteRegistryRepository,
    ValueType, Versioned,
};
use rusqlite::Connection;
use std::cell::Cell;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Barrier};
use std::thread;

fn seed(path: &Path) {
    let conn = open_db(path).unwrap();
    let service = RegistryService::new(SqliteRegistryRepository::try_new(&conn).unwrap());
    service
        .apply_entity(EntitySpec::new("driver", ValueType::Int64), "rides")
        .unwrap();
    service
        .apply_feature_table(
            "rides",
            FeatureTableSpec::new("driver_stats", ["driver"])
                .with_feature(FeatureSpec::new("trips_today", ValueType::Int64)),
        )
        .unwrap();
}

fn add_features_concurrently(path: PathBuf, features: Vec<&'static str>, attempts: u32) {
    let barrier = Arc::new(Barrier::new(features.len()));
    let handles: Vec<_> = features
        .into_iter()
        .map(|feature| {
            let barrier = Arc::clone(&barrier);
            let path = path.clone();
            thread::spawn(move || {
                let conn = open_db(&path).unwrap();
                let service =
                    RegistryService::new(SqliteRegistryRepository::try_new(&conn).unwrap())
                        .with_max_apply_attempts(attempts);
                barrier.wait();
                service
                    .apply_feature_table_with_status(
                        "rides",
                        FeatureTableSpec::new("driver_stats", ["driver"])
                            .with_feature(FeatureSpec::new(feature, ValueType::Double)),
                    )
                    .unwrap()
                    .status
            })
        })
        .collect();

    for handle in handles {
        assert_eq!(handle.join().unwrap(), ApplyStatus::Update);
    }
}

fn stored_table(path: &Path) -> featreg_core::FeatureTable {
    let conn = open_db(path).unwrap();
    let service = RegistryService::new(SqliteRegistryRepository::try_new(&conn).unwrap());
    service.get_feature_table("rides", "driver_stats").unwrap()
}

#[test]
fn two_writers_adding_different_features_both_land() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("registry.db");
    seed(&path);

    add_features_concurrently(path.clone(), vec!["rating", "cancellations"], 5);

    let table = stored_table(&path);
    let names: Vec<&str> = table
        .spec
        .features
        .iter()
        .map(|feature| feature.name.as_str())
        .collect();
    assert_eq!(names, vec!["cancellations", "rating", "trips_today"]);
    assert_eq!(table.version(), 3);
}

#[test]
fn many_writers_each_commit_exactly_once() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("registry.db");
    seed(&path);

    let features = vec!["f_a", "f_b", "f_c", "f_d"];
    add_features_concurrently(path.clone(), features.clone(), 10);

    let table = stored_table(&path);
    for feature in features {
        assert!(table.spec.feature(feature).is_some(), "{feature} missing");
    }
    assert_eq!(table.version(), 5);

    let conn = open_db(&path).unwrap();
    let service = RegistryService::new(SqliteRegistryRepository::try_new(&conn).unwrap());
    let history = service
        .list_history(ObjectKind::FeatureTable, "rides", "driver_stats")
        .unwrap();
    let versions: Vec<u64> = history.iter().map(|entry| entry.version).collect();
    assert_eq!(versions, vec![1, 2, 3, 4, 5]);
}

/// Repository that archives `project` from another connection right after the
/// first object read, so the archive lands between resolution and commit.
struct ArchiveAfterRead<'conn> {
    inner: SqliteRegistryRepository<'conn>,
    path: PathBuf,
    project: &'static str,
    fired: Cell<bool>,
}

impl ArchiveAfterRead<'_> {
    fn archive_once(&self) {
        if self.fired.replace(true) {
            return;
        }
        let other = open_db(&self.path).unwrap();
        SqliteRegistryRepository::try_new(&other)
            .unwrap()
            .archive_project(self.project)
            .unwrap();
    }
}

impl ProjectRepository for ArchiveAfterRead<'_> {
    fn insert_project(&self, project: &Project) -> RepoResult<()> {
        self.inner.insert_project(project)
    }

    fn ensure_project(&self, name: &str, created_at: i64) -> RepoResult<Project> {
        self.inner.ensure_project(name, created_at)
    }

    fn get_project(&self, name: &str) -> RepoResult<Option<Project>> {
        self.inner.get_project(name)
    }

    fn archive_project(&self, name: &str) -> RepoResult<()> {
        self.inner.archive_project(name)
    }

    fn list_projects(&self, include_archived: bool) -> RepoResult<Vec<Project>> {
        self.inner.list_projects(include_archived)
    }
}

impl ObjectRepository for ArchiveAfterRead<'_> {
    fn get_object<T: RegistryObject>(
        &self,
        scope: &str,
        name: &str,
        include_deleted: bool,
    ) -> RepoResult<Option<Versioned<T>>> {
        let found = self.inner.get_object(scope, name, include_deleted)?;
        self.archive_once();
        Ok(found)
    }

    fn scan_objects<T: RegistryObject>(&self, scope: &str) -> RepoResult<Vec<Versioned<T>>> {
        self.inner.scan_objects(scope)
    }

    fn compare_and_swap<T: RegistryObject>(
        &self,
        write: &ObjectWrite<'_, T>,
    ) -> RepoResult<CasOutcome> {
        self.inner.compare_and_swap(write)
    }

    fn list_history(
        &self,
        kind: ObjectKind,
        scope: &str,
        name: &str,
    ) -> RepoResult<Vec<HistoryEntry>> {
        self.inner.list_history(kind, scope, name)
    }
}

fn archive_racing_service<'conn>(
    conn: &'conn Connection,
    path: &Path,
) -> RegistryService<ArchiveAfterRead<'conn>> {
    RegistryService::new(ArchiveAfterRead {
        inner: SqliteRegistryRepository::try_new(conn).unwrap(),
        path: path.to_path_buf(),
        project: "rides",
        fired: Cell::new(false),
    })
}

fn history_rows(conn: &Connection, kind: &str) -> i64 {
    conn.query_row(
        "SELECT COUNT(*) FROM object_history WHERE kind = ?1 AND project = 'rides';",
        [kind],
        |row| row.get(0),
    )
    .unwrap()
}

#[test]
fn apply_into_project_archived_mid_request_is_rejected() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("registry.db");
    let conn = open_db(&path).unwrap();
    let service = archive_racing_service(&conn, &path);

    let err = service
        .apply_entity(EntitySpec::new("driver", ValueType::Int64), "rides")
        .unwrap_err();

    assert!(matches!(err, RegistryError::PreconditionFailed(_)), "{err}");
    let live: i64 = conn
        .query_row(
            "SELECT COUNT(*) FROM registry_objects WHERE project = 'rides';",
            [],
            |row| row.get(0),
        )
        .unwrap();
    assert_eq!(live, 0);
    assert_eq!(history_rows(&conn, "entity"), 0);
}

#[test]
fn delete_in_project_archived_mid_request_is_rejected() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("registry.db");
    seed(&path);
    let conn = open_db(&path).unwrap();
    let service = archive_racing_service(&conn, &path);

    let err = service
        .delete_feature_table("rides", "driver_stats")
        .unwrap_err();

    assert!(matches!(err, RegistryError::PreconditionFailed(_)), "{err}");
    let is_deleted: i64 = conn
        .query_row(
            "SELECT is_deleted FROM registry_objects
             WHERE kind = 'feature_table' AND project = 'rides' AND name = 'driver_stats';",
            [],
            |row| row.get(0),
        )
        .unwrap();
    assert_eq!(is_deleted, 0);
    assert_eq!(history_rows(&conn, "feature_table"), 1);
}
