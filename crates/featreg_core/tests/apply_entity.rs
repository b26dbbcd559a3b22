use featreg_core::db::open_db_in_memory;
use featreg_core::{
    ApplyStatus, EntityFilter, EntitySpec, RegistryError, RegistryService, SpecValidationError,
    SqliteRegistryRepository, ValueType, DEFAULT_PROJECT,
};

#[test]
fn first_apply_creates_version_one() {
    let conn = open_db_in_memory().unwrap();
    let service = RegistryService::new(SqliteRegistryRepository::try_new(&conn).unwrap());

    let outcome = service
        .apply_entity_with_status(EntitySpec::new("driver", ValueType::Int64), "")
        .unwrap();

    assert_eq!(outcome.status, ApplyStatus::Create);
    assert_eq!(outcome.object.version(), 1);
    assert_eq!(outcome.object.project, DEFAULT_PROJECT);
    assert_eq!(outcome.object.spec.value_type, ValueType::Int64);
}

#[test]
fn reapplying_identical_spec_is_no_change() {
    let conn = open_db_in_memory().unwrap();
    let service = RegistryService::new(SqliteRegistryRepository::try_new(&conn).unwrap());
    let spec = EntitySpec::new("driver", ValueType::Int64)
        .with_description("driver id")
        .with_label("team", "matchmaking");

    let created = service.apply_entity(spec.clone(), "rides").unwrap();
    let again = service.apply_entity_with_status(spec, "rides").unwrap();

    assert_eq!(again.status, ApplyStatus::NoChange);
    assert_eq!(again.object, created);
    let history = service
        .list_history(featreg_core::ObjectKind::Entity, "rides", "driver")
        .unwrap();
    assert_eq!(history.len(), 1);
}

#[test]
fn mutable_fields_update_and_bump_version() {
    let conn = open_db_in_memory().unwrap();
    let service = RegistryService::new(SqliteRegistryRepository::try_new(&conn).unwrap());

    service
        .apply_entity(EntitySpec::new("driver", ValueType::Int64), "rides")
        .unwrap();
    let outcome = service
        .apply_entity_with_status(
            EntitySpec::new("driver", ValueType::Int64)
                .with_description("driver id")
                .with_label("owner", "growth"),
            "rides",
        )
        .unwrap();

    assert_eq!(outcome.status, ApplyStatus::Update);
    assert_eq!(outcome.object.version(), 2);
    let loaded = service.get_entity("driver", "rides").unwrap();
    assert_eq!(loaded.spec.description, "driver id");
    assert_eq!(loaded.spec.labels.get("owner").map(String::as_str), Some("growth"));
    assert_eq!(loaded.version(), 2);
}

#[test]
fn changing_entity_value_type_is_rejected_without_write() {
    let conn = open_db_in_memory().unwrap();
    let service = RegistryService::new(SqliteRegistryRepository::try_new(&conn).unwrap());

    service
        .apply_entity(EntitySpec::new("driver", ValueType::Int64), "rides")
        .unwrap();
    let err = service
        .apply_entity(EntitySpec::new("driver", ValueType::String), "rides")
        .unwrap_err();

    match err {
        RegistryError::ImmutableFieldViolation { name, violation, .. } => {
            assert_eq!(name, "driver");
            assert_eq!(violation.field, "value_type");
        }
        other => panic!("unexpected error: {other}"),
    }
    let loaded = service.get_entity("driver", "rides").unwrap();
    assert_eq!(loaded.spec.value_type, ValueType::Int64);
    assert_eq!(loaded.version(), 1);
}

#[test]
fn same_name_in_two_projects_is_independent() {
    let conn = open_db_in_memory().unwrap();
    let service = RegistryService::new(SqliteRegistryRepository::try_new(&conn).unwrap());

    service
        .apply_entity(EntitySpec::new("customer", ValueType::Int64), "p1")
        .unwrap();
    service
        .apply_entity(EntitySpec::new("customer", ValueType::String), "p2")
        .unwrap();

    assert_eq!(
        service.get_entity("customer", "p1").unwrap().spec.value_type,
        ValueType::Int64
    );
    assert_eq!(
        service.get_entity("customer", "p2").unwrap().spec.value_type,
        ValueType::String
    );
    assert_eq!(
        service
            .list_entities(&EntityFilter::in_project("p1"))
            .unwrap()
            .len(),
        1
    );
}

#[test]
fn invalid_names_are_rejected_before_project_creation() {
    let conn = open_db_in_memory().unwrap();
    let service = RegistryService::new(SqliteRegistryRepository::try_new(&conn).unwrap());

    let err = service
        .apply_entity(EntitySpec::new("9lives", ValueType::Int64), "fresh")
        .unwrap_err();
    assert!(matches!(
        err,
        RegistryError::InvalidArgument(SpecValidationError::InvalidName { .. })
    ));
    assert!(service.list_projects().unwrap().is_empty());

    let err = service
        .apply_entity(EntitySpec::new("driver", ValueType::Int64), "bad-project")
        .unwrap_err();
    assert!(matches!(err, RegistryError::InvalidArgument(_)));
    assert_eq!(err.code(), "invalid_argument");
}

#[test]
fn get_missing_entity_is_not_found() {
    let conn = open_db_in_memory().unwrap();
    let service = RegistryService::new(SqliteRegistryRepository::try_new(&conn).unwrap());

    service
        .apply_entity(EntitySpec::new("driver", ValueType::Int64), "rides")
        .unwrap();

    assert!(matches!(
        service.get_entity("rider", "rides").unwrap_err(),
        RegistryError::NotFound(_)
    ));
    assert!(matches!(
        service.get_entity("driver", "unknown").unwrap_err(),
        RegistryError::NotFound(_)
    ));
    // Reads never vivify projects.
    assert_eq!(service.list_projects().unwrap(), vec!["rides".to_string()]);
}
