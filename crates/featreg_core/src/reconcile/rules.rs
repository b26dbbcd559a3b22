//! Field classification tables and accessors for each object kind.

use super::{FieldClass, FieldRule, ImmutableFieldViolation, Reconcile};
use crate::model::entity::EntitySpec;
use crate::model::feature_table::FeatureTableSpec;
use crate::model::store::StoreSpec;

pub const ENTITY_FIELDS: &[FieldRule] = &[
    FieldRule::new("name", FieldClass::Immutable),
    FieldRule::new("value_type", FieldClass::Immutable),
    FieldRule::new("description", FieldClass::Mutable),
    FieldRule::new("labels", FieldClass::Mutable),
];

pub const FEATURE_TABLE_FIELDS: &[FieldRule] = &[
    FieldRule::new("name", FieldClass::Immutable),
    FieldRule::new("entities", FieldClass::Immutable),
    FieldRule::new("features", FieldClass::AdditiveOnly),
    FieldRule::new("labels", FieldClass::Mutable),
    FieldRule::new("max_age_secs", FieldClass::Mutable),
    FieldRule::new("batch_source", FieldClass::Mutable),
    FieldRule::new("stream_source", FieldClass::Mutable),
];

pub const STORE_FIELDS: &[FieldRule] = &[
    FieldRule::new("name", FieldClass::Immutable),
    FieldRule::new("store_type", FieldClass::Mutable),
    FieldRule::new("subscriptions", FieldClass::Mutable),
    FieldRule::new("config", FieldClass::Mutable),
];

impl Reconcile for EntitySpec {
    const FIELD_RULES: &'static [FieldRule] = ENTITY_FIELDS;

    fn field_eq(field: &str, left: &Self, right: &Self) -> bool {
        match field {
            "name" => left.name == right.name,
            "value_type" => left.value_type == right.value_type,
            "description" => left.description == right.description,
            "labels" => left.labels == right.labels,
            _ => true,
        }
    }

    fn describe_field(field: &str, spec: &Self) -> String {
        match field {
            "name" => spec.name.clone(),
            "value_type" => spec.value_type.to_string(),
            "description" => spec.description.clone(),
            "labels" => format!("{:?}", spec.labels),
            _ => String::new(),
        }
    }

    fn take_field(field: &str, target: &mut Self, source: &Self) {
        match field {
            "description" => target.description = source.description.clone(),
            "labels" => target.labels = source.labels.clone(),
            _ => {}
        }
    }
}

impl Reconcile for FeatureTableSpec {
    const FIELD_RULES: &'static [FieldRule] = FEATURE_TABLE_FIELDS;

    fn field_eq(field: &str, left: &Self, right: &Self) -> bool {
        match field {
            "name" => left.name == right.name,
            "entities" => left.entities == right.entities,
            "features" => left.features == right.features,
            "labels" => left.labels == right.labels,
            "max_age_secs" => left.max_age_secs == right.max_age_secs,
            "batch_source" => left.batch_source == right.batch_source,
            "stream_source" => left.stream_source == right.stream_source,
            _ => true,
        }
    }

    fn describe_field(field: &str, spec: &Self) -> String {
        match field {
            "name" => spec.name.clone(),
            "entities" => spec.entities.join(","),
            "features" => spec
                .features
                .iter()
                .map(|feature| format!("{}:{}", feature.name, feature.value_type))
                .collect::<Vec<_>>()
                .join(","),
            "labels" => format!("{:?}", spec.labels),
            "max_age_secs" => format!("{:?}", spec.max_age_secs),
            "batch_source" => format!("{:?}", spec.batch_source),
            "stream_source" => format!("{:?}", spec.stream_source),
            _ => String::new(),
        }
    }

    fn take_field(field: &str, target: &mut Self, source: &Self) {
        match field {
            "labels" => target.labels = source.labels.clone(),
            "max_age_secs" => target.max_age_secs = source.max_age_secs,
            "batch_source" => target.batch_source = source.batch_source.clone(),
            "stream_source" => target.stream_source = source.stream_source.clone(),
            _ => {}
        }
    }

    fn merge_additive(
        field: &str,
        target: &mut Self,
        source: &Self,
    ) -> Result<bool, ImmutableFieldViolation> {
        if field != "features" {
            return Ok(false);
        }

        let mut changed = false;
        for desired in &source.features {
            match target
                .features
                .iter_mut()
                .find(|existing| existing.name == desired.name)
            {
                Some(existing) => {
                    if existing.value_type != desired.value_type {
                        return Err(ImmutableFieldViolation {
                            field: format!("features.{}.value_type", desired.name),
                            current: existing.value_type.to_string(),
                            desired: desired.value_type.to_string(),
                        });
                    }
                    if existing.labels != desired.labels {
                        existing.labels = desired.labels.clone();
                        changed = true;
                    }
                }
                None => {
                    target.features.push(desired.clone());
                    changed = true;
                }
            }
        }
        Ok(changed)
    }
}

impl Reconcile for StoreSpec {
    const FIELD_RULES: &'static [FieldRule] = STORE_FIELDS;

    fn field_eq(field: &str, left: &Self, right: &Self) -> bool {
        match field {
            "name" => left.name == right.name,
            "store_type" => left.store_type == right.store_type,
            "subscriptions" => left.subscriptions == right.subscriptions,
            "config" => left.config == right.config,
            _ => true,
        }
    }

    fn describe_field(field: &str, spec: &Self) -> String {
        match field {
            "name" => spec.name.clone(),
            "store_type" => format!("{:?}", spec.store_type),
            "subscriptions" => format!("{:?}", spec.subscriptions),
            "config" => format!("{:?}", spec.config),
            _ => String::new(),
        }
    }

    fn take_field(field: &str, target: &mut Self, source: &Self) {
        match field {
            "store_type" => target.store_type = source.store_type,
            "subscriptions" => target.subscriptions = source.subscriptions.clone(),
            "config" => target.config = source.config.clone(),
            _ => {}
        }
    }
}

#[cfg(test)]
mod tests {
    use super::{ENTITY_FIELDS, FEATURE_TABLE_FIELDS, STORE_FIELDS};
    use crate::reconcile::FieldClass;

    #[test]
    fn identity_fields_are_immutable_for_every_kind() {
        for table in [ENTITY_FIELDS, FEATURE_TABLE_FIELDS, STORE_FIELDS] {
            let name_rule = table
                .iter()
                .find(|rule| rule.field == "name")
                .expect("every kind classifies its name");
            assert_eq!(name_rule.class, FieldClass::Immutable);
        }
    }

    #[test]
    fn features_are_the_only_additive_field() {
        let additive: Vec<_> = FEATURE_TABLE_FIELDS
            .iter()
            .filter(|rule| rule.class == FieldClass::AdditiveOnly)
            .map(|rule| rule.field)
            .collect();
        assert_eq!(additive, vec!["features"]);
    }
}
