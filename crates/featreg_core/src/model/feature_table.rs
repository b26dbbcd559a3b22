//! Feature table and feature models.
//!
//! # Responsibility
//! - Describe a group of features keyed by a fixed set of entities.
//! - Validate table-local invariants (names, duplicates, reserved columns).
//!
//! # Invariants
//! - `name` and the `entities` set never change once committed.
//! - Features are additive: a committed `(name, value_type)` pair is never
//!   altered or removed by an apply.
//! - Canonical form sorts entities and features by name.

use super::validation::{
    is_reserved_feature_name, validate_labels, validate_object_name, SpecValidationError,
};
use super::value_type::ValueType;
use super::{ObjectKind, RegistryObject, Versioned};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};

/// Separator between table and feature names in a feature reference.
pub const FEATURE_REF_SEPARATOR: char = ':';

/// One feature column inside a table.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FeatureSpec {
    pub name: String,
    pub value_type: ValueType,
    #[serde(default)]
    pub labels: BTreeMap<String, String>,
}

impl FeatureSpec {
    pub fn new(name: impl Into<String>, value_type: ValueType) -> Self {
        Self {
            name: name.into(),
            value_type,
            labels: BTreeMap::new(),
        }
    }

    pub fn with_label(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.labels.insert(key.into(), value.into());
        self
    }
}

/// Where feature rows for a table come from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SourceType {
    File,
    BigQuery,
    Kafka,
    Kinesis,
}

impl SourceType {
    pub fn is_streaming(self) -> bool {
        matches!(self, Self::Kafka | Self::Kinesis)
    }
}

/// Batch or stream source configuration attached to a table.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DataSource {
    pub source_type: SourceType,
    pub event_timestamp_column: String,
    #[serde(default)]
    pub created_timestamp_column: String,
    /// Source column -> feature/entity name.
    #[serde(default)]
    pub field_mapping: BTreeMap<String, String>,
    /// Backend-specific settings (path, topic, table ref...).
    #[serde(default)]
    pub options: BTreeMap<String, String>,
}

impl DataSource {
    pub fn new(source_type: SourceType, event_timestamp_column: impl Into<String>) -> Self {
        Self {
            source_type,
            event_timestamp_column: event_timestamp_column.into(),
            created_timestamp_column: String::new(),
            field_mapping: BTreeMap::new(),
            options: BTreeMap::new(),
        }
    }

    pub fn with_option(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.options.insert(key.into(), value.into());
        self
    }

    fn validate(&self, table: &str, slot: &str) -> Result<(), SpecValidationError> {
        let invalid = |message: String| SpecValidationError::InvalidDataSource {
            table: table.to_string(),
            message,
        };

        if self.event_timestamp_column.trim().is_empty() {
            return Err(invalid(format!("{slot} requires an event timestamp column")));
        }
        if self
            .field_mapping
            .iter()
            .any(|(from, to)| from.trim().is_empty() || to.trim().is_empty())
        {
            return Err(invalid(format!("{slot} field mapping has an empty column")));
        }
        Ok(())
    }
}

/// Desired state of a feature table.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FeatureTableSpec {
    pub name: String,
    pub entities: Vec<String>,
    #[serde(default)]
    pub features: Vec<FeatureSpec>,
    #[serde(default)]
    pub labels: BTreeMap<String, String>,
    /// Staleness bound for serving; `None` means unbounded.
    #[serde(default)]
    pub max_age_secs: Option<u64>,
    #[serde(default)]
    pub batch_source: Option<DataSource>,
    #[serde(default)]
    pub stream_source: Option<DataSource>,
}

/// Stored feature table with version metadata.
pub type FeatureTable = Versioned<FeatureTableSpec>;

impl FeatureTableSpec {
    pub fn new<I, S>(name: impl Into<String>, entities: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            name: name.into(),
            entities: entities.into_iter().map(Into::into).collect(),
            features: Vec::new(),
            labels: BTreeMap::new(),
            max_age_secs: None,
            batch_source: None,
            stream_source: None,
        }
    }

    pub fn with_feature(mut self, feature: FeatureSpec) -> Self {
        self.features.push(feature);
        self
    }

    pub fn with_label(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.labels.insert(key.into(), value.into());
        self
    }

    pub fn feature(&self, name: &str) -> Option<&FeatureSpec> {
        self.features.iter().find(|feature| feature.name == name)
    }

    /// Returns whether every name in `required` is one of this table's entities.
    pub fn has_entities<'a>(&self, required: impl IntoIterator<Item = &'a str>) -> bool {
        required
            .into_iter()
            .all(|entity| self.entities.iter().any(|own| own == entity))
    }
}

impl RegistryObject for FeatureTableSpec {
    const KIND: ObjectKind = ObjectKind::FeatureTable;

    fn name(&self) -> &str {
        &self.name
    }

    fn validate(&self) -> Result<(), SpecValidationError> {
        validate_object_name("feature table", &self.name)?;
        validate_labels(&self.name, &self.labels)?;

        if self.entities.is_empty() {
            return Err(SpecValidationError::MissingEntities {
                table: self.name.clone(),
            });
        }
        let mut entities = BTreeSet::new();
        for entity in &self.entities {
            validate_object_name("entity", entity)?;
            if !entities.insert(entity.as_str()) {
                return Err(SpecValidationError::DuplicateEntity {
                    table: self.name.clone(),
                    entity: entity.clone(),
                });
            }
        }

        let mut features = BTreeSet::new();
        for feature in &self.features {
            validate_object_name("feature", &feature.name)?;
            validate_labels(&feature.name, &feature.labels)?;
            if !features.insert(feature.name.as_str()) {
                return Err(SpecValidationError::DuplicateFeature {
                    table: self.name.clone(),
                    feature: feature.name.clone(),
                });
            }
            if is_reserved_feature_name(&feature.name) {
                return Err(SpecValidationError::ReservedFeatureName {
                    table: self.name.clone(),
                    feature: feature.name.clone(),
                });
            }
            if entities.contains(feature.name.as_str()) {
                return Err(SpecValidationError::FeatureShadowsEntity {
                    table: self.name.clone(),
                    feature: feature.name.clone(),
                });
            }
        }

        if let Some(source) = &self.batch_source {
            source.validate(&self.name, "batch source")?;
        }
        if let Some(source) = &self.stream_source {
            if !source.source_type.is_streaming() {
                return Err(SpecValidationError::InvalidDataSource {
                    table: self.name.clone(),
                    message: "stream source must be kafka or kinesis".to_string(),
                });
            }
            source.validate(&self.name, "stream source")?;
        }
        Ok(())
    }

    fn canonicalize(mut self) -> Self {
        self.entities.sort();
        self.features.sort_by(|left, right| left.name.cmp(&right.name));
        self
    }
}

/// Builds the `table:feature` reference used by feature listings.
pub fn feature_ref(table: &str, feature: &str) -> String {
    format!("{table}{FEATURE_REF_SEPARATOR}{feature}")
}

#[cfg(test)]
mod tests {
    use super::{feature_ref, DataSource, FeatureSpec, FeatureTableSpec, SourceType};
    use crate::model::validation::SpecValidationError;
    use crate::model::value_type::ValueType;
    use crate::model::RegistryObject;

    fn trips_table() -> FeatureTableSpec {
        FeatureTableSpec::new("driver_trips", ["driver_id"])
            .with_feature(FeatureSpec::new("trips_today", ValueType::Int64))
            .with_feature(FeatureSpec::new("avg_rating", ValueType::Double))
    }

    #[test]
    fn valid_table_passes() {
        assert_eq!(trips_table().validate(), Ok(()));
    }

    #[test]
    fn duplicate_feature_names_are_rejected() {
        let spec = trips_table().with_feature(FeatureSpec::new("trips_today", ValueType::Int32));
        assert!(matches!(
            spec.validate(),
            Err(SpecValidationError::DuplicateFeature { feature, .. }) if feature == "trips_today"
        ));
    }

    #[test]
    fn reserved_and_entity_named_features_are_rejected() {
        let reserved =
            trips_table().with_feature(FeatureSpec::new("event_timestamp", ValueType::Int64));
        assert!(matches!(
            reserved.validate(),
            Err(SpecValidationError::ReservedFeatureName { .. })
        ));

        let shadow = trips_table().with_feature(FeatureSpec::new("driver_id", ValueType::Int64));
        assert!(matches!(
            shadow.validate(),
            Err(SpecValidationError::FeatureShadowsEntity { .. })
        ));
    }

    #[test]
    fn table_without_entities_is_rejected() {
        let spec = FeatureTableSpec::new("orphan", Vec::<String>::new());
        assert!(matches!(
            spec.validate(),
            Err(SpecValidationError::MissingEntities { .. })
        ));
    }

    #[test]
    fn stream_source_must_be_streaming_kind() {
        let mut spec = trips_table();
        spec.stream_source = Some(DataSource::new(SourceType::File, "ts"));
        assert!(matches!(
            spec.validate(),
            Err(SpecValidationError::InvalidDataSource { .. })
        ));

        spec.stream_source =
            Some(DataSource::new(SourceType::Kafka, "ts").with_option("topic", "trips"));
        assert_eq!(spec.validate(), Ok(()));
    }

    #[test]
    fn canonical_form_sorts_entities_and_features() {
        let spec = FeatureTableSpec::new("t", ["rider_id", "driver_id"])
            .with_feature(FeatureSpec::new("b", ValueType::Int64))
            .with_feature(FeatureSpec::new("a", ValueType::Int64))
            .canonicalize();
        assert_eq!(spec.entities, vec!["driver_id", "rider_id"]);
        assert_eq!(spec.features[0].name, "a");
        assert_eq!(spec.features[1].name, "b");
    }

    #[test]
    fn feature_ref_joins_table_and_feature() {
        assert_eq!(feature_ref("driver_trips", "trips_today"), "driver_trips:trips_today");
    }
}
