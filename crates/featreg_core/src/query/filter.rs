//! Filter types for every list operation.
//!
//! # Invariants
//! - Label filters are superset matches: every filter key must be present
//!   with an equal value; extra object labels are ignored.
//! - Entity filters are superset matches against a table's entity set.
//! - `project` is resolved to `default` by the caller when empty.

use crate::model::entity::EntitySpec;
use crate::model::feature_table::{feature_ref, FeatureSpec, FeatureTable, FeatureTableSpec};
use crate::model::store::StoreSpec;
use std::collections::BTreeMap;

/// Returns whether `labels` carries every key/value pair in `filter`.
pub fn labels_match(filter: &BTreeMap<String, String>, labels: &BTreeMap<String, String>) -> bool {
    filter
        .iter()
        .all(|(key, value)| labels.get(key).is_some_and(|actual| actual == value))
}

/// `ListEntities` filter.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct EntityFilter {
    pub project: String,
    pub labels: BTreeMap<String, String>,
}

impl EntityFilter {
    pub fn in_project(project: impl Into<String>) -> Self {
        Self {
            project: project.into(),
            ..Self::default()
        }
    }

    pub fn with_label(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.labels.insert(key.into(), value.into());
        self
    }

    pub fn matches(&self, spec: &EntitySpec) -> bool {
        labels_match(&self.labels, &spec.labels)
    }
}

/// `ListFeatureTables` filter.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct FeatureTableFilter {
    pub project: String,
    pub labels: BTreeMap<String, String>,
}

impl FeatureTableFilter {
    pub fn in_project(project: impl Into<String>) -> Self {
        Self {
            project: project.into(),
            ..Self::default()
        }
    }

    pub fn with_label(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.labels.insert(key.into(), value.into());
        self
    }

    pub fn matches(&self, spec: &FeatureTableSpec) -> bool {
        labels_match(&self.labels, &spec.labels)
    }
}

/// `ListFeatures` filter. Labels apply to feature labels, entities to the
/// owning table's entity set.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct FeatureFilter {
    pub project: String,
    pub labels: BTreeMap<String, String>,
    pub entities: Vec<String>,
}

impl FeatureFilter {
    pub fn in_project(project: impl Into<String>) -> Self {
        Self {
            project: project.into(),
            ..Self::default()
        }
    }

    pub fn with_label(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.labels.insert(key.into(), value.into());
        self
    }

    pub fn with_entity(mut self, entity: impl Into<String>) -> Self {
        self.entities.push(entity.into());
        self
    }

    pub fn table_matches(&self, spec: &FeatureTableSpec) -> bool {
        spec.has_entities(self.entities.iter().map(String::as_str))
    }

    pub fn feature_matches(&self, feature: &FeatureSpec) -> bool {
        labels_match(&self.labels, &feature.labels)
    }

    /// Collects matching features keyed by `table:feature` reference.
    pub fn select<'a>(
        &self,
        tables: impl IntoIterator<Item = &'a FeatureTable>,
    ) -> BTreeMap<String, FeatureSpec> {
        let mut selected = BTreeMap::new();
        for table in tables {
            if !table.is_active() || !self.table_matches(&table.spec) {
                continue;
            }
            for feature in &table.spec.features {
                if self.feature_matches(feature) {
                    selected.insert(feature_ref(&table.spec.name, &feature.name), feature.clone());
                }
            }
        }
        selected
    }
}

/// `ListStores` filter.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct StoreFilter {
    /// Exact store name; empty lists every store.
    pub name: String,
}

impl StoreFilter {
    pub fn named(name: impl Into<String>) -> Self {
        Self { name: name.into() }
    }

    pub fn matches(&self, spec: &StoreSpec) -> bool {
        let wanted = self.name.trim();
        wanted.is_empty() || spec.name == wanted
    }
}

#[cfg(test)]
mod tests {
    use super::{labels_match, EntityFilter, FeatureFilter, StoreFilter};
    use crate::model::entity::EntitySpec;
    use crate::model::feature_table::{FeatureSpec, FeatureTable, FeatureTableSpec};
    use crate::model::store::{StoreSpec, StoreType};
    use crate::model::value_type::ValueType;
    use crate::model::{ObjectMeta, Versioned};
    use std::collections::BTreeMap;

    fn labels(pairs: &[(&str, &str)]) -> BTreeMap<String, String> {
        pairs
            .iter()
            .map(|(key, value)| (key.to_string(), value.to_string()))
            .collect()
    }

    fn stored(spec: FeatureTableSpec) -> FeatureTable {
        Versioned {
            project: "default".to_string(),
            spec,
            meta: ObjectMeta {
                version: 1,
                created_at: 0,
                updated_at: 0,
                is_deleted: false,
            },
        }
    }

    #[test]
    fn empty_label_filter_matches_everything() {
        assert!(labels_match(&BTreeMap::new(), &labels(&[("a", "1")])));
        assert!(labels_match(&BTreeMap::new(), &BTreeMap::new()));
    }

    #[test]
    fn label_filter_is_superset_match() {
        let e1 = EntitySpec::new("e1", ValueType::Int64).with_label("a", "1");
        let e2 = EntitySpec::new("e2", ValueType::Int64)
            .with_label("a", "1")
            .with_label("b", "2");

        let only_a = EntityFilter::in_project("").with_label("a", "1");
        assert!(only_a.matches(&e1));
        assert!(only_a.matches(&e2));

        let a_and_b = only_a.clone().with_label("b", "2");
        assert!(!a_and_b.matches(&e1));
        assert!(a_and_b.matches(&e2));

        let other = EntityFilter::in_project("").with_label("c", "3");
        assert!(!other.matches(&e1));
        assert!(!other.matches(&e2));
    }

    #[test]
    fn label_values_must_be_equal_not_just_present() {
        let filter = labels(&[("a", "1")]);
        assert!(!labels_match(&filter, &labels(&[("a", "2")])));
    }

    #[test]
    fn feature_selection_applies_entity_superset_and_feature_labels() {
        let driver = stored(
            FeatureTableSpec::new("driver_stats", ["driver_id"])
                .with_feature(FeatureSpec::new("rating", ValueType::Double).with_label("tier", "gold"))
                .with_feature(FeatureSpec::new("trips", ValueType::Int64)),
        );
        let pair = stored(
            FeatureTableSpec::new("driver_rider", ["driver_id", "rider_id"])
                .with_feature(FeatureSpec::new("shared_trips", ValueType::Int64)),
        );
        let tables = [driver, pair];

        let all = FeatureFilter::in_project("").select(&tables);
        assert_eq!(
            all.keys().cloned().collect::<Vec<_>>(),
            vec![
                "driver_rider:shared_trips",
                "driver_stats:rating",
                "driver_stats:trips"
            ]
        );

        let by_rider = FeatureFilter::in_project("").with_entity("rider_id").select(&tables);
        assert_eq!(by_rider.len(), 1);
        assert!(by_rider.contains_key("driver_rider:shared_trips"));

        let gold = FeatureFilter::in_project("").with_label("tier", "gold").select(&tables);
        assert_eq!(gold.keys().collect::<Vec<_>>(), vec!["driver_stats:rating"]);

        let none = FeatureFilter::in_project("").with_entity("merchant_id").select(&tables);
        assert!(none.is_empty());
    }

    #[test]
    fn store_filter_matches_exact_name_or_everything() {
        let store = StoreSpec::new("online", StoreType::Redis);
        assert!(StoreFilter::default().matches(&store));
        assert!(StoreFilter::named("online").matches(&store));
        assert!(!StoreFilter::named("offline").matches(&store));
    }
}
