//! Online store model and subscription matching.
//!
//! # Invariants
//! - `name` is the update key; every other field is replaceable.
//! - Subscriptions match `(project, table)` pairs with `*` wildcards;
//!   exclusion rules win over inclusion rules.

use super::validation::{validate_object_name, SpecValidationError};
use super::{ObjectKind, RegistryObject, Versioned};
use regex::Regex;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StoreType {
    Redis,
    RedisCluster,
}

/// Selects which feature tables a store serves.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Subscription {
    /// Project name or glob pattern.
    pub project: String,
    /// Feature table name or glob pattern.
    pub name: String,
    /// When set, matching tables are removed from the selection.
    #[serde(default)]
    pub exclude: bool,
}

impl Subscription {
    pub fn include(project: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            project: project.into(),
            name: name.into(),
            exclude: false,
        }
    }

    pub fn exclude(project: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            exclude: true,
            ..Self::include(project, name)
        }
    }

    /// Returns whether this rule's patterns match the given table.
    pub fn matches(&self, project: &str, table: &str) -> bool {
        glob_matches(&self.project, project) && glob_matches(&self.name, table)
    }
}

/// Desired state of an online store.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StoreSpec {
    pub name: String,
    pub store_type: StoreType,
    #[serde(default)]
    pub subscriptions: Vec<Subscription>,
    /// Backend connection settings, opaque to the registry.
    #[serde(default)]
    pub config: BTreeMap<String, String>,
}

/// Stored store with version metadata.
pub type Store = Versioned<StoreSpec>;

impl StoreSpec {
    pub fn new(name: impl Into<String>, store_type: StoreType) -> Self {
        Self {
            name: name.into(),
            store_type,
            subscriptions: Vec::new(),
            config: BTreeMap::new(),
        }
    }

    pub fn with_subscription(mut self, subscription: Subscription) -> Self {
        self.subscriptions.push(subscription);
        self
    }

    pub fn with_config(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.config.insert(key.into(), value.into());
        self
    }

    /// Returns whether this store should serve `table` from `project`.
    pub fn subscribes_to(&self, project: &str, table: &str) -> bool {
        let mut included = false;
        for subscription in &self.subscriptions {
            if !subscription.matches(project, table) {
                continue;
            }
            if subscription.exclude {
                return false;
            }
            included = true;
        }
        included
    }
}

impl RegistryObject for StoreSpec {
    const KIND: ObjectKind = ObjectKind::Store;

    fn name(&self) -> &str {
        &self.name
    }

    fn validate(&self) -> Result<(), SpecValidationError> {
        validate_object_name("store", &self.name)?;
        for subscription in &self.subscriptions {
            if subscription.project.trim().is_empty() {
                return Err(SpecValidationError::EmptySubscriptionField {
                    store: self.name.clone(),
                    field: "project",
                });
            }
            if subscription.name.trim().is_empty() {
                return Err(SpecValidationError::EmptySubscriptionField {
                    store: self.name.clone(),
                    field: "name",
                });
            }
        }
        Ok(())
    }

    /// Subscriptions are order-insensitive, so they are sorted and deduped.
    fn canonicalize(mut self) -> Self {
        self.subscriptions.sort_by(|left, right| {
            (&left.project, &left.name, left.exclude).cmp(&(
                &right.project,
                &right.name,
                right.exclude,
            ))
        });
        self.subscriptions.dedup();
        self
    }
}

fn glob_matches(pattern: &str, value: &str) -> bool {
    if !pattern.contains('*') {
        return pattern == value;
    }
    let escaped = regex::escape(pattern).replace(r"\*", ".*");
    match Regex::new(&format!("^{escaped}$")) {
        Ok(re) => re.is_match(value),
        Err(_) => false,
    }
}

#[cfg(test)]
mod tests {
    use super::{glob_matches, StoreSpec, StoreType, Subscription};
    use crate::model::validation::SpecValidationError;
    use crate::model::RegistryObject;

    #[test]
    fn glob_supports_wildcards_and_literals() {
        assert!(glob_matches("*", "anything"));
        assert!(glob_matches("driver_*", "driver_trips"));
        assert!(!glob_matches("driver_*", "rider_trips"));
        assert!(glob_matches("exact", "exact"));
        assert!(!glob_matches("a.c", "abc"));
    }

    #[test]
    fn exclusion_overrides_inclusion() {
        let store = StoreSpec::new("online", StoreType::Redis)
            .with_subscription(Subscription::include("*", "*"))
            .with_subscription(Subscription::exclude("fraud", "raw_*"));

        assert!(store.subscribes_to("default", "driver_trips"));
        assert!(store.subscribes_to("fraud", "scores"));
        assert!(!store.subscribes_to("fraud", "raw_events"));
    }

    #[test]
    fn canonicalize_sorts_and_dedups_subscriptions() {
        let forward = StoreSpec::new("online", StoreType::Redis)
            .with_subscription(Subscription::include("*", "*"))
            .with_subscription(Subscription::exclude("fraud", "raw_*"));
        let reversed = StoreSpec::new("online", StoreType::Redis)
            .with_subscription(Subscription::exclude("fraud", "raw_*"))
            .with_subscription(Subscription::include("*", "*"))
            .with_subscription(Subscription::include("*", "*"));

        let forward = forward.canonicalize();
        assert_eq!(reversed.canonicalize(), forward);
        assert_eq!(forward.subscriptions.len(), 2);
    }

    #[test]
    fn store_without_subscriptions_serves_nothing() {
        let store = StoreSpec::new("online", StoreType::Redis);
        assert!(!store.subscribes_to("default", "t"));
    }

    #[test]
    fn empty_subscription_fields_are_rejected() {
        let store = StoreSpec::new("online", StoreType::RedisCluster)
            .with_subscription(Subscription::include("", "*"));
        assert_eq!(
            store.validate(),
            Err(SpecValidationError::EmptySubscriptionField {
                store: "online".to_string(),
                field: "project",
            })
        );
    }
}
