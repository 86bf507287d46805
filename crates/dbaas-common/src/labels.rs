//! Label keys and selector helpers shared by every database kind
//!
//! Child resources (pods, services, statefulsets) of a database instance are
//! found through the offshoot selectors: the database's name and kind.

use std::collections::BTreeMap;

use crate::crd::DatabaseKind;

/// Label carrying the database kind (e.g. "Redis")
pub const LABEL_DATABASE_KIND: &str = "dbaas.dev/kind";

/// Label carrying the database instance name
pub const LABEL_DATABASE_NAME: &str = "dbaas.dev/name";

/// Standard label for the managing component
pub const LABEL_MANAGED_BY: &str = "app.kubernetes.io/managed-by";

/// Value of `LABEL_MANAGED_BY` on objects we create
pub const MANAGED_BY_DBAAS: &str = "dbaas.dev";

/// Selector labels identifying every child resource of a database instance
pub fn offshoot_selectors(kind: DatabaseKind, name: &str) -> BTreeMap<String, String> {
    BTreeMap::from([
        (LABEL_DATABASE_NAME.to_string(), name.to_string()),
        (LABEL_DATABASE_KIND.to_string(), kind.as_str().to_string()),
    ])
}

/// Render a label map as a Kubernetes equality-based label selector.
///
/// Keys come out sorted (`BTreeMap` order) so the same map always renders
/// the same selector string.
pub fn selector_string(labels: &BTreeMap<String, String>) -> String {
    labels
        .iter()
        .map(|(k, v)| format!("{}={}", k, v))
        .collect::<Vec<_>>()
        .join(",")
}
