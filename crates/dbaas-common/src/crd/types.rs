//! Spec building blocks shared by the database engine CRDs

use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

/// Whether a database keeps its data on persistent volumes
#[derive(Clone, Copy, Debug, Default, Deserialize, Serialize, JsonSchema, PartialEq, Eq)]
pub enum StorageType {
    /// Data lives on PersistentVolumeClaims and survives pod restarts
    #[default]
    Durable,
    /// Data lives on emptyDir volumes and is lost with the pod
    Ephemeral,
}

/// What happens to a database's storage when the user deletes it
#[derive(Clone, Copy, Debug, Default, Deserialize, Serialize, JsonSchema, PartialEq, Eq)]
pub enum TerminationPolicy {
    /// Archive into a DormantDatabase and keep storage for resurrection
    #[default]
    Pause,
    /// Delete workloads but keep PVCs and secrets
    Delete,
    /// Delete workloads, PVCs and secrets
    WipeOut,
    /// Reject deletion
    DoNotTerminate,
}

/// Persistent volume request for a database
#[derive(Clone, Debug, Default, Deserialize, Serialize, JsonSchema, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct StorageSpec {
    /// Storage class for the PVCs; cluster default when omitted
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub storage_class_name: Option<String>,

    /// Requested size (Kubernetes quantity, e.g. "10Gi")
    pub size: String,
}

/// Reference to a Secret in the database's namespace
#[derive(Clone, Debug, Default, Deserialize, Serialize, JsonSchema, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct SecretRef {
    /// Name of the Secret
    pub secret_name: String,
}
