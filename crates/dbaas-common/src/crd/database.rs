//! Database engine CRDs
//!
//! Each supported engine is its own namespaced custom resource. Code that has
//! to handle "any database" goes through the [`Database`] trait, or through
//! [`AnyDatabase`] when the object arrives untyped from a dynamic watch.

use std::fmt;
use std::str::FromStr;

use k8s_openapi::apimachinery::pkg::apis::meta::v1::ObjectMeta;
use kube::api::DynamicObject;
use kube::{CustomResource, Resource};
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

use super::dormant::OriginSpec;
use super::types::{SecretRef, StorageSpec, StorageType, TerminationPolicy};
use crate::{Error, API_GROUP};

// =============================================================================
// DatabaseKind
// =============================================================================

/// The database engines the operator manages
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum DatabaseKind {
    /// PostgreSQL
    Postgres,
    /// MySQL
    MySql,
    /// MongoDB
    MongoDb,
    /// Redis
    Redis,
}

impl DatabaseKind {
    /// All supported kinds
    pub const ALL: [DatabaseKind; 4] = [
        DatabaseKind::Postgres,
        DatabaseKind::MySql,
        DatabaseKind::MongoDb,
        DatabaseKind::Redis,
    ];

    /// The Kubernetes `kind` string of the engine's custom resource
    pub fn as_str(&self) -> &'static str {
        match self {
            DatabaseKind::Postgres => "Postgres",
            DatabaseKind::MySql => "MySQL",
            DatabaseKind::MongoDb => "MongoDB",
            DatabaseKind::Redis => "Redis",
        }
    }
}

impl fmt::Display for DatabaseKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for DatabaseKind {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::ALL
            .into_iter()
            .find(|k| k.as_str() == s)
            .ok_or_else(|| Error::unsupported_kind(s))
    }
}

// =============================================================================
// DatabaseIdentity
// =============================================================================

/// (kind, namespace, name) of a database instance
///
/// A dormant record shares the namespace and name of the database it archives,
/// so the same identity keys the live object, its children and its archive.
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub struct DatabaseIdentity {
    /// Engine kind
    pub kind: DatabaseKind,
    /// Namespace of the instance
    pub namespace: String,
    /// Name of the instance
    pub name: String,
}

impl DatabaseIdentity {
    /// Create an identity from its parts
    pub fn new(kind: DatabaseKind, namespace: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            kind,
            namespace: namespace.into(),
            name: name.into(),
        }
    }

    /// Read the identity out of object metadata
    ///
    /// Databases are namespaced, so missing name or namespace is an invariant
    /// violation rather than a runtime condition.
    pub fn from_meta(kind: DatabaseKind, meta: &ObjectMeta) -> Result<Self, Error> {
        let name = meta
            .name
            .clone()
            .ok_or_else(|| Error::validation_for(kind.as_str(), "object has no name"))?;
        let namespace = meta.namespace.clone().ok_or_else(|| {
            Error::validation_for(format!("{} {}", kind, name), "object has no namespace")
        })?;
        Ok(Self {
            kind,
            namespace,
            name,
        })
    }
}

impl fmt::Display for DatabaseIdentity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} {}/{}", self.kind, self.namespace, self.name)
    }
}

// =============================================================================
// Database trait
// =============================================================================

/// Behaviour shared by every database engine resource
pub trait Database: Send + Sync {
    /// Engine kind of this instance
    fn database_kind(&self) -> DatabaseKind;

    /// Object metadata of this instance
    fn object_meta(&self) -> &ObjectMeta;

    /// Deep copy of the engine spec wrapped in its `OriginSpec` variant
    fn origin_spec(&self) -> OriginSpec;

    /// (kind, namespace, name) of this instance
    fn identity(&self) -> Result<DatabaseIdentity, Error> {
        DatabaseIdentity::from_meta(self.database_kind(), self.object_meta())
    }
}

// =============================================================================
// Engine CRDs
// =============================================================================

/// PostgreSQL database instance
#[derive(CustomResource, Clone, Debug, Default, Deserialize, Serialize, JsonSchema, PartialEq)]
#[kube(
    group = "dbaas.dev",
    version = "v1alpha1",
    kind = "Postgres",
    plural = "postgreses",
    shortname = "pg",
    namespaced,
    printcolumn = r#"{"name":"Version","type":"string","jsonPath":".spec.version"}"#,
    printcolumn = r#"{"name":"Age","type":"date","jsonPath":".metadata.creationTimestamp"}"#
)]
#[serde(rename_all = "camelCase")]
pub struct PostgresSpec {
    /// Postgres version (e.g. "16.2")
    pub version: String,

    /// Number of instances (primary + standbys)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub replicas: Option<i32>,

    /// Durable or ephemeral storage
    #[serde(default)]
    pub storage_type: StorageType,

    /// PVC request when `storageType` is durable
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub storage: Option<StorageSpec>,

    /// Secret holding the superuser credentials
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub database_secret: Option<SecretRef>,

    /// Behaviour on deletion
    #[serde(default)]
    pub termination_policy: TerminationPolicy,
}

/// MySQL database instance
#[derive(CustomResource, Clone, Debug, Default, Deserialize, Serialize, JsonSchema, PartialEq)]
#[kube(
    group = "dbaas.dev",
    version = "v1alpha1",
    kind = "MySQL",
    root = "MySql",
    plural = "mysqls",
    shortname = "my",
    namespaced,
    printcolumn = r#"{"name":"Version","type":"string","jsonPath":".spec.version"}"#,
    printcolumn = r#"{"name":"Age","type":"date","jsonPath":".metadata.creationTimestamp"}"#
)]
#[serde(rename_all = "camelCase")]
pub struct MySqlSpec {
    /// MySQL version (e.g. "8.0.36")
    pub version: String,

    /// Number of group-replication members
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub replicas: Option<i32>,

    /// Durable or ephemeral storage
    #[serde(default)]
    pub storage_type: StorageType,

    /// PVC request when `storageType` is durable
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub storage: Option<StorageSpec>,

    /// Secret holding the root credentials
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub database_secret: Option<SecretRef>,

    /// Behaviour on deletion
    #[serde(default)]
    pub termination_policy: TerminationPolicy,
}

/// MongoDB database instance
#[derive(CustomResource, Clone, Debug, Default, Deserialize, Serialize, JsonSchema, PartialEq)]
#[kube(
    group = "dbaas.dev",
    version = "v1alpha1",
    kind = "MongoDB",
    root = "MongoDb",
    plural = "mongodbs",
    shortname = "mg",
    namespaced,
    printcolumn = r#"{"name":"Version","type":"string","jsonPath":".spec.version"}"#,
    printcolumn = r#"{"name":"Age","type":"date","jsonPath":".metadata.creationTimestamp"}"#
)]
#[serde(rename_all = "camelCase")]
pub struct MongoDbSpec {
    /// MongoDB version (e.g. "7.0.5")
    pub version: String,

    /// Number of replica-set members
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub replicas: Option<i32>,

    /// Replica-set name; standalone when omitted
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub replica_set_name: Option<String>,

    /// Durable or ephemeral storage
    #[serde(default)]
    pub storage_type: StorageType,

    /// PVC request when `storageType` is durable
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub storage: Option<StorageSpec>,

    /// Secret holding the admin credentials
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub database_secret: Option<SecretRef>,

    /// Behaviour on deletion
    #[serde(default)]
    pub termination_policy: TerminationPolicy,
}

/// Redis deployment topology
#[derive(Clone, Copy, Debug, Default, Deserialize, Serialize, JsonSchema, PartialEq, Eq)]
pub enum RedisMode {
    /// Single primary
    #[default]
    Standalone,
    /// Sharded Redis Cluster
    Cluster,
}

/// Redis database instance
#[derive(CustomResource, Clone, Debug, Default, Deserialize, Serialize, JsonSchema, PartialEq)]
#[kube(
    group = "dbaas.dev",
    version = "v1alpha1",
    kind = "Redis",
    plural = "redises",
    shortname = "rd",
    namespaced,
    printcolumn = r#"{"name":"Version","type":"string","jsonPath":".spec.version"}"#,
    printcolumn = r#"{"name":"Mode","type":"string","jsonPath":".spec.mode"}"#,
    printcolumn = r#"{"name":"Age","type":"date","jsonPath":".metadata.creationTimestamp"}"#
)]
#[serde(rename_all = "camelCase")]
pub struct RedisSpec {
    /// Redis version (e.g. "7.2.4")
    pub version: String,

    /// Standalone or cluster topology
    #[serde(default)]
    pub mode: RedisMode,

    /// Number of instances (standalone) or shards (cluster)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub replicas: Option<i32>,

    /// Durable or ephemeral storage
    #[serde(default)]
    pub storage_type: StorageType,

    /// PVC request when `storageType` is durable
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub storage: Option<StorageSpec>,

    /// Behaviour on deletion
    #[serde(default)]
    pub termination_policy: TerminationPolicy,
}

impl Database for Postgres {
    fn database_kind(&self) -> DatabaseKind {
        DatabaseKind::Postgres
    }

    fn object_meta(&self) -> &ObjectMeta {
        self.meta()
    }

    fn origin_spec(&self) -> OriginSpec {
        OriginSpec::Postgres(self.spec.clone())
    }
}

impl Database for MySql {
    fn database_kind(&self) -> DatabaseKind {
        DatabaseKind::MySql
    }

    fn object_meta(&self) -> &ObjectMeta {
        self.meta()
    }

    fn origin_spec(&self) -> OriginSpec {
        OriginSpec::MySql(self.spec.clone())
    }
}

impl Database for MongoDb {
    fn database_kind(&self) -> DatabaseKind {
        DatabaseKind::MongoDb
    }

    fn object_meta(&self) -> &ObjectMeta {
        self.meta()
    }

    fn origin_spec(&self) -> OriginSpec {
        OriginSpec::MongoDb(self.spec.clone())
    }
}

impl Database for Redis {
    fn database_kind(&self) -> DatabaseKind {
        DatabaseKind::Redis
    }

    fn object_meta(&self) -> &ObjectMeta {
        self.meta()
    }

    fn origin_spec(&self) -> OriginSpec {
        OriginSpec::Redis(self.spec.clone())
    }
}

// =============================================================================
// AnyDatabase
// =============================================================================

/// A database of any supported kind
#[derive(Clone, Debug)]
pub enum AnyDatabase {
    /// PostgreSQL instance
    Postgres(Postgres),
    /// MySQL instance
    MySql(MySql),
    /// MongoDB instance
    MongoDb(MongoDb),
    /// Redis instance
    Redis(Redis),
}

impl AnyDatabase {
    fn inner(&self) -> &dyn Database {
        match self {
            AnyDatabase::Postgres(db) => db,
            AnyDatabase::MySql(db) => db,
            AnyDatabase::MongoDb(db) => db,
            AnyDatabase::Redis(db) => db,
        }
    }
}

impl Database for AnyDatabase {
    fn database_kind(&self) -> DatabaseKind {
        self.inner().database_kind()
    }

    fn object_meta(&self) -> &ObjectMeta {
        self.inner().object_meta()
    }

    fn origin_spec(&self) -> OriginSpec {
        self.inner().origin_spec()
    }
}

impl TryFrom<&DynamicObject> for AnyDatabase {
    type Error = Error;

    /// Type an untyped object. Objects outside the `dbaas.dev` group or with
    /// an unknown kind are rejected with `UnsupportedKind`.
    fn try_from(obj: &DynamicObject) -> Result<Self, Self::Error> {
        let types = obj
            .types
            .as_ref()
            .ok_or_else(|| Error::unsupported_kind("<missing apiVersion/kind>"))?;

        let group = types.api_version.split('/').next().unwrap_or_default();
        if group != API_GROUP {
            return Err(Error::unsupported_kind(format!(
                "{}/{}",
                types.api_version, types.kind
            )));
        }

        let kind: DatabaseKind = types.kind.parse()?;
        let value = serde_json::to_value(obj)?;
        let typed =
            |e: serde_json::Error| Error::serialization_for_kind(kind.as_str(), e.to_string());

        Ok(match kind {
            DatabaseKind::Postgres => {
                AnyDatabase::Postgres(serde_json::from_value(value).map_err(typed)?)
            }
            DatabaseKind::MySql => AnyDatabase::MySql(serde_json::from_value(value).map_err(typed)?),
            DatabaseKind::MongoDb => {
                AnyDatabase::MongoDb(serde_json::from_value(value).map_err(typed)?)
            }
            DatabaseKind::Redis => AnyDatabase::Redis(serde_json::from_value(value).map_err(typed)?),
        })
    }
}
