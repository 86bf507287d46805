//! DormantDatabase CRD types
//!
//! A `DormantDatabase` is the archive left behind when a database is deleted
//! with storage retained. It shares the namespace and name of the database it
//! archives and snapshots that database's metadata and spec in `origin`, so the
//! database can be resurrected onto the same storage later.
//!
//! `wipeOut` tells the external cleanup finalizer whether to destroy the backing
//! PVCs and secrets once the record itself is deleted.

use k8s_openapi::apimachinery::pkg::apis::meta::v1::ObjectMeta;
use kube::{CustomResource, ResourceExt};
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

use super::database::{
    DatabaseIdentity, DatabaseKind, MongoDbSpec, MySqlSpec, PostgresSpec, RedisSpec,
};
use crate::labels::LABEL_DATABASE_KIND;
use crate::Error;

/// Archived snapshot of a deleted database
#[derive(CustomResource, Clone, Debug, Deserialize, Serialize, JsonSchema, PartialEq)]
#[kube(
    group = "dbaas.dev",
    version = "v1alpha1",
    kind = "DormantDatabase",
    plural = "dormantdatabases",
    shortname = "drmn",
    namespaced,
    derive = "PartialEq",
    printcolumn = r#"{"name":"Kind","type":"string","jsonPath":".metadata.labels.dbaas\\.dev/kind"}"#,
    printcolumn = r#"{"name":"WipeOut","type":"boolean","jsonPath":".spec.wipeOut"}"#,
    printcolumn = r#"{"name":"Age","type":"date","jsonPath":".metadata.creationTimestamp"}"#
)]
#[serde(rename_all = "camelCase")]
pub struct DormantDatabaseSpec {
    /// Destroy backing storage and secrets when this record is deleted
    #[serde(default)]
    pub wipe_out: bool,

    /// The archived database
    pub origin: Origin,
}

/// Metadata and spec of the archived database
#[derive(Clone, Debug, Deserialize, Serialize, JsonSchema, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct Origin {
    /// Name, namespace, labels, annotations and creation timestamp of the
    /// original object. Server-managed fields are not carried over.
    pub metadata: ObjectMeta,

    /// The original engine spec
    pub spec: OriginSpec,
}

/// The archived engine spec, tagged by kind.
///
/// Serialized externally tagged, e.g. `{"redis": {...}}`, so exactly one
/// engine key is ever present.
#[derive(Clone, Debug, Deserialize, Serialize, JsonSchema, PartialEq)]
pub enum OriginSpec {
    /// Archived Postgres spec
    #[serde(rename = "postgres")]
    Postgres(PostgresSpec),
    /// Archived MySQL spec
    #[serde(rename = "mysql")]
    MySql(MySqlSpec),
    /// Archived MongoDB spec
    #[serde(rename = "mongodb")]
    MongoDb(MongoDbSpec),
    /// Archived Redis spec
    #[serde(rename = "redis")]
    Redis(RedisSpec),
}

impl OriginSpec {
    /// Kind of the archived database
    pub fn kind(&self) -> DatabaseKind {
        match self {
            OriginSpec::Postgres(_) => DatabaseKind::Postgres,
            OriginSpec::MySql(_) => DatabaseKind::MySql,
            OriginSpec::MongoDb(_) => DatabaseKind::MongoDb,
            OriginSpec::Redis(_) => DatabaseKind::Redis,
        }
    }
}

impl DormantDatabase {
    /// Kind of the archived database, taken from the origin spec
    pub fn origin_kind(&self) -> DatabaseKind {
        self.spec.origin.spec.kind()
    }

    /// Value of the `dbaas.dev/kind` label, if set
    pub fn kind_label(&self) -> Option<&str> {
        self.labels().get(LABEL_DATABASE_KIND).map(String::as_str)
    }

    /// Check the record's invariants.
    ///
    /// The kind label must match the populated origin variant, and the origin
    /// must describe an object with the record's own name and namespace.
    pub fn validate(&self) -> Result<(), Error> {
        let resource = format!(
            "DormantDatabase {}/{}",
            self.namespace().unwrap_or_default(),
            self.name_any()
        );
        let origin_kind = self.origin_kind();

        match self.kind_label() {
            None => {
                return Err(Error::validation_for(
                    resource,
                    format!("missing {} label", LABEL_DATABASE_KIND),
                ))
            }
            Some(label) if label != origin_kind.as_str() => {
                return Err(Error::validation_for(
                    resource,
                    format!(
                        "{} label '{}' does not match origin spec kind '{}'",
                        LABEL_DATABASE_KIND, label, origin_kind
                    ),
                ))
            }
            Some(_) => {}
        }

        let origin = &self.spec.origin.metadata;
        if origin.name != self.metadata.name || origin.namespace != self.metadata.namespace {
            return Err(Error::validation_for(
                resource,
                "origin metadata does not match record name/namespace",
            ));
        }

        Ok(())
    }

    /// Identity of the archived database
    pub fn identity(&self) -> Result<DatabaseIdentity, Error> {
        DatabaseIdentity::from_meta(self.origin_kind(), &self.metadata)
    }
}
