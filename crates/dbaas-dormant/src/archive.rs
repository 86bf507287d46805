//! Archive builder
//!
//! Turns a live database object into the `DormantDatabase` that preserves it.
//! Pure: nothing here talks to the API server.

use std::collections::BTreeMap;

use k8s_openapi::apimachinery::pkg::apis::meta::v1::ObjectMeta;
use kube::api::DynamicObject;

use dbaas_common::crd::{
    AnyDatabase, Database, DormantDatabase, DormantDatabaseSpec, Origin,
};
use dbaas_common::labels::{LABEL_DATABASE_KIND, LABEL_MANAGED_BY, MANAGED_BY_DBAAS};
use dbaas_common::Error;

/// Build the dormant record for a database.
///
/// The record takes the database's name and namespace and is labelled with its
/// kind. The origin keeps the user-facing metadata (name, namespace, labels,
/// annotations, creation timestamp) and a deep copy of the spec; uid,
/// resourceVersion, finalizers and the like are left behind since they belong
/// to the deleted object. `wipeOut` starts out false.
pub fn build_dormant_database<D: Database + ?Sized>(db: &D) -> Result<DormantDatabase, Error> {
    let identity = db.identity()?;
    let meta = db.object_meta();

    let origin = Origin {
        metadata: ObjectMeta {
            name: meta.name.clone(),
            namespace: meta.namespace.clone(),
            labels: meta.labels.clone(),
            annotations: meta.annotations.clone(),
            creation_timestamp: meta.creation_timestamp.clone(),
            ..Default::default()
        },
        spec: db.origin_spec(),
    };

    let mut record = DormantDatabase::new(
        &identity.name,
        DormantDatabaseSpec {
            wipe_out: false,
            origin,
        },
    );
    record.metadata.namespace = Some(identity.namespace);
    record.metadata.labels = Some(BTreeMap::from([
        (
            LABEL_DATABASE_KIND.to_string(),
            identity.kind.as_str().to_string(),
        ),
        (LABEL_MANAGED_BY.to_string(), MANAGED_BY_DBAAS.to_string()),
    ]));

    Ok(record)
}

/// Build the dormant record for an untyped object
///
/// Fails with `UnsupportedKind` if the object is not a dbaas database.
pub fn build_dormant_database_dynamic(obj: &DynamicObject) -> Result<DormantDatabase, Error> {
    let db = AnyDatabase::try_from(obj)?;
    build_dormant_database(&db)
}
