//! Shared test fixtures

use std::collections::BTreeMap;

use k8s_openapi::apimachinery::pkg::apis::meta::v1::{ObjectMeta, Time};
use chrono::{TimeZone, Utc};

use dbaas_common::crd::{
    DormantDatabase, DormantDatabaseSpec, Origin, OriginSpec, Redis, RedisMode, RedisSpec,
    StorageSpec, StorageType, TerminationPolicy,
};
use dbaas_common::labels::{LABEL_DATABASE_KIND, LABEL_MANAGED_BY, MANAGED_BY_DBAAS};

pub(crate) fn redis_spec() -> RedisSpec {
    RedisSpec {
        version: "7.2.4".to_string(),
        mode: RedisMode::Standalone,
        replicas: Some(1),
        storage_type: StorageType::Durable,
        storage: Some(StorageSpec {
            storage_class_name: Some("standard".to_string()),
            size: "1Gi".to_string(),
        }),
        termination_policy: TerminationPolicy::Pause,
    }
}

/// A live Redis `ns1/cache1` as the API server would return it
pub(crate) fn redis_db() -> Redis {
    let mut db = Redis::new("cache1", redis_spec());
    db.metadata = ObjectMeta {
        name: Some("cache1".to_string()),
        namespace: Some("ns1".to_string()),
        uid: Some("0b6f3c52-7f1e-4c1a-9d0e-2a7c1f6d9e11".to_string()),
        resource_version: Some("4711".to_string()),
        generation: Some(2),
        creation_timestamp: Some(Time(
            Utc.with_ymd_and_hms(2026, 3, 1, 12, 0, 0).single().expect("valid date"),
        )),
        labels: Some(BTreeMap::from([("team".to_string(), "payments".to_string())])),
        annotations: Some(BTreeMap::from([(
            "dbaas.dev/owner".to_string(),
            "alice".to_string(),
        )])),
        finalizers: Some(vec!["dbaas.dev/finalizer".to_string()]),
        ..Default::default()
    };
    db
}

/// A consistent dormant record archiving Redis `ns1/cache1`
pub(crate) fn redis_record(wipe_out: bool) -> DormantDatabase {
    let mut record = DormantDatabase::new(
        "cache1",
        DormantDatabaseSpec {
            wipe_out,
            origin: Origin {
                metadata: ObjectMeta {
                    name: Some("cache1".to_string()),
                    namespace: Some("ns1".to_string()),
                    ..Default::default()
                },
                spec: OriginSpec::Redis(redis_spec()),
            },
        },
    );
    record.metadata.namespace = Some("ns1".to_string());
    record.metadata.labels = Some(BTreeMap::from([
        (LABEL_DATABASE_KIND.to_string(), "Redis".to_string()),
        (LABEL_MANAGED_BY.to_string(), MANAGED_BY_DBAAS.to_string()),
    ]));
    record
}
