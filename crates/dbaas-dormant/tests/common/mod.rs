//! In-memory object store for the dormancy integration tests
//!
//! Mimics the API server semantics the crate depends on: resourceVersion
//! optimistic concurrency, NotFound / AlreadyExists / Conflict, and background
//! deletes that return before the object is actually gone.

#![allow(dead_code)]

use std::collections::BTreeMap;
use std::sync::atomic::{AtomicU64, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use chrono::{TimeZone, Utc};
use k8s_openapi::apimachinery::pkg::apis::meta::v1::{ObjectMeta, Time};
use kube::api::PropagationPolicy;
use kube::ResourceExt;

use dbaas_common::crd::{DormantDatabase, Redis, RedisSpec, StorageSpec, TerminationPolicy};
use dbaas_common::{DormancyConfig, Error};
use dbaas_dormant::store::DORMANT_KIND;
use dbaas_dormant::{
    ChildResourceClient, Context, DormantDatabaseApi, DormantStore, OffshootSelectorResolver,
};

/// Something the fake observed, in call order
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Op {
    CountPods(usize),
    CountServices(usize),
    Get,
    Create,
    Replace { wipe_out: bool },
    Delete { wipe_out_at_delete: bool },
}

#[derive(Default)]
struct State {
    records: BTreeMap<(String, String), DormantDatabase>,
    ops: Vec<Op>,
}

/// Fake cluster holding DormantDatabases and a draining set of children
#[derive(Default)]
pub struct FakeCluster {
    state: Mutex<State>,
    next_version: AtomicU64,
    pods: AtomicUsize,
    services: AtomicUsize,
    pending_conflicts: AtomicUsize,
}

impl FakeCluster {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    /// Children that disappear one per poll after being counted
    pub fn with_children(self: Arc<Self>, pods: usize, services: usize) -> Arc<Self> {
        self.pods.store(pods, Ordering::SeqCst);
        self.services.store(services, Ordering::SeqCst);
        self
    }

    /// Make the next `n` replaces lose a race against another writer
    pub fn inject_conflicts(&self, n: usize) {
        self.pending_conflicts.store(n, Ordering::SeqCst);
    }

    /// Store a record directly, as if created earlier
    pub fn seed(&self, mut record: DormantDatabase) {
        record.metadata.resource_version = Some(self.bump().to_string());
        let key = key_of(&record);
        self.state.lock().unwrap().records.insert(key, record);
    }

    pub fn record(&self, namespace: &str, name: &str) -> Option<DormantDatabase> {
        self.state
            .lock()
            .unwrap()
            .records
            .get(&(namespace.to_string(), name.to_string()))
            .cloned()
    }

    /// Finish background deletions: drop every record marked for deletion
    pub fn finish_deletions(&self) {
        self.state
            .lock()
            .unwrap()
            .records
            .retain(|_, r| r.metadata.deletion_timestamp.is_none());
    }

    pub fn ops(&self) -> Vec<Op> {
        self.state.lock().unwrap().ops.clone()
    }

    pub fn clear_ops(&self) {
        self.state.lock().unwrap().ops.clear();
    }

    fn bump(&self) -> u64 {
        self.next_version.fetch_add(1, Ordering::SeqCst) + 1
    }

    fn log(&self, op: Op) {
        self.state.lock().unwrap().ops.push(op);
    }

    fn drain(counter: &AtomicUsize) -> usize {
        let current = counter.load(Ordering::SeqCst);
        if current > 0 {
            counter.store(current - 1, Ordering::SeqCst);
        }
        current
    }
}

fn key_of(record: &DormantDatabase) -> (String, String) {
    (record.namespace().unwrap_or_default(), record.name_any())
}

#[async_trait]
impl DormantDatabaseApi for FakeCluster {
    async fn get(&self, namespace: &str, name: &str) -> Result<Option<DormantDatabase>, Error> {
        self.log(Op::Get);
        Ok(self.record(namespace, name))
    }

    async fn create(&self, record: &DormantDatabase) -> Result<DormantDatabase, Error> {
        let key = key_of(record);
        let mut state = self.state.lock().unwrap();
        state.ops.push(Op::Create);
        if state.records.contains_key(&key) {
            return Err(Error::already_exists(DORMANT_KIND, key.0, key.1));
        }
        let mut stored = record.clone();
        stored.metadata.resource_version = Some(self.bump().to_string());
        stored.metadata.uid = Some(format!("uid-{}", key.1));
        state.records.insert(key, stored.clone());
        Ok(stored)
    }

    async fn replace(&self, record: &DormantDatabase) -> Result<DormantDatabase, Error> {
        let key = key_of(record);
        let mut state = self.state.lock().unwrap();
        state.ops.push(Op::Replace {
            wipe_out: record.spec.wipe_out,
        });

        let current = state
            .records
            .get_mut(&key)
            .ok_or_else(|| Error::not_found(DORMANT_KIND, &key.0, &key.1))?;

        if self.pending_conflicts.load(Ordering::SeqCst) > 0 {
            self.pending_conflicts.fetch_sub(1, Ordering::SeqCst);
            // Another writer got there first
            current.metadata.resource_version = Some(self.bump().to_string());
            return Err(Error::conflict(DORMANT_KIND, &key.0, &key.1));
        }
        if current.metadata.resource_version != record.metadata.resource_version {
            return Err(Error::conflict(DORMANT_KIND, &key.0, &key.1));
        }

        current.spec = record.spec.clone();
        current.metadata.resource_version = Some(self.bump().to_string());
        Ok(current.clone())
    }

    async fn delete(
        &self,
        namespace: &str,
        name: &str,
        propagation: PropagationPolicy,
    ) -> Result<(), Error> {
        assert!(matches!(propagation, PropagationPolicy::Background));
        let mut state = self.state.lock().unwrap();
        let key = (namespace.to_string(), name.to_string());

        let wipe_out_at_delete = match state.records.get_mut(&key) {
            Some(record) => {
                record.metadata.deletion_timestamp = Some(Time(Utc::now()));
                record.spec.wipe_out
            }
            None => return Err(Error::not_found(DORMANT_KIND, namespace, name)),
        };
        state.ops.push(Op::Delete { wipe_out_at_delete });
        Ok(())
    }
}

#[async_trait]
impl ChildResourceClient for FakeCluster {
    async fn count_pods(&self, _namespace: &str, _selector: &str) -> Result<usize, Error> {
        let n = Self::drain(&self.pods);
        self.log(Op::CountPods(n));
        Ok(n)
    }

    async fn count_services(&self, _namespace: &str, _selector: &str) -> Result<usize, Error> {
        let n = Self::drain(&self.services);
        self.log(Op::CountServices(n));
        Ok(n)
    }
}

pub fn test_config() -> DormancyConfig {
    DormancyConfig {
        poll_interval: Duration::from_secs(1),
        termination_timeout: Duration::from_secs(30),
        requeue_after: Duration::from_secs(10),
        ..Default::default()
    }
}

pub fn context(cluster: &Arc<FakeCluster>) -> Arc<Context> {
    Arc::new(Context::from_parts(
        cluster.clone(),
        cluster.clone(),
        Arc::new(OffshootSelectorResolver),
        test_config(),
    ))
}

pub fn store(cluster: &Arc<FakeCluster>) -> DormantStore {
    DormantStore::new(cluster.clone(), &test_config())
}

/// Live Redis `ns1/cache1`
pub fn cache1() -> Redis {
    let mut db = Redis::new(
        "cache1",
        RedisSpec {
            version: "7.2.4".to_string(),
            replicas: Some(3),
            storage: Some(StorageSpec {
                storage_class_name: None,
                size: "5Gi".to_string(),
            }),
            termination_policy: TerminationPolicy::Pause,
            ..Default::default()
        },
    );
    db.metadata = ObjectMeta {
        name: Some("cache1".to_string()),
        namespace: Some("ns1".to_string()),
        uid: Some("live-uid".to_string()),
        creation_timestamp: Some(Time(
            Utc.with_ymd_and_hms(2026, 1, 15, 9, 30, 0).single().unwrap(),
        )),
        labels: Some(BTreeMap::from([("tier".to_string(), "cache".to_string())])),
        ..Default::default()
    };
    db
}
