//! DormantDatabase store
//!
//! [`DormantDatabaseApi`] is the thin object-store seam (one call per API
//! request) that tests mock. [`DormantStore`] layers the semantics the archive
//! and resurrection paths rely on over it: NotFound handling, no silent
//! overwrite on create, a bounded conflict-retry loop for the `wipeOut` patch,
//! and background-cascade deletes.

use std::sync::Arc;

use async_trait::async_trait;
use kube::api::{Api, DeleteParams, PostParams, PropagationPolicy};
use kube::{Client, ResourceExt};
use tracing::{debug, info};

#[cfg(test)]
use mockall::automock;

use dbaas_common::crd::DormantDatabase;
use dbaas_common::retry::{retry_with_backoff, RetryConfig};
use dbaas_common::{DormancyConfig, Error, FIELD_MANAGER};

/// Kind string used in errors and logs
pub const DORMANT_KIND: &str = "DormantDatabase";

/// Raw DormantDatabase operations against the object store
///
/// Implementations classify API failures with [`Error::from_api`] so callers
/// see `NotFound`, `AlreadyExists` and `Conflict` rather than HTTP codes.
#[cfg_attr(test, automock)]
#[async_trait]
pub trait DormantDatabaseApi: Send + Sync {
    /// Fetch a record; `Ok(None)` if it does not exist
    async fn get(&self, namespace: &str, name: &str) -> Result<Option<DormantDatabase>, Error>;

    /// Create a record; `AlreadyExists` if the name is taken
    async fn create(&self, record: &DormantDatabase) -> Result<DormantDatabase, Error>;

    /// Replace a record, guarded by its `resourceVersion`; `Conflict` if stale
    async fn replace(&self, record: &DormantDatabase) -> Result<DormantDatabase, Error>;

    /// Request deletion with the given propagation; `NotFound` if absent
    async fn delete(
        &self,
        namespace: &str,
        name: &str,
        propagation: PropagationPolicy,
    ) -> Result<(), Error>;
}

/// Real Kubernetes client implementation
pub struct KubeDormantDatabaseApi {
    client: Client,
}

impl KubeDormantDatabaseApi {
    /// Create a new KubeDormantDatabaseApi wrapping the given client
    pub fn new(client: Client) -> Self {
        Self { client }
    }

    fn api(&self, namespace: &str) -> Api<DormantDatabase> {
        Api::namespaced(self.client.clone(), namespace)
    }
}

fn post_params() -> PostParams {
    PostParams {
        field_manager: Some(FIELD_MANAGER.to_string()),
        ..Default::default()
    }
}

#[async_trait]
impl DormantDatabaseApi for KubeDormantDatabaseApi {
    async fn get(&self, namespace: &str, name: &str) -> Result<Option<DormantDatabase>, Error> {
        self.api(namespace)
            .get_opt(name)
            .await
            .map_err(|e| Error::from_api(e, DORMANT_KIND, namespace, name))
    }

    async fn create(&self, record: &DormantDatabase) -> Result<DormantDatabase, Error> {
        let namespace = record.namespace().unwrap_or_default();
        self.api(&namespace)
            .create(&post_params(), record)
            .await
            .map_err(|e| Error::from_api(e, DORMANT_KIND, &namespace, record.name_any()))
    }

    async fn replace(&self, record: &DormantDatabase) -> Result<DormantDatabase, Error> {
        let namespace = record.namespace().unwrap_or_default();
        let name = record.name_any();
        self.api(&namespace)
            .replace(&name, &post_params(), record)
            .await
            .map_err(|e| Error::from_api(e, DORMANT_KIND, &namespace, &name))
    }

    async fn delete(
        &self,
        namespace: &str,
        name: &str,
        propagation: PropagationPolicy,
    ) -> Result<(), Error> {
        let params = DeleteParams {
            propagation_policy: Some(propagation),
            ..Default::default()
        };
        self.api(namespace)
            .delete(name, &params)
            .await
            .map(|_| ())
            .map_err(|e| Error::from_api(e, DORMANT_KIND, namespace, name))
    }
}

/// DormantDatabase CRUD with the archive/resurrection semantics
#[derive(Clone)]
pub struct DormantStore {
    api: Arc<dyn DormantDatabaseApi>,
    patch_retry: RetryConfig,
}

impl DormantStore {
    /// Create a store over the given API with the configured retry budget
    pub fn new(api: Arc<dyn DormantDatabaseApi>, config: &DormancyConfig) -> Self {
        Self {
            api,
            patch_retry: RetryConfig::with_max_attempts(config.patch_max_attempts)
                .initial_delay(config.patch_retry_delay),
        }
    }

    /// Fetch a record, failing with `NotFound` if it does not exist
    pub async fn get(&self, namespace: &str, name: &str) -> Result<DormantDatabase, Error> {
        self.find(namespace, name)
            .await?
            .ok_or_else(|| Error::not_found(DORMANT_KIND, namespace, name))
    }

    /// Fetch a record if it exists
    pub async fn find(
        &self,
        namespace: &str,
        name: &str,
    ) -> Result<Option<DormantDatabase>, Error> {
        self.api.get(namespace, name).await
    }

    /// Create a record.
    ///
    /// Never overwrites: an existing record may carry a different `wipeOut`
    /// intent, so `AlreadyExists` is returned to the caller untouched.
    pub async fn create(&self, record: &DormantDatabase) -> Result<DormantDatabase, Error> {
        record.validate()?;
        let created = self.api.create(record).await?;
        info!(
            namespace = %created.namespace().unwrap_or_default(),
            name = %created.name_any(),
            kind = %created.origin_kind(),
            "created dormant database"
        );
        Ok(created)
    }

    /// Set `spec.wipeOut` with a read-modify-write.
    ///
    /// Each attempt reads the current record and replaces it under its
    /// `resourceVersion`. A `Conflict` triggers a fresh read, up to the
    /// configured attempt budget; past the budget the `Conflict` is returned
    /// with the attempt count. If the flag already holds `value`, nothing is
    /// written.
    pub async fn patch_wipe_out(
        &self,
        namespace: &str,
        name: &str,
        value: bool,
    ) -> Result<DormantDatabase, Error> {
        let result = retry_with_backoff(
            &self.patch_retry,
            "patch_dormant_wipe_out",
            Error::is_conflict,
            || async move {
                let mut current = self.get(namespace, name).await?;
                if current.spec.wipe_out == value {
                    debug!(namespace = %namespace, name = %name, "wipeOut already {}", value);
                    return Ok(current);
                }
                current.spec.wipe_out = value;
                self.api.replace(&current).await
            },
        )
        .await;

        match result {
            Ok(record) => {
                debug!(namespace = %namespace, name = %name, wipe_out = value, "patched wipeOut");
                Ok(record)
            }
            Err(e) => Err(e.with_attempts(self.patch_retry.max_attempts)),
        }
    }

    /// Request background-cascade deletion of a record.
    ///
    /// Returns once the API server accepts the request, not once the record
    /// is gone. A record that is already absent counts as deleted.
    pub async fn delete(&self, namespace: &str, name: &str) -> Result<(), Error> {
        match self
            .api
            .delete(namespace, name, PropagationPolicy::Background)
            .await
        {
            Ok(()) => {
                info!(namespace = %namespace, name = %name, "requested dormant database deletion");
                Ok(())
            }
            Err(e) if e.is_not_found() => {
                debug!(namespace = %namespace, name = %name, "dormant database already gone");
                Ok(())
            }
            Err(e) => Err(e),
        }
    }
}
