//! Termination waiter
//!
//! Deletion of a database's children is asynchronous: pods shut down
//! gracefully and services may carry finalizers. Archiving before they are gone
//! could snapshot a database that is still writing, so the archive path first
//! waits until no pod and then no service matches the database's selectors.

use std::collections::BTreeMap;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use k8s_openapi::api::core::v1::{Pod, Service};
use kube::api::{Api, ListParams};
use kube::Client;
use tracing::{debug, info, instrument};

#[cfg(test)]
use mockall::automock;

use dbaas_common::crd::DatabaseIdentity;
use dbaas_common::kube_utils::poll_until;
use dbaas_common::labels::{offshoot_selectors, selector_string};
use dbaas_common::{DormancyConfig, Error};

/// Label selectors for the child resources of one database instance
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ChildSelectors {
    /// Selects the database's pods (statefulset members)
    pub pods: BTreeMap<String, String>,
    /// Selects the database's services
    pub services: BTreeMap<String, String>,
}

/// Maps a database instance to the selectors of its children
pub trait SelectorResolver: Send + Sync {
    /// Resolve selectors for the given database
    fn resolve(&self, db: &DatabaseIdentity) -> ChildSelectors;
}

/// Resolves children through the standard offshoot labels (name + kind)
#[derive(Clone, Copy, Debug, Default)]
pub struct OffshootSelectorResolver;

impl SelectorResolver for OffshootSelectorResolver {
    fn resolve(&self, db: &DatabaseIdentity) -> ChildSelectors {
        let selectors = offshoot_selectors(db.kind, &db.name);
        ChildSelectors {
            pods: selectors.clone(),
            services: selectors,
        }
    }
}

/// Counts child resources matching a label selector
#[cfg_attr(test, automock)]
#[async_trait]
pub trait ChildResourceClient: Send + Sync {
    /// Number of pods in `namespace` matching `selector`
    async fn count_pods(&self, namespace: &str, selector: &str) -> Result<usize, Error>;

    /// Number of services in `namespace` matching `selector`
    async fn count_services(&self, namespace: &str, selector: &str) -> Result<usize, Error>;
}

/// Real Kubernetes client implementation
///
/// Lists metadata only; the bodies of pods and services are never needed.
pub struct KubeChildResourceClient {
    client: Client,
}

impl KubeChildResourceClient {
    /// Create a new KubeChildResourceClient wrapping the given client
    pub fn new(client: Client) -> Self {
        Self { client }
    }
}

#[async_trait]
impl ChildResourceClient for KubeChildResourceClient {
    async fn count_pods(&self, namespace: &str, selector: &str) -> Result<usize, Error> {
        let api: Api<Pod> = Api::namespaced(self.client.clone(), namespace);
        let list = api
            .list_metadata(&ListParams::default().labels(selector))
            .await
            .map_err(|e| Error::from_api(e, "Pod", namespace, selector))?;
        Ok(list.items.len())
    }

    async fn count_services(&self, namespace: &str, selector: &str) -> Result<usize, Error> {
        let api: Api<Service> = Api::namespaced(self.client.clone(), namespace);
        let list = api
            .list_metadata(&ListParams::default().labels(selector))
            .await
            .map_err(|e| Error::from_api(e, "Service", namespace, selector))?;
        Ok(list.items.len())
    }
}

#[derive(Clone, Copy, Debug)]
enum ChildKind {
    Pods,
    Services,
}

impl ChildKind {
    fn as_str(&self) -> &'static str {
        match self {
            ChildKind::Pods => "pods",
            ChildKind::Services => "services",
        }
    }
}

/// Blocks until a database's pods and services are gone
#[derive(Clone)]
pub struct TerminationWaiter {
    children: Arc<dyn ChildResourceClient>,
    resolver: Arc<dyn SelectorResolver>,
    poll_interval: Duration,
    timeout: Duration,
}

impl TerminationWaiter {
    /// Create a waiter with the configured poll interval and per-phase timeout
    pub fn new(
        children: Arc<dyn ChildResourceClient>,
        resolver: Arc<dyn SelectorResolver>,
        config: &DormancyConfig,
    ) -> Self {
        Self {
            children,
            resolver,
            poll_interval: config.poll_interval,
            timeout: config.termination_timeout,
        }
    }

    /// Wait until no pods, then no services, match the database's selectors.
    ///
    /// Each phase has its own deadline. Exceeding it yields `Timeout`; a failed
    /// list call aborts the wait with that error. Nothing is persisted, so a
    /// redriven reconcile simply starts over.
    ///
    /// An empty selector would match every pod or service in the namespace and
    /// is rejected with `Validation` before anything is listed.
    #[instrument(skip(self, db), fields(db = %db))]
    pub async fn wait_until_paused(&self, db: &DatabaseIdentity) -> Result<(), Error> {
        let selectors = self.resolver.resolve(db);
        for (child, selector) in [
            (ChildKind::Pods, &selectors.pods),
            (ChildKind::Services, &selectors.services),
        ] {
            if selector.is_empty() {
                return Err(Error::validation_for(
                    db.to_string(),
                    format!("empty {} selector", child.as_str()),
                ));
            }
        }

        self.wait_until_gone(db, ChildKind::Pods, &selector_string(&selectors.pods))
            .await?;
        self.wait_until_gone(db, ChildKind::Services, &selector_string(&selectors.services))
            .await?;

        info!("all pods and services terminated");
        Ok(())
    }

    async fn wait_until_gone(
        &self,
        db: &DatabaseIdentity,
        child: ChildKind,
        selector: &str,
    ) -> Result<(), Error> {
        let namespace = db.namespace.as_str();
        let children = &self.children;

        poll_until(
            self.timeout,
            self.poll_interval,
            format!("{} of {} to terminate", child.as_str(), db),
            namespace,
            || async move {
                let remaining = match child {
                    ChildKind::Pods => children.count_pods(namespace, selector).await?,
                    ChildKind::Services => children.count_services(namespace, selector).await?,
                };
                if remaining > 0 {
                    debug!(child = child.as_str(), remaining, selector, "waiting for termination");
                }
                Ok::<bool, Error>(remaining == 0)
            },
        )
        .await
    }
}
