//! Reconcile entrypoints for the archive and resurrection paths
//!
//! Both entrypoints take the kube-runtime shape (`Arc<object>`, `Arc<Context>`)
//! and return an [`Action`], so they can be handed to a `Controller` directly.
//! Each run holds the per-key lock for the database's (namespace, name).

use std::sync::Arc;

use kube::runtime::controller::Action;
use kube::Client;
use tracing::{debug, error, info, instrument, warn};

use dbaas_common::crd::Database;
use dbaas_common::{DormancyConfig, Error};

use crate::archive::build_dormant_database;
use crate::lifecycle::{DormancyEvent, DormancyState};
use crate::lock::KeyedLocks;
use crate::resurrect::{ResurrectionGuard, ResurrectionOutcome};
use crate::store::{DormantDatabaseApi, DormantStore, KubeDormantDatabaseApi};
use crate::waiter::{
    ChildResourceClient, KubeChildResourceClient, OffshootSelectorResolver, SelectorResolver,
    TerminationWaiter,
};

// =============================================================================
// Controller context
// =============================================================================

/// Shared state for all reconcile calls
pub struct Context {
    /// Waits for a deleted database's children to go away
    pub waiter: TerminationWaiter,
    /// DormantDatabase access
    pub store: DormantStore,
    /// Resurrection path
    pub guard: ResurrectionGuard,
    /// Per-(namespace, name) exclusion
    pub locks: KeyedLocks,
    /// Timing and retry settings
    pub config: DormancyConfig,
}

impl Context {
    /// Create a context backed by the Kubernetes API
    pub fn new(client: Client, config: DormancyConfig) -> Self {
        Self::from_parts(
            Arc::new(KubeDormantDatabaseApi::new(client.clone())),
            Arc::new(KubeChildResourceClient::new(client)),
            Arc::new(OffshootSelectorResolver),
            config,
        )
    }

    /// Create a context from explicit clients
    pub fn from_parts(
        dormant_api: Arc<dyn DormantDatabaseApi>,
        children: Arc<dyn ChildResourceClient>,
        resolver: Arc<dyn SelectorResolver>,
        config: DormancyConfig,
    ) -> Self {
        let store = DormantStore::new(dormant_api, &config);
        Self {
            waiter: TerminationWaiter::new(children, resolver, &config),
            guard: ResurrectionGuard::new(store.clone()),
            store,
            locks: KeyedLocks::new(),
            config,
        }
    }
}

// =============================================================================
// Archive path
// =============================================================================

/// Archive a database that was deleted with its storage retained
///
/// Waits for pods and services to terminate, then creates the dormant record.
/// An existing record is never overwritten; its `AlreadyExists` is returned so
/// the resurrection path can run first.
#[instrument(skip(db, ctx), fields(kind = %db.database_kind()))]
pub async fn reconcile_on_delete<D: Database + ?Sized>(
    db: Arc<D>,
    ctx: Arc<Context>,
) -> Result<Action, Error> {
    let id = db.identity()?;
    let guard = ctx.locks.lock(&id.namespace, &id.name).await;

    let result = archive(db.as_ref(), &ctx).await;

    drop(guard);
    ctx.locks.prune();
    result
}

async fn archive<D: Database + ?Sized>(db: &D, ctx: &Context) -> Result<Action, Error> {
    let id = db.identity()?;
    let state = DormancyState::Active.transition(DormancyEvent::DeleteRequested)?;
    info!(namespace = %id.namespace, name = %id.name, %state, "waiting for children to terminate");

    ctx.waiter.wait_until_paused(&id).await?;

    let record = build_dormant_database(db)?;
    ctx.store.create(&record).await?;

    let state = state.transition(DormancyEvent::ChildrenTerminated)?;
    info!(namespace = %id.namespace, name = %id.name, %state, "database archived");
    Ok(Action::await_change())
}

// =============================================================================
// Resurrection path
// =============================================================================

/// Clear the dormant record of a database created under an archived name
///
/// After a resurrection the key is requeued once so the next pass can observe
/// the record gone.
#[instrument(skip(db, ctx), fields(kind = %db.database_kind()))]
pub async fn reconcile_on_create<D: Database + ?Sized>(
    db: Arc<D>,
    ctx: Arc<Context>,
) -> Result<Action, Error> {
    let id = db.identity()?;
    let guard = ctx.locks.lock(&id.namespace, &id.name).await;

    let result = ctx.guard.reconcile_on_create(db.as_ref()).await;

    drop(guard);
    ctx.locks.prune();

    match result? {
        ResurrectionOutcome::NoDormantRecord => Ok(Action::await_change()),
        ResurrectionOutcome::Resurrected { .. } => {
            debug!(
                namespace = %id.namespace,
                name = %id.name,
                "requeueing until dormant record is gone"
            );
            Ok(Action::requeue(ctx.config.requeue_after))
        }
    }
}

/// Requeue strategy shared by both entrypoints
///
/// Retryable errors (timeouts, conflicts, transport failures) are requeued
/// after the configured delay. The rest need a change to the object or to the
/// cluster before another attempt can succeed.
pub fn error_policy<D: Database + ?Sized>(db: Arc<D>, error: &Error, ctx: Arc<Context>) -> Action {
    let name = db.object_meta().name.clone().unwrap_or_default();

    if error.is_retryable() {
        warn!(?error, kind = %db.database_kind(), name = %name, "reconciliation failed, requeueing");
        Action::requeue(ctx.config.requeue_after)
    } else {
        error!(?error, kind = %db.database_kind(), name = %name, "reconciliation failed");
        Action::await_change()
    }
}
