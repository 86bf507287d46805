//! Resurrection guard
//!
//! When a database is created under a name that still has a dormant record,
//! the record has to go so the new database can take over its storage. An
//! external cleanup finalizer acts on the record's deletion and destroys
//! storage if `wipeOut` is set, so the flag is cleared before the delete is
//! issued, never after.

use tracing::{info, instrument, warn};

use dbaas_common::crd::{Database, DatabaseIdentity};
use dbaas_common::Error;

use crate::lifecycle::{DormancyEvent, DormancyState};
use crate::store::DormantStore;

/// What `reconcile_on_create` found and did
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ResurrectionOutcome {
    /// No dormant record exists; the database is genuinely new
    NoDormantRecord,
    /// A dormant record existed; `wipeOut` was cleared and its deletion issued
    Resurrected {
        /// Value of `wipeOut` on the record before it was cleared
        wipe_out_was: bool,
    },
}

/// Clears a stale archive when its database is recreated
#[derive(Clone)]
pub struct ResurrectionGuard {
    store: DormantStore,
}

impl ResurrectionGuard {
    /// Create a guard over the given store
    pub fn new(store: DormantStore) -> Self {
        Self { store }
    }

    /// Handle the (re)creation of a live database.
    ///
    /// With no dormant record under the same name this is a no-op. Otherwise
    /// `wipeOut` is patched to false and then a background delete of the record
    /// is requested. The record may still exist when this returns. A record
    /// that disappears before the patch lands counts as already cleared.
    ///
    /// A record archiving a different kind is left untouched and reported as a
    /// `Validation` error: its storage does not belong to this database.
    #[instrument(skip(self, db), fields(kind = %db.database_kind()))]
    pub async fn reconcile_on_create<D: Database + ?Sized>(
        &self,
        db: &D,
    ) -> Result<ResurrectionOutcome, Error> {
        let id = db.identity()?;

        let record = self.store.find(&id.namespace, &id.name).await?;
        let observed = DormancyState::observe(record.as_ref());
        let Some(record) = record else {
            return Ok(ResurrectionOutcome::NoDormantRecord);
        };

        let archived_kind = record.origin_kind();
        if archived_kind != id.kind {
            warn!(
                namespace = %id.namespace,
                name = %id.name,
                archived = %archived_kind,
                "dormant record belongs to another kind, keeping it"
            );
            return Err(Error::validation_for(
                id.to_string(),
                format!("name is held by a dormant {} archive", archived_kind),
            ));
        }

        let wipe_out_was = record.spec.wipe_out;
        // An earlier pass already cleared the flag and issued the delete;
        // repeating both is harmless
        let state = match observed {
            DormancyState::Resurrecting => observed,
            _ => observed.transition(DormancyEvent::Recreated)?,
        };

        if !self.clear_archive(&id).await? {
            let state = state.transition(DormancyEvent::RecordGone)?;
            info!(
                namespace = %id.namespace,
                name = %id.name,
                %state,
                "dormant record disappeared before it was cleared"
            );
            return Ok(ResurrectionOutcome::NoDormantRecord);
        }

        info!(
            namespace = %id.namespace,
            name = %id.name,
            %state,
            wipe_out_was,
            "resurrected database, dormant record deletion requested"
        );
        Ok(ResurrectionOutcome::Resurrected { wipe_out_was })
    }

    /// Patch `wipeOut=false`, then delete. `Ok(false)` if the record is gone.
    async fn clear_archive(&self, id: &DatabaseIdentity) -> Result<bool, Error> {
        // Order matters: the finalizer must see wipeOut=false before the delete lands
        match self
            .store
            .patch_wipe_out(&id.namespace, &id.name, false)
            .await
        {
            Ok(_) => {}
            Err(e) if e.is_not_found() => return Ok(false),
            Err(e) => return Err(e),
        }
        self.store.delete(&id.namespace, &id.name).await?;
        Ok(true)
    }
}

/// Finalizer-side check before destroying a record's storage.
///
/// Re-reads the record and returns true only if it still exists with
/// `wipeOut=true`. External cleanup must call this immediately before acting,
/// so that a resurrection that cleared the flag after the cleanup started is
/// still honoured.
pub async fn confirm_wipe_out(
    store: &DormantStore,
    namespace: &str,
    name: &str,
) -> Result<bool, Error> {
    let record = store.find(namespace, name).await?;
    if !record.as_ref().is_some_and(|r| r.spec.wipe_out) {
        return Ok(false);
    }

    let state =
        DormancyState::observe(record.as_ref()).transition(DormancyEvent::WipedOutByUser)?;
    info!(namespace = %namespace, name = %name, %state, "wipe-out confirmed");
    Ok(true)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fixtures::{redis_db, redis_record};
    use crate::store::{MockDormantDatabaseApi, DORMANT_KIND};
    use dbaas_common::crd::{Postgres, PostgresSpec};
    use dbaas_common::DormancyConfig;
    use k8s_openapi::apimachinery::pkg::apis::meta::v1::Time;
    use mockall::Sequence;
    use std::sync::Arc;

    fn guard_with(api: MockDormantDatabaseApi) -> ResurrectionGuard {
        ResurrectionGuard::new(DormantStore::new(Arc::new(api), &DormancyConfig::default()))
    }

    #[tokio::test]
    async fn new_database_is_a_no_op() {
        let mut api = MockDormantDatabaseApi::new();
        api.expect_get().times(2).returning(|_, _| Ok(None));
        api.expect_replace().never();
        api.expect_delete().never();
        let guard = guard_with(api);

        for _ in 0..2 {
            let outcome = guard.reconcile_on_create(&redis_db()).await.expect("no-op");
            assert_eq!(outcome, ResurrectionOutcome::NoDormantRecord);
        }
    }

    /// Story: Scenario B - recreate while the archive is marked for wipe-out
    #[tokio::test]
    async fn story_patch_happens_before_delete() {
        let mut seq = Sequence::new();
        let mut api = MockDormantDatabaseApi::new();

        // Lookup, then the patch's own read
        api.expect_get()
            .times(2)
            .in_sequence(&mut seq)
            .returning(|_, _| Ok(Some(redis_record(true))));
        api.expect_replace()
            .times(1)
            .in_sequence(&mut seq)
            .withf(|r| !r.spec.wipe_out)
            .returning(|r| Ok(r.clone()));
        api.expect_delete()
            .times(1)
            .in_sequence(&mut seq)
            .withf(|ns, name, _| ns == "ns1" && name == "cache1")
            .returning(|_, _, _| Ok(()));

        let outcome = guard_with(api)
            .reconcile_on_create(&redis_db())
            .await
            .expect("resurrected");
        assert_eq!(
            outcome,
            ResurrectionOutcome::Resurrected { wipe_out_was: true }
        );
    }

    #[tokio::test]
    async fn record_without_wipe_out_is_deleted_without_a_write() {
        let mut api = MockDormantDatabaseApi::new();
        api.expect_get()
            .returning(|_, _| Ok(Some(redis_record(false))));
        api.expect_replace().never();
        api.expect_delete().times(1).returning(|_, _, _| Ok(()));

        let outcome = guard_with(api)
            .reconcile_on_create(&redis_db())
            .await
            .expect("resurrected");
        assert_eq!(
            outcome,
            ResurrectionOutcome::Resurrected {
                wipe_out_was: false
            }
        );
    }

    #[tokio::test]
    async fn failed_patch_never_deletes() {
        let mut api = MockDormantDatabaseApi::new();
        api.expect_get()
            .returning(|_, _| Ok(Some(redis_record(true))));
        api.expect_replace().returning(|_| {
            Err(Error::internal_with_context("replace", "etcd unavailable"))
        });
        api.expect_delete().never();

        let err = guard_with(api)
            .reconcile_on_create(&redis_db())
            .await
            .expect_err("patch failed");
        assert!(err.is_retryable());
    }

    #[tokio::test]
    async fn record_vanishing_before_delete_still_succeeds() {
        let mut api = MockDormantDatabaseApi::new();
        api.expect_get()
            .returning(|_, _| Ok(Some(redis_record(false))));
        api.expect_delete()
            .returning(|ns, name, _| Err(Error::not_found(DORMANT_KIND, ns, name)));

        guard_with(api)
            .reconcile_on_create(&redis_db())
            .await
            .expect("NotFound on delete is success");
    }

    #[tokio::test]
    async fn record_vanishing_before_patch_counts_as_cleared() {
        let mut seq = Sequence::new();
        let mut api = MockDormantDatabaseApi::new();
        api.expect_get()
            .times(1)
            .in_sequence(&mut seq)
            .returning(|_, _| Ok(Some(redis_record(true))));
        // Deleted by someone else between the lookup and the patch's read
        api.expect_get()
            .times(1)
            .in_sequence(&mut seq)
            .returning(|_, _| Ok(None));
        api.expect_replace().never();
        api.expect_delete().never();

        let outcome = guard_with(api)
            .reconcile_on_create(&redis_db())
            .await
            .expect("gone record is not an error");
        assert_eq!(outcome, ResurrectionOutcome::NoDormantRecord);
    }

    #[tokio::test]
    async fn terminating_record_is_cleared_again() {
        let mut terminating = redis_record(false);
        terminating.metadata.deletion_timestamp = Some(Time(chrono::Utc::now()));

        let mut api = MockDormantDatabaseApi::new();
        api.expect_get()
            .returning(move |_, _| Ok(Some(terminating.clone())));
        api.expect_replace().never();
        api.expect_delete().times(1).returning(|_, _, _| Ok(()));

        let outcome = guard_with(api)
            .reconcile_on_create(&redis_db())
            .await
            .expect("second pass");
        assert_eq!(
            outcome,
            ResurrectionOutcome::Resurrected {
                wipe_out_was: false
            }
        );
    }

    #[tokio::test]
    async fn archive_of_another_kind_is_kept() {
        let mut api = MockDormantDatabaseApi::new();
        api.expect_get()
            .returning(|_, _| Ok(Some(redis_record(true))));
        api.expect_replace().never();
        api.expect_delete().never();

        let mut pg = Postgres::new("cache1", PostgresSpec::default());
        pg.metadata.namespace = Some("ns1".to_string());

        let err = guard_with(api)
            .reconcile_on_create(&pg)
            .await
            .expect_err("kind mismatch");
        assert!(matches!(err, Error::Validation { .. }));
        assert!(err.to_string().contains("dormant Redis archive"));
    }

    // =========================================================================
    // Finalizer gate
    // =========================================================================

    #[tokio::test]
    async fn confirm_wipe_out_reads_current_flag() {
        let mut api = MockDormantDatabaseApi::new();
        let mut seq = Sequence::new();
        api.expect_get()
            .times(1)
            .in_sequence(&mut seq)
            .returning(|_, _| Ok(Some(redis_record(true))));
        api.expect_get()
            .times(1)
            .in_sequence(&mut seq)
            .returning(|_, _| Ok(Some(redis_record(false))));
        api.expect_get()
            .times(1)
            .in_sequence(&mut seq)
            .returning(|_, _| Ok(None));
        let store = DormantStore::new(Arc::new(api), &DormancyConfig::default());

        assert!(confirm_wipe_out(&store, "ns1", "cache1").await.expect("read"));
        assert!(!confirm_wipe_out(&store, "ns1", "cache1").await.expect("read"));
        assert!(!confirm_wipe_out(&store, "ns1", "cache1").await.expect("read"));
    }
}
