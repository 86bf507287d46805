//! Dormant database handling for the dbaas operator
//!
//! When a database is deleted with its storage retained, this crate waits for
//! its pods and services to terminate and archives it as a `DormantDatabase`.
//! When a database is later created under the same name, the archive is
//! cleared so the new database can reuse the storage safely.

#![deny(missing_docs)]

pub mod archive;
pub mod controller;
pub mod lifecycle;
pub mod lock;
pub mod resurrect;
pub mod store;
pub mod waiter;

#[cfg(test)]
mod fixtures;

pub use archive::{build_dormant_database, build_dormant_database_dynamic};
pub use controller::{error_policy, reconcile_on_create, reconcile_on_delete, Context};
pub use lifecycle::{DormancyEvent, DormancyState};
pub use lock::KeyedLocks;
pub use resurrect::{confirm_wipe_out, ResurrectionGuard, ResurrectionOutcome};
pub use store::{DormantDatabaseApi, DormantStore, KubeDormantDatabaseApi};
pub use waiter::{
    ChildResourceClient, ChildSelectors, KubeChildResourceClient, OffshootSelectorResolver,
    SelectorResolver, TerminationWaiter,
};
