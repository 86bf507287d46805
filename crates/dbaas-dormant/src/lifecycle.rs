//! Dormancy lifecycle of a (namespace, name) key
//!
//! ```text
//! Active --DeleteRequested--> Terminating --ChildrenTerminated--> Archived
//! Archived --Recreated--> Resurrecting --RecordGone--> Active
//! Archived --WipedOutByUser--> WipedOut (terminal)
//! ```
//!
//! The states are not persisted. On the resurrection side the starting state
//! is read off the dormant record with [`DormancyState::observe`]: a record
//! that is already being deleted with `wipeOut` cleared is mid-resurrection,
//! and a missing record means the key is active. The archive path has no
//! record to look at until it writes one, so it walks `Active`, `Terminating`
//! and `Archived` in order and uses the states as log labels.

use std::fmt;

use dbaas_common::crd::DormantDatabase;
use dbaas_common::Error;

/// Where a database name is in the archive/resurrection cycle
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum DormancyState {
    /// A live database exists
    #[default]
    Active,
    /// The database is deleted and its children are shutting down
    Terminating,
    /// Children are gone and a dormant record holds the archive
    Archived,
    /// The name was recreated; `wipeOut` is cleared and the record deletion issued
    Resurrecting,
    /// The user deleted the archive with `wipeOut=true`; storage is destroyed
    WipedOut,
}

impl DormancyState {
    /// No further transitions are possible
    pub fn is_terminal(&self) -> bool {
        matches!(self, DormancyState::WipedOut)
    }

    /// State implied by the dormant record currently stored for a key
    pub fn observe(record: Option<&DormantDatabase>) -> DormancyState {
        match record {
            None => DormancyState::Active,
            Some(r) if r.metadata.deletion_timestamp.is_some() && !r.spec.wipe_out => {
                DormancyState::Resurrecting
            }
            Some(_) => DormancyState::Archived,
        }
    }

    /// Apply an event, rejecting transitions the lifecycle does not allow
    pub fn transition(self, event: DormancyEvent) -> Result<DormancyState, Error> {
        use DormancyEvent::*;
        use DormancyState::*;

        match (self, event) {
            (Active, DeleteRequested) => Ok(Terminating),
            (Terminating, ChildrenTerminated) => Ok(Archived),
            (Archived, Recreated) => Ok(Resurrecting),
            (Archived, WipedOutByUser) => Ok(WipedOut),
            (Resurrecting, RecordGone) => Ok(Active),
            (state, event) => Err(Error::validation(format!(
                "invalid dormancy transition: {} on {}",
                event, state
            ))),
        }
    }
}

impl fmt::Display for DormancyState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Active => write!(f, "Active"),
            Self::Terminating => write!(f, "Terminating"),
            Self::Archived => write!(f, "Archived"),
            Self::Resurrecting => write!(f, "Resurrecting"),
            Self::WipedOut => write!(f, "WipedOut"),
        }
    }
}

/// Something that happened to a database name
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum DormancyEvent {
    /// The live database was deleted with a pausing termination policy
    DeleteRequested,
    /// The termination waiter saw zero pods and zero services
    ChildrenTerminated,
    /// A database with the archived name was created again
    Recreated,
    /// The dormant record no longer exists
    RecordGone,
    /// The user deleted the dormant record while `wipeOut` was set
    WipedOutByUser,
}

impl fmt::Display for DormancyEvent {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::DeleteRequested => write!(f, "DeleteRequested"),
            Self::ChildrenTerminated => write!(f, "ChildrenTerminated"),
            Self::Recreated => write!(f, "Recreated"),
            Self::RecordGone => write!(f, "RecordGone"),
            Self::WipedOutByUser => write!(f, "WipedOutByUser"),
        }
    }
}
