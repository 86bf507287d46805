//! Error types for the dbaas operator
//!
//! Errors are structured with the identity of the object involved so that a
//! failed reconcile points at the exact (kind, namespace, name) it was working
//! on. The variants mirror the object store's error kinds: `NotFound`,
//! `AlreadyExists` and `Conflict` are classified out of raw API errors by
//! [`Error::from_api`], everything else stays a transport-level `Kube` error.

use std::time::Duration;

use thiserror::Error;

/// Default context value when no specific context is available
pub const UNKNOWN_CONTEXT: &str = "unknown";

/// Main error type for dbaas operations
#[derive(Debug, Error)]
pub enum Error {
    /// Kubernetes API or transport error
    #[error("kubernetes error: {source}")]
    Kube {
        /// The underlying kube-rs error
        #[from]
        source: kube::Error,
    },

    /// The requested object does not exist
    #[error("{kind} {namespace}/{name} not found")]
    NotFound {
        /// Resource kind (e.g. "DormantDatabase")
        kind: String,
        /// Namespace of the object
        namespace: String,
        /// Name of the object
        name: String,
    },

    /// An object with the same identity already exists
    #[error("{kind} {namespace}/{name} already exists")]
    AlreadyExists {
        /// Resource kind
        kind: String,
        /// Namespace of the object
        namespace: String,
        /// Name of the object
        name: String,
    },

    /// Optimistic concurrency check failed (stale resourceVersion)
    #[error("conflict updating {kind} {namespace}/{name} after {attempts} attempt(s)")]
    Conflict {
        /// Resource kind
        kind: String,
        /// Namespace of the object
        namespace: String,
        /// Name of the object
        name: String,
        /// Number of write attempts made before giving up
        attempts: u32,
    },

    /// A wait loop exceeded its deadline
    #[error("timed out after {waited:?} waiting for {operation} in namespace {namespace}")]
    Timeout {
        /// What was being waited for (e.g. "pods of redis/cache1 to terminate")
        operation: String,
        /// Namespace being polled
        namespace: String,
        /// How long the loop waited before giving up
        waited: Duration,
    },

    /// The object is not one of the supported database kinds
    #[error("unsupported database kind: {kind}")]
    UnsupportedKind {
        /// The kind that was encountered
        kind: String,
    },

    /// An object violates an invariant the operator relies on
    #[error("validation error for {resource}: {message}")]
    Validation {
        /// The resource that failed validation (e.g. "Redis ns1/cache1")
        resource: String,
        /// Description of what's invalid
        message: String,
    },

    /// Serialization/deserialization error
    #[error("serialization error: {message}")]
    Serialization {
        /// Description of what failed
        message: String,
        /// The resource kind being serialized (if known)
        kind: Option<String>,
    },

    /// Internal/operational error
    #[error("internal error [{context}]: {message}")]
    Internal {
        /// Description of what failed
        message: String,
        /// Context where the error occurred (e.g. "keyed_lock", "reconciler")
        context: String,
    },
}

impl Error {
    /// Create a not-found error for the given object
    pub fn not_found(
        kind: impl Into<String>,
        namespace: impl Into<String>,
        name: impl Into<String>,
    ) -> Self {
        Self::NotFound {
            kind: kind.into(),
            namespace: namespace.into(),
            name: name.into(),
        }
    }

    /// Create an already-exists error for the given object
    pub fn already_exists(
        kind: impl Into<String>,
        namespace: impl Into<String>,
        name: impl Into<String>,
    ) -> Self {
        Self::AlreadyExists {
            kind: kind.into(),
            namespace: namespace.into(),
            name: name.into(),
        }
    }

    /// Create a conflict error for a single failed write
    pub fn conflict(
        kind: impl Into<String>,
        namespace: impl Into<String>,
        name: impl Into<String>,
    ) -> Self {
        Self::Conflict {
            kind: kind.into(),
            namespace: namespace.into(),
            name: name.into(),
            attempts: 1,
        }
    }

    /// Create a timeout error for a wait loop
    pub fn timeout(
        operation: impl Into<String>,
        namespace: impl Into<String>,
        waited: Duration,
    ) -> Self {
        Self::Timeout {
            operation: operation.into(),
            namespace: namespace.into(),
            waited,
        }
    }

    /// Create an unsupported-kind error
    pub fn unsupported_kind(kind: impl Into<String>) -> Self {
        Self::UnsupportedKind { kind: kind.into() }
    }

    /// Create a validation error without resource context
    pub fn validation(msg: impl Into<String>) -> Self {
        Self::Validation {
            resource: UNKNOWN_CONTEXT.to_string(),
            message: msg.into(),
        }
    }

    /// Create a validation error for a specific resource
    pub fn validation_for(resource: impl Into<String>, msg: impl Into<String>) -> Self {
        Self::Validation {
            resource: resource.into(),
            message: msg.into(),
        }
    }

    /// Create a serialization error with the given message
    pub fn serialization(msg: impl Into<String>) -> Self {
        Self::Serialization {
            message: msg.into(),
            kind: None,
        }
    }

    /// Create a serialization error with resource kind context
    pub fn serialization_for_kind(kind: impl Into<String>, msg: impl Into<String>) -> Self {
        Self::Serialization {
            message: msg.into(),
            kind: Some(kind.into()),
        }
    }

    /// Create an internal error with context
    pub fn internal_with_context(context: impl Into<String>, msg: impl Into<String>) -> Self {
        Self::Internal {
            message: msg.into(),
            context: context.into(),
        }
    }

    /// Classify a raw kube-rs error for an operation on a known object.
    ///
    /// HTTP 404 becomes `NotFound`. HTTP 409 is split on the status reason:
    /// `AlreadyExists` comes back from a create, anything else is a stale
    /// resourceVersion and becomes `Conflict`. All other errors are kept as
    /// transport-level `Kube` errors.
    pub fn from_api(
        err: kube::Error,
        kind: impl Into<String>,
        namespace: impl Into<String>,
        name: impl Into<String>,
    ) -> Self {
        match &err {
            kube::Error::Api(ae) if ae.code == 404 => Self::not_found(kind, namespace, name),
            kube::Error::Api(ae) if ae.code == 409 && ae.reason == "AlreadyExists" => {
                Self::already_exists(kind, namespace, name)
            }
            kube::Error::Api(ae) if ae.code == 409 => Self::conflict(kind, namespace, name),
            _ => Self::Kube { source: err },
        }
    }

    /// Record how many write attempts a conflict survived
    pub fn with_attempts(self, attempts: u32) -> Self {
        match self {
            Self::Conflict {
                kind,
                namespace,
                name,
                ..
            } => Self::Conflict {
                kind,
                namespace,
                name,
                attempts,
            },
            other => other,
        }
    }

    /// Check if this error is worth redriving the reconcile for
    ///
    /// `Timeout` and `Conflict` clear up on their own, as do throttling (429)
    /// and any API status outside [`PERMANENT_API_CODES`]. `AlreadyExists`
    /// signals that the resurrection path has to run first, and validation-type
    /// errors need a spec change, so neither is retried.
    pub fn is_retryable(&self) -> bool {
        match self {
            Error::Kube { source } => !matches!(
                source,
                kube::Error::Api(ae) if PERMANENT_API_CODES.contains(&ae.code)
            ),
            Error::NotFound { .. } => false,
            Error::AlreadyExists { .. } => false,
            Error::Conflict { .. } => true,
            Error::Timeout { .. } => true,
            Error::UnsupportedKind { .. } => false,
            Error::Validation { .. } => false,
            Error::Serialization { .. } => false,
            Error::Internal { .. } => true,
        }
    }

    /// True for `NotFound`
    pub fn is_not_found(&self) -> bool {
        matches!(self, Error::NotFound { .. })
    }

    /// True for `Conflict`
    pub fn is_conflict(&self) -> bool {
        matches!(self, Error::Conflict { .. })
    }

    /// True for `AlreadyExists`
    pub fn is_already_exists(&self) -> bool {
        matches!(self, Error::AlreadyExists { .. })
    }
}

/// API status codes that will fail the same way on every retry
///
/// Bad request, unauthorized, forbidden, not found, method not allowed,
/// unsupported media type and unprocessable entity. Everything else,
/// including 429 TooManyRequests and 5xx, is worth another attempt.
pub const PERMANENT_API_CODES: [u16; 7] = [400, 401, 403, 404, 405, 415, 422];

impl From<serde_json::Error> for Error {
    fn from(err: serde_json::Error) -> Self {
        Self::serialization(err.to_string())
    }
}
