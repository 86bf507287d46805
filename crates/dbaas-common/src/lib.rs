//! Common types for the dbaas operator: CRDs, errors and utilities

#![deny(missing_docs)]

pub mod config;
pub mod crd;
pub mod error;
pub mod kube_utils;
pub mod labels;
pub mod retry;
pub mod telemetry;

pub use config::DormancyConfig;
pub use error::Error;

/// Result type alias using our custom Error type
pub type Result<T> = std::result::Result<T, Error>;

/// API group of every dbaas custom resource
pub const API_GROUP: &str = "dbaas.dev";

/// Field manager recorded on writes made by the dormancy controller
pub const FIELD_MANAGER: &str = "dbaas-dormant-controller";
