//! Custom Resource Definitions for the dbaas operator

mod database;
mod dormant;
mod types;

pub use database::{
    AnyDatabase, Database, DatabaseIdentity, DatabaseKind, MongoDb, MongoDbSpec, MySql,
    MySqlSpec, Postgres, PostgresSpec, Redis, RedisMode, RedisSpec,
};
pub use dormant::{DormantDatabase, DormantDatabaseSpec, Origin, OriginSpec};
pub use types::{SecretRef, StorageSpec, StorageType, TerminationPolicy};
