//! Environment configuration for the dormancy controller
//!
//! Every knob has a default suitable for a real cluster; environment variables
//! override individual values. Parsing goes through a lookup function so tests
//! don't have to touch process-global state.

use std::str::FromStr;
use std::time::Duration;

use crate::kube_utils::DEFAULT_POLL_INTERVAL;
use crate::Error;

/// Env var overriding the child-termination poll interval (milliseconds)
pub const ENV_POLL_INTERVAL_MS: &str = "DBAAS_POLL_INTERVAL_MS";
/// Env var overriding the per-phase termination timeout (seconds)
pub const ENV_TERMINATION_TIMEOUT_SECS: &str = "DBAAS_TERMINATION_TIMEOUT_SECS";
/// Env var overriding the optimistic-concurrency write budget
pub const ENV_PATCH_MAX_ATTEMPTS: &str = "DBAAS_PATCH_MAX_ATTEMPTS";
/// Env var overriding the requeue delay after a retryable failure (seconds)
pub const ENV_REQUEUE_AFTER_SECS: &str = "DBAAS_REQUEUE_AFTER_SECS";

/// Default time each termination phase (pods, then services) may take
pub const DEFAULT_TERMINATION_TIMEOUT: Duration = Duration::from_secs(5 * 60);
/// Default number of write attempts for a read-modify-write patch
pub const DEFAULT_PATCH_MAX_ATTEMPTS: u32 = 5;
/// Default initial delay between conflicting patch attempts
pub const DEFAULT_PATCH_RETRY_DELAY: Duration = Duration::from_millis(50);
/// Default requeue delay after a retryable reconcile failure
pub const DEFAULT_REQUEUE_AFTER: Duration = Duration::from_secs(10);

/// Tunables for the archive and resurrection paths
#[derive(Clone, Debug, PartialEq)]
pub struct DormancyConfig {
    /// Interval between pod/service existence checks
    pub poll_interval: Duration,
    /// Deadline for each termination phase
    pub termination_timeout: Duration,
    /// Maximum write attempts when patching `wipeOut` under conflicts
    pub patch_max_attempts: u32,
    /// Initial backoff between conflicting patch attempts
    pub patch_retry_delay: Duration,
    /// Requeue delay handed to the scheduler after a retryable error
    pub requeue_after: Duration,
}

impl Default for DormancyConfig {
    fn default() -> Self {
        Self {
            poll_interval: DEFAULT_POLL_INTERVAL,
            termination_timeout: DEFAULT_TERMINATION_TIMEOUT,
            patch_max_attempts: DEFAULT_PATCH_MAX_ATTEMPTS,
            patch_retry_delay: DEFAULT_PATCH_RETRY_DELAY,
            requeue_after: DEFAULT_REQUEUE_AFTER,
        }
    }
}

impl DormancyConfig {
    /// Load configuration from process environment variables
    pub fn from_env() -> Result<Self, Error> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Load configuration through an arbitrary key lookup
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self, Error> {
        let mut config = Self::default();

        if let Some(ms) = parse_var::<u64>(&lookup, ENV_POLL_INTERVAL_MS)? {
            config.poll_interval = Duration::from_millis(ms);
        }
        if let Some(secs) = parse_var::<u64>(&lookup, ENV_TERMINATION_TIMEOUT_SECS)? {
            config.termination_timeout = Duration::from_secs(secs);
        }
        if let Some(attempts) = parse_var::<u32>(&lookup, ENV_PATCH_MAX_ATTEMPTS)? {
            config.patch_max_attempts = attempts;
        }
        if let Some(secs) = parse_var::<u64>(&lookup, ENV_REQUEUE_AFTER_SECS)? {
            config.requeue_after = Duration::from_secs(secs);
        }

        config.validate()?;
        Ok(config)
    }

    /// Reject values that would make the controller spin or never retry
    pub fn validate(&self) -> Result<(), Error> {
        if self.poll_interval.is_zero() {
            return Err(Error::validation_for(
                ENV_POLL_INTERVAL_MS,
                "poll interval must be greater than zero",
            ));
        }
        // 0 would mean "retry conflicts forever", which starves the reconcile queue
        if self.patch_max_attempts == 0 {
            return Err(Error::validation_for(
                ENV_PATCH_MAX_ATTEMPTS,
                "patch attempts must be at least 1",
            ));
        }
        Ok(())
    }
}

fn parse_var<T: FromStr>(
    lookup: &impl Fn(&str) -> Option<String>,
    key: &str,
) -> Result<Option<T>, Error>
where
    T::Err: std::fmt::Display,
{
    match lookup(key) {
        None => Ok(None),
        Some(raw) => raw
            .trim()
            .parse::<T>()
            .map(Some)
            .map_err(|e| Error::validation_for(key, format!("invalid value '{}': {}", raw, e))),
    }
}
