//! Shared Kubernetes polling utilities

use std::future::Future;
use std::time::Duration;

use tokio::time::Instant;
use tracing::trace;

use crate::Error;

/// Default interval between polls of the API server
pub const DEFAULT_POLL_INTERVAL: Duration = Duration::from_millis(500);

/// Poll until a condition is met or the timeout is reached.
///
/// The check runs immediately, then every `poll_interval`. It returns
/// `Ok(true)` when the condition holds and `Ok(false)` to keep polling. An
/// `Err` from the check aborts the loop and is returned as-is, so a broken API
/// connection surfaces instead of being masked as a timeout.
///
/// # Arguments
/// * `timeout` - Maximum time to wait for the condition
/// * `poll_interval` - Time between polling attempts
/// * `operation` - Description used in the `Timeout` error
/// * `namespace` - Namespace being polled, used in the `Timeout` error
/// * `check_fn` - Async condition check
pub async fn poll_until<F, Fut>(
    timeout: Duration,
    poll_interval: Duration,
    operation: impl Into<String>,
    namespace: &str,
    mut check_fn: F,
) -> Result<(), Error>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<bool, Error>>,
{
    let start = Instant::now();

    loop {
        if check_fn().await? {
            return Ok(());
        }

        let waited = start.elapsed();
        if waited >= timeout {
            return Err(Error::timeout(operation, namespace, waited));
        }

        trace!("Polling condition not yet met, retrying...");
        tokio::time::sleep(poll_interval.min(timeout - waited)).await;
    }
}
