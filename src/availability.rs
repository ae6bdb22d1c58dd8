//! Blocking wait for the coordination registry
//!
//! There is no upper bound on the wait. Callers needing a deadline wrap the
//! future in `tokio::time::timeout` or cancel the token.

use std::future::Future;
use std::time::Duration;

use tokio_util::sync::CancellationToken;

use crate::registry::RegistryClient;
use crate::{Error, Result};

/// Default interval between probes
pub const DEFAULT_POLL_INTERVAL: Duration = Duration::from_millis(100);

/// Outcome of a completed wait
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Reachability {
    /// Number of probes issued, including the successful one
    pub attempts: u32,
    /// Whether at least one probe failed before success
    pub waited: bool,
}

/// Probe until it reports success
///
/// Emits one "waiting" event on the first failed probe and one "reachable"
/// event on success. Returns only after `probe` has returned `true`.
///
/// # Errors
///
/// Returns [`Error::Cancelled`] if `cancel` fires before the probe succeeds
pub async fn wait_until_reachable<F, Fut>(
    mut probe: F,
    interval: Duration,
    cancel: &CancellationToken,
) -> Result<Reachability>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = bool>,
{
    let mut attempts = 0u32;

    loop {
        if cancel.is_cancelled() {
            return Err(Error::Cancelled);
        }

        attempts = attempts.saturating_add(1);
        if probe().await {
            break;
        }

        if attempts == 1 {
            tracing::info!("registry is not yet running, will wait for it to start");
        }

        tokio::select! {
            () = cancel.cancelled() => return Err(Error::Cancelled),
            () = tokio::time::sleep(interval) => {}
        }
    }

    tracing::info!(attempts, "registry has started, initiating launch");

    Ok(Reachability {
        attempts,
        waited: attempts > 1,
    })
}

/// Wait until `client` answers a liveness call
///
/// # Errors
///
/// Returns [`Error::Cancelled`] if `cancel` fires first
pub async fn wait_for_registry<C>(
    client: &C,
    interval: Duration,
    cancel: &CancellationToken,
) -> Result<Reachability>
where
    C: RegistryClient + ?Sized,
{
    wait_until_reachable(|| client.is_reachable(), interval, cancel).await
}
