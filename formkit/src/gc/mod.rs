//! Upload garbage collection
//!
//! Uploads stored during a submission that never completes are orphaned on
//! disk. The sweeper deletes uploads older than the configured grace period;
//! anything younger may still belong to a form mid-validation.

use crate::error::FormKitError;
use crate::state::FormKit;
use std::time::Duration;
use tokio::task::JoinHandle;

/// Delete uploads older than the configured grace period
///
/// Returns the number of uploads removed.
///
/// # Errors
///
/// Propagates upload store failures.
pub async fn sweep(kit: &FormKit) -> Result<u64, FormKitError> {
    let grace = Duration::from_secs(kit.config().gc_grace_secs);
    let removed = kit.uploads().sweep(grace).await?;
    if removed > 0 {
        tracing::info!(removed, "swept abandoned uploads");
    }
    Ok(removed)
}

/// Run [`sweep`] forever on a fixed interval
///
/// Failures are logged and the loop keeps going; a transient storage error
/// should not kill the sweeper for the life of the process.
pub fn spawn_sweeper(kit: FormKit, interval: Duration) -> JoinHandle<()> {
    tokio::spawn(async move {
        let mut ticker = tokio::time::interval(interval);
        ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);
        loop {
            ticker.tick().await;
            if let Err(err) = sweep(&kit).await {
                tracing::error!(error = %err, "upload sweep failed");
            }
        }
    })
}
