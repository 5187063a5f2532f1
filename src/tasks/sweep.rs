//! TTL Sweep Task
//!
//! Background task that periodically removes expired cache entries, so that
//! entries on idle keys do not linger until the next store operation.

use std::sync::Arc;
use std::time::Duration;

use tokio::task::JoinHandle;
use tracing::{debug, info};

use crate::cache::CacheStore;

/// Spawns a background task that periodically sweeps expired cache entries.
///
/// The task runs in an infinite loop, sleeping for the specified interval
/// between sweeps. Must be called from within a tokio runtime.
///
/// # Arguments
/// * `store` - Shared reference to the cache
/// * `interval_secs` - Interval in seconds between sweeps
///
/// # Returns
/// A JoinHandle for the spawned task, which can be used to abort the task
/// during shutdown.
///
/// # Example
/// ```ignore
/// let store = Arc::new(CacheStore::new());
/// let sweep_handle = spawn_sweep_task(store.clone(), 30);
/// // Later, during shutdown:
/// sweep_handle.abort();
/// ```
pub fn spawn_sweep_task(store: Arc<CacheStore>, interval_secs: u64) -> JoinHandle<()> {
    let interval = Duration::from_secs(interval_secs.max(1));

    tokio::spawn(async move {
        info!(
            "Starting TTL sweep task with interval of {} seconds",
            interval.as_secs()
        );

        loop {
            tokio::time::sleep(interval).await;

            let removed = store.sweep_expired();
            if removed == 0 {
                debug!("TTL sweep: no expired entries found");
            }
        }
    })
}

/// Spawns the sweep task described by the store's configuration.
///
/// Returns None when the configured interval disables background sweeping.
pub fn spawn_configured_sweep_task(store: Arc<CacheStore>) -> Option<JoinHandle<()>> {
    let config = store.config().clone();
    config
        .background_sweep_enabled()
        .then(|| spawn_sweep_task(store, config.sweep_interval))
}
