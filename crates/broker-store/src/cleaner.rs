//! Background purge of expired store entries.

use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tokio::time;

use broker_core::traits::StorageBackend;

/// Periodically removes entries older than the store's expiry age.
///
/// A failing sweep is logged and the loop continues. Stopping the cleaner
/// interrupts a pending sleep or an in-flight sweep.
#[derive(Debug)]
pub struct Cleaner {
    /// Shutdown signal for the sweep task.
    shutdown: watch::Sender<bool>,
    /// Sweep task handle.
    handle: JoinHandle<()>,
}

impl Cleaner {
    /// Spawn the sweep loop. Must be called from within a Tokio runtime.
    pub fn start(
        store_id: String,
        backend: Arc<dyn StorageBackend>,
        expire_after: chrono::Duration,
        interval: Duration,
    ) -> Self {
        let (shutdown, cancel) = watch::channel(false);
        tracing::info!(
            store = %store_id,
            expire_secs = expire_after.num_seconds(),
            interval_secs = interval.as_secs(),
            "Starting store cleaner"
        );
        let handle = tokio::spawn(run(store_id, backend, expire_after, interval, cancel));
        Self { shutdown, handle }
    }

    /// Whether the sweep loop is still running.
    pub fn is_running(&self) -> bool {
        !self.handle.is_finished()
    }

    /// Signal the sweep loop to exit. Safe to call more than once.
    pub fn stop(&self) {
        let _ = self.shutdown.send(true);
    }
}

impl Drop for Cleaner {
    fn drop(&mut self) {
        self.stop();
    }
}

async fn run(
    store_id: String,
    backend: Arc<dyn StorageBackend>,
    expire_after: chrono::Duration,
    interval: Duration,
    mut cancel: watch::Receiver<bool>,
) {
    loop {
        tokio::select! {
            biased;
            _ = cancel.changed() => break,
            _ = time::sleep(interval) => {}
        }

        let cutoff = Utc::now() - expire_after;
        tokio::select! {
            biased;
            _ = cancel.changed() => break,
            result = backend.cleanup(cutoff) => match result {
                Ok(0) => tracing::trace!(store = %store_id, "No expired entries"),
                Ok(removed) => tracing::debug!(store = %store_id, removed, "Removed expired entries"),
                Err(e) => tracing::error!(store = %store_id, error = %e, "Expired entry cleanup failed"),
            }
        }
    }
    tracing::debug!(store = %store_id, "Store cleaner stopped");
}
