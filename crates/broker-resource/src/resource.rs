//! A single configured backend endpoint with an optional health-check loop.

use std::fmt;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use tokio::sync::watch;
use tokio::task::JoinHandle;
use tokio::time;

use broker_core::config::resource::ResourceConfig;
use broker_core::error::BrokerError;
use broker_core::result::BrokerResult;
use broker_core::traits::PollingMethod;
use broker_core::types::ResourceAttributes;

use crate::registry::PollingRegistry;

/// One redundant backend endpoint.
///
/// A resource without polling configured is permanently live. With polling,
/// a background task polls it every interval and records the result.
pub struct PollableResource {
    /// Resource identifier, unique within its group.
    id: String,
    /// Priority; lower is preferred.
    cost: i32,
    /// Connection parameters passed through to callers.
    attributes: Arc<ResourceAttributes>,
    /// Liveness shared with the health-check task.
    health: Arc<Health>,
    /// Polling interval, if a health check is configured.
    poll_interval: Option<Duration>,
    /// Shutdown signal for the health-check task.
    shutdown: watch::Sender<bool>,
    /// Health-check task handle.
    task: Mutex<Option<JoinHandle<()>>>,
}

/// Liveness state plus the polling method that updates it.
struct Health {
    resource_id: String,
    method_id: String,
    method: Option<Arc<dyn PollingMethod>>,
    live: AtomicBool,
    destroyed: AtomicBool,
}

impl Health {
    /// Poll once and record the result. Returns the new liveness.
    async fn check(&self) -> bool {
        let Some(method) = &self.method else {
            return self.live.load(Ordering::SeqCst);
        };
        if self.destroyed.load(Ordering::SeqCst) {
            return false;
        }

        let (live, error) = match method.poll().await {
            Ok(live) => (live, None),
            Err(e) => (false, Some(e)),
        };

        let was_live = self.live.swap(live, Ordering::SeqCst);
        // destroy() may have run while the poll was in flight
        if self.destroyed.load(Ordering::SeqCst) {
            self.live.store(false, Ordering::SeqCst);
            return false;
        }

        match (was_live, live, error) {
            (true, false, Some(e)) => tracing::warn!(
                resource = %self.resource_id,
                method = %self.method_id,
                error = %e,
                "Resource is no longer live"
            ),
            (true, false, None) => tracing::warn!(
                resource = %self.resource_id,
                method = %self.method_id,
                "Resource is no longer live"
            ),
            (false, false, Some(e)) => tracing::debug!(
                resource = %self.resource_id,
                method = %self.method_id,
                error = %e,
                "Health check still failing"
            ),
            (false, true, _) => tracing::info!(
                resource = %self.resource_id,
                method = %self.method_id,
                "Resource is live again"
            ),
            _ => {}
        }
        live
    }
}

impl PollableResource {
    /// Create a resource from configuration and start its health-check loop.
    ///
    /// Must be called from within a Tokio runtime when polling is configured.
    pub fn init(config: &ResourceConfig, registry: &PollingRegistry) -> BrokerResult<Arc<Self>> {
        if config.id.trim().is_empty() {
            return Err(BrokerError::configuration("Resource id must not be empty"));
        }

        let attributes = Arc::new(config.attributes.clone());
        let (method, method_id, poll_interval) = match &config.polling {
            Some(polling) => match polling.interval_seconds {
                None => {
                    tracing::warn!(
                        resource_id = %config.id,
                        method = %polling.method,
                        "Polling interval not set, resource will not be health-checked"
                    );
                    (None, String::new(), None)
                }
                Some(0) => {
                    return Err(BrokerError::configuration(format!(
                        "Polling interval for resource '{}' must be greater than zero",
                        config.id
                    )));
                }
                Some(interval_seconds) => {
                    if tokio::runtime::Handle::try_current().is_err() {
                        return Err(BrokerError::internal(format!(
                            "Resource '{}' has polling configured but no Tokio runtime is running",
                            config.id
                        )));
                    }
                    let method = registry.build(polling, &attributes).map_err(|e| {
                        BrokerError::configuration(format!(
                            "Failed to create polling method '{}' for resource '{}': {}",
                            polling.method, config.id, e.message
                        ))
                    })?;
                    let method_id = polling
                        .method_id
                        .clone()
                        .unwrap_or_else(|| polling.method.clone());
                    (
                        Some(method),
                        method_id,
                        Some(Duration::from_secs(interval_seconds)),
                    )
                }
            },
            None => (None, String::new(), None),
        };

        let health = Arc::new(Health {
            resource_id: config.id.clone(),
            method_id,
            method,
            live: AtomicBool::new(true),
            destroyed: AtomicBool::new(false),
        });

        let (shutdown, _) = watch::channel(false);
        let resource = Arc::new(Self {
            id: config.id.clone(),
            cost: config.cost,
            attributes,
            health,
            poll_interval,
            shutdown,
            task: Mutex::new(None),
        });

        if let Some(interval) = poll_interval {
            let health = Arc::clone(&resource.health);
            let cancel = resource.shutdown.subscribe();
            let handle = tokio::spawn(run_health_check(health, interval, cancel));
            if let Ok(mut task) = resource.task.lock() {
                *task = Some(handle);
            }
            tracing::debug!(
                resource = %resource.id,
                interval_secs = interval.as_secs(),
                "Started health-check loop"
            );
        }

        Ok(resource)
    }

    /// Resource identifier.
    pub fn id(&self) -> &str {
        &self.id
    }

    /// Configured priority; lower is preferred.
    pub fn cost(&self) -> i32 {
        self.cost
    }

    /// Last known health. Pure read.
    pub fn live(&self) -> bool {
        self.health.live.load(Ordering::SeqCst)
    }

    /// Connection parameters for this resource.
    pub fn attributes(&self) -> &ResourceAttributes {
        &self.attributes
    }

    /// Shared handle to the connection parameters.
    pub fn attributes_arc(&self) -> Arc<ResourceAttributes> {
        Arc::clone(&self.attributes)
    }

    /// Whether a health check is configured.
    pub fn is_polled(&self) -> bool {
        self.poll_interval.is_some()
    }

    /// Run one health check immediately, outside the regular schedule.
    pub async fn check_now(&self) -> bool {
        self.health.check().await
    }

    /// Whether the health-check task is still running.
    pub fn is_polling(&self) -> bool {
        self.task
            .lock()
            .map(|task| task.as_ref().is_some_and(|h| !h.is_finished()))
            .unwrap_or(false)
    }

    /// Stop the health-check loop and mark the resource dead. Idempotent.
    pub fn destroy(&self) {
        self.health.destroyed.store(true, Ordering::SeqCst);
        let _ = self.shutdown.send(true);
        self.health.live.store(false, Ordering::SeqCst);
        tracing::debug!(resource = %self.id, "Resource destroyed");
    }
}

impl fmt::Debug for PollableResource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PollableResource")
            .field("id", &self.id)
            .field("cost", &self.cost)
            .field("live", &self.live())
            .field("poll_interval", &self.poll_interval)
            .finish()
    }
}

/// Health-check loop: poll, record, sleep. Runs until cancelled.
async fn run_health_check(
    health: Arc<Health>,
    interval: Duration,
    mut cancel: watch::Receiver<bool>,
) {
    loop {
        tokio::select! {
            biased;
            _ = cancel.changed() => break,
            _ = health.check() => {}
        }
        tokio::select! {
            biased;
            _ = cancel.changed() => break,
            _ = time::sleep(interval) => {}
        }
    }
    tracing::debug!(resource = %health.resource_id, "Health-check loop stopped");
}
