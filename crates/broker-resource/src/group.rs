//! Resource groups with cost-ordered failover across redundant resources.

use std::collections::HashSet;
use std::fmt;
use std::sync::{Arc, Mutex, Weak};
use std::time::Duration;

use arc_swap::ArcSwap;
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tokio::time;

use broker_core::config::resource::ResourceGroupConfig;
use broker_core::error::BrokerError;
use broker_core::result::BrokerResult;
use broker_core::traits::{ActiveResource, ResourceLocator};
use broker_core::types::NoticeLevel;

use crate::registry::PollingRegistry;
use crate::resource::PollableResource;

/// Refresh interval used when the group does not configure one.
pub const DEFAULT_REFRESH_INTERVAL: Duration = Duration::from_secs(10);

/// Immutable, cost-ordered list of live resources.
pub type ActiveOrder = Arc<Vec<Arc<PollableResource>>>;

/// A named pool of redundant resources serving one logical role.
///
/// The group keeps a snapshot of its live members ordered by ascending cost
/// and replaces it wholesale on every refresh. Readers always see a complete
/// snapshot, which may be up to one refresh interval stale.
pub struct ResourceGroup {
    /// Group identifier.
    id: String,
    /// All members, in configuration order.
    resources: Vec<Arc<PollableResource>>,
    /// Current live members, lowest cost first.
    active: ArcSwap<Vec<Arc<PollableResource>>>,
    /// Interval between snapshot recomputations.
    refresh_interval: Duration,
    /// Severity of the event logged when the snapshot is empty.
    empty_pool_level: NoticeLevel,
    /// Shutdown signal for the refresh task.
    shutdown: watch::Sender<bool>,
    /// Refresh task handle.
    task: Mutex<Option<JoinHandle<()>>>,
}

impl ResourceGroup {
    /// Build every member resource, compute the first snapshot, and start the
    /// refresh loop. Outside a Tokio runtime this fails with an internal error.
    pub fn init(config: &ResourceGroupConfig, registry: &PollingRegistry) -> BrokerResult<Arc<Self>> {
        if config.id.trim().is_empty() {
            return Err(BrokerError::configuration("Resource group id must not be empty"));
        }
        if config.resources.is_empty() {
            return Err(BrokerError::configuration(format!(
                "Resource group '{}' must configure at least one resource",
                config.id
            )));
        }

        let mut seen = HashSet::new();
        for resource in &config.resources {
            if !seen.insert(resource.id.as_str()) {
                return Err(BrokerError::configuration(format!(
                    "Duplicate resource id '{}' in group '{}'",
                    resource.id, config.id
                )));
            }
        }

        let refresh_interval = match config.interval_seconds {
            Some(0) => {
                return Err(BrokerError::configuration(format!(
                    "Refresh interval for group '{}' must be greater than zero",
                    config.id
                )));
            }
            Some(secs) => Duration::from_secs(secs),
            None => {
                tracing::warn!(
                    group = %config.id,
                    default_secs = DEFAULT_REFRESH_INTERVAL.as_secs(),
                    "No refresh interval configured, using default"
                );
                DEFAULT_REFRESH_INTERVAL
            }
        };

        let empty_pool_level = match config.critical_notice_level.as_deref() {
            Some(raw) => raw.parse::<NoticeLevel>().unwrap_or_else(|e| {
                tracing::warn!(
                    group = %config.id,
                    error = %e,
                    "Invalid critical notice level, using '{}'",
                    NoticeLevel::default()
                );
                NoticeLevel::default()
            }),
            None => {
                tracing::info!(
                    group = %config.id,
                    "No critical notice level configured, using '{}'",
                    NoticeLevel::default()
                );
                NoticeLevel::default()
            }
        };

        if tokio::runtime::Handle::try_current().is_err() {
            return Err(BrokerError::internal(format!(
                "Resource group '{}' needs a Tokio runtime for its refresh loop",
                config.id
            )));
        }

        let mut resources = Vec::with_capacity(config.resources.len());
        for resource_config in &config.resources {
            match PollableResource::init(resource_config, registry) {
                Ok(resource) => resources.push(resource),
                Err(e) => {
                    for resource in &resources {
                        resource.destroy();
                    }
                    return Err(e);
                }
            }
        }

        let (shutdown, _) = watch::channel(false);
        let group = Arc::new(Self {
            id: config.id.clone(),
            resources,
            active: ArcSwap::from_pointee(Vec::new()),
            refresh_interval,
            empty_pool_level,
            shutdown,
            task: Mutex::new(None),
        });

        group.refresh();

        let handle = tokio::spawn(run_refresh(
            Arc::downgrade(&group),
            refresh_interval,
            group.shutdown.subscribe(),
        ));
        if let Ok(mut task) = group.task.lock() {
            *task = Some(handle);
        }

        tracing::info!(
            group = %group.id,
            resources = group.resources.len(),
            active = group.active.load().len(),
            refresh_secs = refresh_interval.as_secs(),
            "Resource group initialized"
        );
        Ok(group)
    }

    /// Group identifier.
    pub fn id(&self) -> &str {
        &self.id
    }

    /// The lowest-cost live resource from the current snapshot.
    pub fn get_active_resource(&self) -> BrokerResult<Arc<PollableResource>> {
        self.active
            .load()
            .first()
            .cloned()
            .ok_or_else(|| BrokerError::no_resource_active(&self.id))
    }

    /// The current snapshot of live resources, lowest cost first.
    pub fn active_resources(&self) -> ActiveOrder {
        self.active.load_full()
    }

    /// All members in configuration order.
    pub fn resources(&self) -> &[Arc<PollableResource>] {
        &self.resources
    }

    /// Configured refresh interval.
    pub fn refresh_interval(&self) -> Duration {
        self.refresh_interval
    }

    /// Severity used when the pool is empty.
    pub fn empty_pool_level(&self) -> NoticeLevel {
        self.empty_pool_level
    }

    /// Recompute the snapshot from current resource liveness.
    ///
    /// Live resources are ordered by ascending cost; equal costs keep
    /// configuration order. The new snapshot replaces the old one atomically.
    pub fn refresh(&self) {
        let mut ordered: Vec<Arc<PollableResource>> = Vec::with_capacity(self.resources.len());
        for resource in &self.resources {
            if resource.live() {
                let position = ordered.partition_point(|o| o.cost() <= resource.cost());
                ordered.insert(position, Arc::clone(resource));
            }
        }

        let previous = self
            .active
            .load()
            .first()
            .map(|r| r.id().to_string());
        let current = ordered.first().map(|r| r.id().to_string());
        let empty = ordered.is_empty();

        self.active.store(Arc::new(ordered));

        if empty {
            self.notify_empty();
        } else if previous != current {
            tracing::info!(
                group = %self.id,
                from = previous.as_deref().unwrap_or("<none>"),
                to = current.as_deref().unwrap_or("<none>"),
                "Active resource changed"
            );
        }
    }

    /// Destroy every member, stop the refresh loop, and clear the snapshot.
    /// Idempotent.
    pub fn destroy(&self) {
        for resource in &self.resources {
            resource.destroy();
        }
        let _ = self.shutdown.send(true);
        self.active.store(Arc::new(Vec::new()));
        tracing::info!(group = %self.id, "Resource group destroyed");
    }

    /// Whether the refresh task is still running.
    pub fn is_refreshing(&self) -> bool {
        self.task
            .lock()
            .map(|task| task.as_ref().is_some_and(|h| !h.is_finished()))
            .unwrap_or(false)
    }

    fn notify_empty(&self) {
        let group = &self.id;
        match self.empty_pool_level {
            NoticeLevel::Error => tracing::error!(group = %group, "No live resources in group"),
            NoticeLevel::Warn => tracing::warn!(group = %group, "No live resources in group"),
            NoticeLevel::Info => tracing::info!(group = %group, "No live resources in group"),
            NoticeLevel::Debug => tracing::debug!(group = %group, "No live resources in group"),
            NoticeLevel::Trace => tracing::trace!(group = %group, "No live resources in group"),
        }
    }
}

impl ResourceLocator for ResourceGroup {
    fn locate(&self) -> BrokerResult<ActiveResource> {
        let resource = self.get_active_resource()?;
        Ok(ActiveResource {
            id: resource.id().to_string(),
            attributes: resource.attributes_arc(),
        })
    }
}

impl fmt::Debug for ResourceGroup {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let active: Vec<String> = self
            .active
            .load()
            .iter()
            .map(|r| r.id().to_string())
            .collect();
        f.debug_struct("ResourceGroup")
            .field("id", &self.id)
            .field("resources", &self.resources.len())
            .field("active", &active)
            .field("refresh_interval", &self.refresh_interval)
            .finish()
    }
}

/// Refresh loop: sleep, recompute. Holds only a weak reference so a dropped
/// group ends the loop.
async fn run_refresh(
    group: Weak<ResourceGroup>,
    interval: Duration,
    mut cancel: watch::Receiver<bool>,
) {
    loop {
        tokio::select! {
            biased;
            _ = cancel.changed() => break,
            _ = time::sleep(interval) => {}
        }
        match group.upgrade() {
            Some(group) => group.refresh(),
            None => break,
        }
    }
    tracing::debug!("Resource group refresh loop stopped");
}
