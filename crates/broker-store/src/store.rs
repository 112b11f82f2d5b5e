//! Expiring store: capacity-gated, backend-agnostic key/value storage.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use arc_swap::ArcSwapOption;
use chrono::{DateTime, Utc};
use serde::Serialize;
use serde::de::DeserializeOwned;
use serde_json::Value;
use tokio::sync::Mutex;

use broker_core::config::store::{DEFAULT_CLEANUP_INTERVAL_SECONDS, StoreConfig, UNLIMITED};
use broker_core::error::BrokerError;
use broker_core::result::BrokerResult;
use broker_core::traits::{ResourceLocator, StorageBackend, WriteMode, WriteOutcome};

use crate::cleaner::Cleaner;
use crate::registry::{BackendContext, BackendRegistry};

/// A store of correlation-id keyed state (sessions, tickets, assertions)
/// with a capacity ceiling and age-based expiry.
///
/// The store does not serialize calls; atomicity of insert-only writes is
/// the backend's responsibility. Every write stamps the entry with the
/// current time; reads never touch the timestamp.
#[derive(Debug)]
pub struct ExpiringStore {
    /// Store identifier.
    id: String,
    /// Current backend and limits; `None` once destroyed.
    state: ArcSwapOption<StoreState>,
    /// Serializes reload and destroy.
    lifecycle: Mutex<()>,
}

/// Limits resolved from configuration, validated before any teardown.
#[derive(Debug, Clone, Copy)]
struct Limits {
    max_entries: i64,
    expire_after: Option<chrono::Duration>,
    cleanup_interval: Duration,
}

#[derive(Debug)]
struct StoreState {
    backend: Arc<dyn StorageBackend>,
    limits: Limits,
    cleaner: Option<Cleaner>,
}

impl ExpiringStore {
    /// Build the configured backend and start the cleaner if expiry is
    /// enabled. Must be called from within a Tokio runtime.
    pub async fn init(
        config: &StoreConfig,
        registry: &BackendRegistry,
        locator: Option<Arc<dyn ResourceLocator>>,
    ) -> BrokerResult<Self> {
        if config.id.trim().is_empty() {
            return Err(BrokerError::configuration("Store id must not be empty"));
        }
        let store = Self {
            id: config.id.clone(),
            state: ArcSwapOption::empty(),
            lifecycle: Mutex::new(()),
        };
        store.reload(config, registry, locator).await?;
        Ok(store)
    }

    /// Replace the backend and cleaner from new configuration.
    ///
    /// Configuration is validated first; the previous backend and cleaner
    /// are then torn down before the new backend is built. If building
    /// fails, the store is left destroyed.
    pub async fn reload(
        &self,
        config: &StoreConfig,
        registry: &BackendRegistry,
        locator: Option<Arc<dyn ResourceLocator>>,
    ) -> BrokerResult<()> {
        if config.id != self.id {
            return Err(BrokerError::configuration(format!(
                "Cannot reload store '{}' with configuration for '{}'",
                self.id, config.id
            )));
        }

        let factory = registry.resolve(&config.handler.class)?;
        let limits = resolve_limits(config)?;

        let _guard = self.lifecycle.lock().await;
        if let Some(previous) = self.state.swap(None) {
            tracing::info!(store = %self.id, "Tearing down previous store backend");
            teardown(&self.id, &previous).await;
        }

        let ctx = BackendContext {
            store_id: self.id.clone(),
            handler: config.handler.clone(),
            locator,
        };
        let backend = factory(ctx).await.map_err(|e| {
            tracing::error!(
                store = %self.id,
                handler = %config.handler.id,
                class = %config.handler.class,
                error = %e,
                "Failed to initialize store backend"
            );
            e
        })?;

        let cleaner = limits.expire_after.map(|expire_after| {
            Cleaner::start(
                self.id.clone(),
                Arc::clone(&backend),
                expire_after,
                limits.cleanup_interval,
            )
        });
        if cleaner.is_none() {
            tracing::info!(store = %self.id, "Entry expiry disabled, cleaner not started");
        }

        self.state.store(Some(Arc::new(StoreState {
            backend,
            limits,
            cleaner,
        })));

        tracing::info!(
            store = %self.id,
            handler = %config.handler.id,
            class = %config.handler.class,
            max_entries = limits.max_entries,
            "Expiring store initialized"
        );
        Ok(())
    }

    /// Store identifier.
    pub fn id(&self) -> &str {
        &self.id
    }

    /// Configured maximum number of entries; `-1` means unlimited.
    pub fn max_entries(&self) -> BrokerResult<i64> {
        Ok(self.state()?.limits.max_entries)
    }

    /// Configured expiry age, if expiry is enabled.
    pub fn expire_after(&self) -> BrokerResult<Option<chrono::Duration>> {
        Ok(self.state()?.limits.expire_after)
    }

    /// Whether the cleaner loop is running.
    pub fn is_cleaning(&self) -> bool {
        self.state
            .load_full()
            .is_some_and(|s| s.cleaner.as_ref().is_some_and(Cleaner::is_running))
    }

    /// Whether the store has been destroyed.
    pub fn is_destroyed(&self) -> bool {
        self.state.load().is_none()
    }

    /// Insert or overwrite a value.
    pub async fn put(&self, key: &str, value: Value) -> BrokerResult<()> {
        self.write(key, value, WriteMode::Overwrite).await?;
        Ok(())
    }

    /// Update a value, creating it if absent.
    ///
    /// Backends may treat this as an upsert, so `update` on a missing key
    /// succeeds and creates the entry. Callers rely on this.
    pub async fn update(&self, key: &str, value: Value) -> BrokerResult<()> {
        self.write(key, value, WriteMode::PreferUpdate).await?;
        Ok(())
    }

    /// Insert a value only if the key is absent.
    ///
    /// Returns `false`, leaving the existing value untouched, when the key is
    /// already present.
    pub async fn create(&self, key: &str, value: Value) -> BrokerResult<bool> {
        match self.write(key, value, WriteMode::InsertOnly).await? {
            WriteOutcome::Written => Ok(true),
            WriteOutcome::AlreadyExists => {
                tracing::debug!(store = %self.id, key, "Create skipped, key already exists");
                Ok(false)
            }
        }
    }

    /// Get a value by key.
    pub async fn get(&self, key: &str) -> BrokerResult<Option<Value>> {
        self.state()?.backend.get(key).await
    }

    /// Get every stored entry.
    pub async fn get_all(&self) -> BrokerResult<HashMap<String, Value>> {
        self.state()?.backend.get_all().await
    }

    /// Number of stored entries.
    pub async fn get_count(&self) -> BrokerResult<u64> {
        self.state()?.backend.get_count().await
    }

    /// Whether a key is present.
    pub async fn contains_key(&self, key: &str) -> BrokerResult<bool> {
        self.state()?.backend.contains_key(key).await
    }

    /// Remove a key. Returns `true` if it was present.
    pub async fn remove(&self, key: &str) -> BrokerResult<bool> {
        self.state()?.backend.remove(key).await
    }

    /// Remove every entry.
    pub async fn remove_all(&self) -> BrokerResult<()> {
        self.state()?.backend.remove_all().await
    }

    /// Insert/update time of an entry.
    pub async fn get_timestamp(&self, key: &str) -> BrokerResult<Option<DateTime<Utc>>> {
        self.state()?.backend.get_timestamp(key).await
    }

    /// When an entry will expire: its timestamp plus the expiry age.
    /// `None` if the key is absent or expiry is disabled.
    pub async fn get_expiration_time(&self, key: &str) -> BrokerResult<Option<DateTime<Utc>>> {
        let state = self.state()?;
        let Some(expire_after) = state.limits.expire_after else {
            return Ok(None);
        };
        let timestamp = state.backend.get_timestamp(key).await?;
        Ok(timestamp.map(|t| t + expire_after))
    }

    /// Get a value and deserialize it.
    pub async fn get_as<T: DeserializeOwned>(&self, key: &str) -> BrokerResult<Option<T>> {
        match self.get(key).await? {
            Some(value) => Ok(Some(serde_json::from_value(value)?)),
            None => Ok(None),
        }
    }

    /// Serialize and insert or overwrite a value.
    pub async fn put_as<T: Serialize>(&self, key: &str, value: &T) -> BrokerResult<()> {
        self.put(key, serde_json::to_value(value)?).await
    }

    /// Serialize and update (or create) a value.
    pub async fn update_as<T: Serialize>(&self, key: &str, value: &T) -> BrokerResult<()> {
        self.update(key, serde_json::to_value(value)?).await
    }

    /// Serialize and insert a value only if the key is absent.
    pub async fn create_as<T: Serialize>(&self, key: &str, value: &T) -> BrokerResult<bool> {
        self.create(key, serde_json::to_value(value)?).await
    }

    /// Stop the cleaner and release the backend. Idempotent; later
    /// operations fail with `ServiceUnavailable`.
    pub async fn destroy(&self) {
        let _guard = self.lifecycle.lock().await;
        if let Some(state) = self.state.swap(None) {
            teardown(&self.id, &state).await;
            tracing::info!(store = %self.id, "Expiring store destroyed");
        }
    }

    fn state(&self) -> BrokerResult<Arc<StoreState>> {
        self.state.load_full().ok_or_else(|| {
            BrokerError::service_unavailable(format!("Store '{}' has been destroyed", self.id))
        })
    }

    async fn write(&self, key: &str, value: Value, mode: WriteMode) -> BrokerResult<WriteOutcome> {
        let state = self.state()?;
        let max = state.limits.max_entries;
        if max != UNLIMITED && state.backend.is_at_capacity(max as u64).await? {
            tracing::warn!(store = %self.id, max, "Store is at capacity, write rejected");
            return Err(BrokerError::capacity_exceeded(&self.id, max));
        }
        state.backend.put(key, value, Utc::now(), mode).await
    }
}

/// Validate and resolve capacity and expiry settings.
fn resolve_limits(config: &StoreConfig) -> BrokerResult<Limits> {
    if config.max < UNLIMITED {
        return Err(BrokerError::configuration(format!(
            "Store '{}' max must be -1 (unlimited) or a non-negative count, got {}",
            config.id, config.max
        )));
    }

    let expire_after = match config.expire_seconds {
        None | Some(0) => None,
        Some(secs) => {
            let secs = i64::try_from(secs).map_err(|_| {
                BrokerError::configuration(format!(
                    "Store '{}' expire_seconds is out of range",
                    config.id
                ))
            })?;
            Some(chrono::Duration::seconds(secs))
        }
    };

    let interval_secs = match config.interval_seconds {
        Some(0) if expire_after.is_some() => {
            return Err(BrokerError::configuration(format!(
                "Store '{}' cleanup interval must be greater than zero",
                config.id
            )));
        }
        Some(secs) => secs,
        None => DEFAULT_CLEANUP_INTERVAL_SECONDS,
    };

    Ok(Limits {
        max_entries: config.max,
        expire_after,
        cleanup_interval: Duration::from_secs(interval_secs),
    })
}

async fn teardown(store_id: &str, state: &StoreState) {
    if let Some(cleaner) = &state.cleaner {
        cleaner.stop();
    }
    if let Err(e) = state.backend.destroy().await {
        tracing::warn!(store = %store_id, error = %e, "Failed to release store backend");
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use broker_core::config::store::HandlerConfig;
    use broker_core::error::ErrorKind;
    use broker_core::types::ResourceAttributes;

    fn config(max: i64, expire_seconds: Option<u64>) -> StoreConfig {
        StoreConfig {
            id: "tickets".to_string(),
            max,
            expire_seconds,
            interval_seconds: None,
            resource_group: None,
            handler: HandlerConfig {
                id: "ticket-memory".to_string(),
                class: "memory".to_string(),
                options: ResourceAttributes::new(),
            },
        }
    }

    #[test]
    fn test_limits_defaults() {
        let limits = resolve_limits(&config(UNLIMITED, Some(300))).unwrap();
        assert_eq!(limits.max_entries, -1);
        assert_eq!(limits.expire_after, Some(chrono::Duration::seconds(300)));
        assert_eq!(limits.cleanup_interval, Duration::from_secs(60));

        let never = resolve_limits(&config(10, Some(0))).unwrap();
        assert!(never.expire_after.is_none());
    }

    #[test]
    fn test_limits_reject_invalid_max() {
        let err = resolve_limits(&config(-2, None)).unwrap_err();
        assert_eq!(err.kind, ErrorKind::Configuration);
    }

    #[test]
    fn test_limits_reject_zero_interval_with_expiry() {
        let mut cfg = config(UNLIMITED, Some(30));
        cfg.interval_seconds = Some(0);
        assert_eq!(
            resolve_limits(&cfg).unwrap_err().kind,
            ErrorKind::Configuration
        );
    }

    #[cfg(feature = "memory")]
    #[tokio::test]
    async fn test_unknown_backend_fails_init() {
        let mut cfg = config(UNLIMITED, None);
        cfg.handler.class = "jdbc".to_string();
        let err = ExpiringStore::init(&cfg, &BackendRegistry::with_builtins(), None)
            .await
            .unwrap_err();
        assert_eq!(err.kind, ErrorKind::Configuration);
    }

    #[cfg(feature = "memory")]
    #[tokio::test]
    async fn test_expiration_time_is_timestamp_plus_age() {
        let store = ExpiringStore::init(
            &config(UNLIMITED, Some(120)),
            &BackendRegistry::with_builtins(),
            None,
        )
        .await
        .unwrap();

        store.put("t", Value::from("x")).await.unwrap();
        let stamp = store.get_timestamp("t").await.unwrap().unwrap();
        let expires = store.get_expiration_time("t").await.unwrap().unwrap();
        assert_eq!(expires - stamp, chrono::Duration::seconds(120));
        assert!(store.get_expiration_time("missing").await.unwrap().is_none());

        store.destroy().await;
    }
}
