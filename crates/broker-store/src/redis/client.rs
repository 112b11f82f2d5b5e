//! Redis connection management and key layout.

use dashmap::DashMap;
use redis::Client;
use redis::aio::ConnectionManager;

use broker_core::error::{BrokerError, ErrorKind};
use broker_core::result::BrokerResult;

use crate::endpoint::{Endpoint, mask_url};

/// Default prefix for every key a store writes.
pub const DEFAULT_KEY_PREFIX: &str = "broker:";

/// The two Redis keys backing one store.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StoreKeys {
    /// Hash of entry key → JSON value.
    pub values: String,
    /// Sorted set of entry key scored by write time in epoch milliseconds.
    pub stamps: String,
}

impl StoreKeys {
    /// Build the key pair for a store.
    pub fn new(prefix: &str, store_id: &str) -> Self {
        Self {
            values: format!("{prefix}{store_id}:values"),
            stamps: format!("{prefix}{store_id}:stamps"),
        }
    }
}

/// Connection managers per resource, resolved through an [`Endpoint`].
#[derive(Debug)]
pub struct RedisConnections {
    /// Owning store, for log events.
    store_id: String,
    /// Where to connect.
    endpoint: Endpoint,
    /// Resource key → reconnecting connection manager.
    managers: DashMap<String, ConnectionManager>,
}

impl RedisConnections {
    /// Create without connecting.
    pub fn new(store_id: impl Into<String>, endpoint: Endpoint) -> Self {
        Self {
            store_id: store_id.into(),
            endpoint,
            managers: DashMap::new(),
        }
    }

    /// Connection for the currently active target, connecting on first use.
    pub async fn get(&self) -> BrokerResult<ConnectionManager> {
        let target = self.endpoint.resolve()?;
        if let Some(conn) = self.managers.get(&target.key).map(|c| c.value().clone()) {
            return Ok(conn);
        }

        tracing::info!(
            store = %self.store_id,
            resource = %target.key,
            url = %mask_url(&target.url),
            "Connecting to Redis"
        );
        let client = Client::open(target.url.as_str()).map_err(|e| {
            BrokerError::with_source(
                ErrorKind::Configuration,
                format!("Invalid Redis url for store '{}'", self.store_id),
                e,
            )
        })?;
        let conn = ConnectionManager::new(client).await.map_err(|e| {
            BrokerError::with_source(ErrorKind::Storage, "Failed to connect to Redis", e)
        })?;

        Ok(self.managers.entry(target.key).or_insert(conn).value().clone())
    }

    /// Drop every cached connection.
    pub fn close(&self) {
        self.managers.clear();
    }
}
