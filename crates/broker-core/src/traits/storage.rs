//! Storage backend trait for expiring stores.

use std::collections::HashMap;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde_json::Value;

use crate::result::BrokerResult;

/// How a write should treat an existing key.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum WriteMode {
    /// Write only if the key is absent. Must be atomic with respect to
    /// concurrent `InsertOnly` writes on the same key.
    InsertOnly,
    /// Prefer updating an existing entry; backends may insert if absent.
    PreferUpdate,
    /// Insert or replace unconditionally.
    Overwrite,
}

/// Result of a write that did not fail.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WriteOutcome {
    /// The value was stored.
    Written,
    /// `InsertOnly` found the key already present; nothing was changed.
    AlreadyExists,
}

/// Trait for pluggable expiring-store backends (memory, SQL table, Redis).
///
/// The backend owns entry timestamps and is responsible for its own
/// concurrency discipline. Writes must be visible to subsequent reads from
/// any caller as soon as `put` returns.
#[async_trait]
pub trait StorageBackend: Send + Sync + std::fmt::Debug + 'static {
    /// Get a value by key.
    async fn get(&self, key: &str) -> BrokerResult<Option<Value>>;

    /// Get every stored entry.
    async fn get_all(&self) -> BrokerResult<HashMap<String, Value>>;

    /// Number of stored entries.
    async fn get_count(&self) -> BrokerResult<u64>;

    /// Insert/update time of an entry.
    async fn get_timestamp(&self, key: &str) -> BrokerResult<Option<DateTime<Utc>>>;

    /// Write a value with the given timestamp and mode.
    async fn put(
        &self,
        key: &str,
        value: Value,
        timestamp: DateTime<Utc>,
        mode: WriteMode,
    ) -> BrokerResult<WriteOutcome>;

    /// Whether a key is present.
    async fn contains_key(&self, key: &str) -> BrokerResult<bool>;

    /// Remove a key. Returns `true` if it was present.
    async fn remove(&self, key: &str) -> BrokerResult<bool>;

    /// Remove every entry.
    async fn remove_all(&self) -> BrokerResult<()>;

    /// Whether the backend holds `max` or more entries.
    async fn is_at_capacity(&self, max: u64) -> BrokerResult<bool>;

    /// Remove every entry whose timestamp is strictly before `cutoff`.
    /// Returns the number of entries removed.
    async fn cleanup(&self, cutoff: DateTime<Utc>) -> BrokerResult<u64>;

    /// Release connections and other held resources.
    async fn destroy(&self) -> BrokerResult<()>;
}
