//! In-memory backend using dashmap.

use std::collections::HashMap;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use dashmap::DashMap;
use dashmap::mapref::entry::Entry;
use serde_json::Value;
use tracing::debug;

use broker_core::result::BrokerResult;
use broker_core::traits::{StorageBackend, WriteMode, WriteOutcome};

/// A stored value and its insert/update time.
#[derive(Debug, Clone)]
struct Stored {
    value: Value,
    stored_at: DateTime<Utc>,
}

/// In-process backend. Entries live as long as the process.
///
/// Insert-only writes go through the map's entry API, so of several
/// concurrent creators of one key exactly one wins.
#[derive(Debug, Default)]
pub struct MemoryBackend {
    entries: DashMap<String, Stored>,
}

impl MemoryBackend {
    /// Create an empty backend.
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl StorageBackend for MemoryBackend {
    async fn get(&self, key: &str) -> BrokerResult<Option<Value>> {
        Ok(self.entries.get(key).map(|e| e.value.clone()))
    }

    async fn get_all(&self) -> BrokerResult<HashMap<String, Value>> {
        Ok(self
            .entries
            .iter()
            .map(|e| (e.key().clone(), e.value().value.clone()))
            .collect())
    }

    async fn get_count(&self) -> BrokerResult<u64> {
        Ok(self.entries.len() as u64)
    }

    async fn get_timestamp(&self, key: &str) -> BrokerResult<Option<DateTime<Utc>>> {
        Ok(self.entries.get(key).map(|e| e.stored_at))
    }

    async fn put(
        &self,
        key: &str,
        value: Value,
        timestamp: DateTime<Utc>,
        mode: WriteMode,
    ) -> BrokerResult<WriteOutcome> {
        let stored = Stored {
            value,
            stored_at: timestamp,
        };

        match mode {
            WriteMode::InsertOnly => match self.entries.entry(key.to_string()) {
                Entry::Occupied(_) => Ok(WriteOutcome::AlreadyExists),
                Entry::Vacant(slot) => {
                    slot.insert(stored);
                    Ok(WriteOutcome::Written)
                }
            },
            WriteMode::PreferUpdate => {
                match self.entries.get_mut(key) {
                    Some(mut existing) => *existing = stored,
                    None => {
                        self.entries.insert(key.to_string(), stored);
                    }
                }
                Ok(WriteOutcome::Written)
            }
            WriteMode::Overwrite => {
                self.entries.insert(key.to_string(), stored);
                Ok(WriteOutcome::Written)
            }
        }
    }

    async fn contains_key(&self, key: &str) -> BrokerResult<bool> {
        Ok(self.entries.contains_key(key))
    }

    async fn remove(&self, key: &str) -> BrokerResult<bool> {
        Ok(self.entries.remove(key).is_some())
    }

    async fn remove_all(&self) -> BrokerResult<()> {
        self.entries.clear();
        Ok(())
    }

    async fn is_at_capacity(&self, max: u64) -> BrokerResult<bool> {
        Ok(self.entries.len() as u64 >= max)
    }

    async fn cleanup(&self, cutoff: DateTime<Utc>) -> BrokerResult<u64> {
        let mut removed = 0u64;
        self.entries.retain(|_, stored| {
            let keep = stored.stored_at >= cutoff;
            if !keep {
                removed += 1;
            }
            keep
        });
        debug!(removed, %cutoff, "Purged expired in-memory entries");
        Ok(removed)
    }

    async fn destroy(&self) -> BrokerResult<()> {
        self.entries.clear();
        Ok(())
    }
}
