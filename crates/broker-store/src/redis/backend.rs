//! Redis storage backend implementation.

use std::collections::HashMap;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use redis::{AsyncCommands, Script};
use serde_json::Value;

use broker_core::error::{BrokerError, ErrorKind};
use broker_core::result::BrokerResult;
use broker_core::traits::{StorageBackend, WriteMode, WriteOutcome};

use super::client::{DEFAULT_KEY_PREFIX, RedisConnections, StoreKeys};
use crate::endpoint::Endpoint;
use crate::registry::BackendContext;

/// Insert only if the field is absent, stamping it in the same step.
///
/// KEYS[1] = values hash
/// KEYS[2] = stamps sorted set
/// ARGV[1] = entry key
/// ARGV[2] = JSON value
/// ARGV[3] = timestamp millis
///
/// Returns 1 when written, 0 when the key already existed.
const INSERT_ONLY_SCRIPT: &str = r#"
    if redis.call('HSETNX', KEYS[1], ARGV[1], ARGV[2]) == 1 then
        redis.call('ZADD', KEYS[2], ARGV[3], ARGV[1])
        return 1
    end
    return 0
"#;

/// Remove every entry stamped strictly before the cutoff.
///
/// KEYS[1] = values hash
/// KEYS[2] = stamps sorted set
/// ARGV[1] = cutoff millis
///
/// Returns the number of entries removed.
const CLEANUP_SCRIPT: &str = r#"
    local expired = redis.call('ZRANGEBYSCORE', KEYS[2], '-inf', '(' .. ARGV[1])
    local batch = 500
    for i = 1, #expired, batch do
        local last = math.min(i + batch - 1, #expired)
        redis.call('HDEL', KEYS[1], unpack(expired, i, last))
        redis.call('ZREM', KEYS[2], unpack(expired, i, last))
    end
    return #expired
"#;

/// Stores entries in a Redis hash with a sorted-set timestamp index.
///
/// Options: `prefix` (default `broker:`), and either `url` or a resource
/// group whose active resource carries the URL.
#[derive(Debug)]
pub struct RedisBackend {
    store_id: String,
    keys: StoreKeys,
    connections: RedisConnections,
    insert_only: Script,
    cleanup: Script,
}

impl RedisBackend {
    /// Validate options and connect to the currently active endpoint.
    pub async fn init(ctx: &BackendContext) -> BrokerResult<Self> {
        let options = &ctx.handler.options;
        let prefix = options
            .get_str("prefix")
            .unwrap_or_else(|| DEFAULT_KEY_PREFIX.to_string());
        let endpoint = Endpoint::from_options(options, ctx.locator.clone())?;

        let backend = Self {
            store_id: ctx.store_id.clone(),
            keys: StoreKeys::new(&prefix, &ctx.store_id),
            connections: RedisConnections::new(ctx.store_id.clone(), endpoint),
            insert_only: Script::new(INSERT_ONLY_SCRIPT),
            cleanup: Script::new(CLEANUP_SCRIPT),
        };

        match backend.connections.get().await {
            Ok(_) => {}
            Err(e) if e.is(ErrorKind::NoResourceActive) => {
                tracing::warn!(
                    store = %backend.store_id,
                    "No active Redis resource at init, connecting on first use"
                );
            }
            Err(e) => return Err(e),
        }

        tracing::info!(
            store = %backend.store_id,
            values = %backend.keys.values,
            "Redis store backend ready"
        );
        Ok(backend)
    }

    /// Keys this backend writes to.
    pub fn keys(&self) -> &StoreKeys {
        &self.keys
    }

    fn map_err(e: redis::RedisError) -> BrokerError {
        BrokerError::with_source(ErrorKind::Storage, format!("Redis error: {e}"), e)
    }
}

#[async_trait]
impl StorageBackend for RedisBackend {
    async fn get(&self, key: &str) -> BrokerResult<Option<Value>> {
        let mut conn = self.connections.get().await?;
        let raw: Option<String> = conn
            .hget(&self.keys.values, key)
            .await
            .map_err(Self::map_err)?;
        raw.map(|s| serde_json::from_str(&s).map_err(BrokerError::from))
            .transpose()
    }

    async fn get_all(&self) -> BrokerResult<HashMap<String, Value>> {
        let mut conn = self.connections.get().await?;
        let raw: HashMap<String, String> = conn
            .hgetall(&self.keys.values)
            .await
            .map_err(Self::map_err)?;
        raw.into_iter()
            .map(|(k, v)| Ok((k, serde_json::from_str(&v)?)))
            .collect()
    }

    async fn get_count(&self) -> BrokerResult<u64> {
        let mut conn = self.connections.get().await?;
        let count: u64 = conn.hlen(&self.keys.values).await.map_err(Self::map_err)?;
        Ok(count)
    }

    async fn get_timestamp(&self, key: &str) -> BrokerResult<Option<DateTime<Utc>>> {
        let mut conn = self.connections.get().await?;
        let score: Option<f64> = conn
            .zscore(&self.keys.stamps, key)
            .await
            .map_err(Self::map_err)?;
        Ok(score.and_then(|millis| DateTime::from_timestamp_millis(millis as i64)))
    }

    async fn put(
        &self,
        key: &str,
        value: Value,
        timestamp: DateTime<Utc>,
        mode: WriteMode,
    ) -> BrokerResult<WriteOutcome> {
        let json = serde_json::to_string(&value)?;
        let millis = timestamp.timestamp_millis();
        let mut conn = self.connections.get().await?;

        match mode {
            WriteMode::InsertOnly => {
                let written: i64 = self
                    .insert_only
                    .key(&self.keys.values)
                    .key(&self.keys.stamps)
                    .arg(key)
                    .arg(&json)
                    .arg(millis)
                    .invoke_async(&mut conn)
                    .await
                    .map_err(Self::map_err)?;
                if written == 1 {
                    Ok(WriteOutcome::Written)
                } else {
                    Ok(WriteOutcome::AlreadyExists)
                }
            }
            WriteMode::PreferUpdate | WriteMode::Overwrite => {
                let _: () = redis::pipe()
                    .atomic()
                    .hset(&self.keys.values, key, &json)
                    .ignore()
                    .zadd(&self.keys.stamps, key, millis)
                    .ignore()
                    .query_async(&mut conn)
                    .await
                    .map_err(Self::map_err)?;
                Ok(WriteOutcome::Written)
            }
        }
    }

    async fn contains_key(&self, key: &str) -> BrokerResult<bool> {
        let mut conn = self.connections.get().await?;
        let exists: bool = conn
            .hexists(&self.keys.values, key)
            .await
            .map_err(Self::map_err)?;
        Ok(exists)
    }

    async fn remove(&self, key: &str) -> BrokerResult<bool> {
        let mut conn = self.connections.get().await?;
        let (removed,): (u64,) = redis::pipe()
            .atomic()
            .hdel(&self.keys.values, key)
            .zrem(&self.keys.stamps, key)
            .ignore()
            .query_async(&mut conn)
            .await
            .map_err(Self::map_err)?;
        Ok(removed > 0)
    }

    async fn remove_all(&self) -> BrokerResult<()> {
        let mut conn = self.connections.get().await?;
        let _: () = redis::pipe()
            .atomic()
            .del(&self.keys.values)
            .ignore()
            .del(&self.keys.stamps)
            .ignore()
            .query_async(&mut conn)
            .await
            .map_err(Self::map_err)?;
        Ok(())
    }

    async fn is_at_capacity(&self, max: u64) -> BrokerResult<bool> {
        Ok(self.get_count().await? >= max)
    }

    async fn cleanup(&self, cutoff: DateTime<Utc>) -> BrokerResult<u64> {
        let mut conn = self.connections.get().await?;
        let removed: u64 = self
            .cleanup
            .key(&self.keys.values)
            .key(&self.keys.stamps)
            .arg(cutoff.timestamp_millis())
            .invoke_async(&mut conn)
            .await
            .map_err(Self::map_err)?;
        Ok(removed)
    }

    async fn destroy(&self) -> BrokerResult<()> {
        self.connections.close();
        tracing::info!(store = %self.store_id, "Redis connections released");
        Ok(())
    }
}
