//! PostgreSQL `SELECT 1` health check.

use std::time::Duration;

use async_trait::async_trait;
use sqlx::postgres::{PgPool, PgPoolOptions};

use broker_core::config::resource::PollingConfig;
use broker_core::error::{BrokerError, ErrorKind};
use broker_core::result::BrokerResult;
use broker_core::traits::PollingMethod;
use broker_core::types::ResourceAttributes;

const DEFAULT_TIMEOUT_SECONDS: u64 = 5;

/// Considers a database resource live when `SELECT 1` succeeds.
///
/// Reads `url` from the resource attributes. The pool is connected lazily
/// and holds a single connection.
#[derive(Debug, Clone)]
pub struct SqlPoll {
    pool: PgPool,
}

impl SqlPoll {
    /// Build from resource attributes.
    pub fn from_attributes(
        _config: &PollingConfig,
        attrs: &ResourceAttributes,
    ) -> BrokerResult<Self> {
        let url = attrs
            .get_str("url")
            .ok_or_else(|| BrokerError::configuration("sql polling requires a 'url' attribute"))?;
        let timeout = attrs
            .get_u64("timeout_seconds")
            .unwrap_or(DEFAULT_TIMEOUT_SECONDS);

        let pool = PgPoolOptions::new()
            .max_connections(1)
            .acquire_timeout(Duration::from_secs(timeout))
            .connect_lazy(&url)
            .map_err(|e| {
                BrokerError::with_source(
                    ErrorKind::Configuration,
                    format!("Invalid database url for sql polling: {e}"),
                    e,
                )
            })?;

        Ok(Self { pool })
    }
}

#[async_trait]
impl PollingMethod for SqlPoll {
    async fn poll(&self) -> BrokerResult<bool> {
        sqlx::query_scalar::<_, i32>("SELECT 1")
            .fetch_one(&self.pool)
            .await
            .map(|v| v == 1)
            .map_err(|e| BrokerError::with_source(ErrorKind::Storage, "Health check failed", e))
    }
}
