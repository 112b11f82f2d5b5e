//! Health-check capability for pollable resources.

use async_trait::async_trait;

use crate::result::BrokerResult;

/// A health check for one configured resource.
///
/// Implementations are resolved by identifier from configuration. An `Err`
/// from `poll` is treated the same as `Ok(false)` by the health-check loop.
#[async_trait]
pub trait PollingMethod: Send + Sync + std::fmt::Debug + 'static {
    /// Check the resource. Returns `true` if it is reachable and usable.
    async fn poll(&self) -> BrokerResult<bool>;
}
