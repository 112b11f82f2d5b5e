//! TCP connect health check.

use std::time::Duration;

use async_trait::async_trait;
use tokio::net::TcpStream;
use tokio::time;

use broker_core::config::resource::PollingConfig;
use broker_core::error::BrokerError;
use broker_core::result::BrokerResult;
use broker_core::traits::PollingMethod;
use broker_core::types::ResourceAttributes;

const DEFAULT_TIMEOUT_SECONDS: u64 = 5;

/// Considers a resource live when a TCP connection to it can be opened.
///
/// Reads `address` (`host:port`), or `host` and `port`, from the resource
/// attributes. `timeout_seconds` bounds each attempt.
#[derive(Debug, Clone)]
pub struct TcpPoll {
    /// Target in `host:port` form.
    address: String,
    /// Connect timeout.
    timeout: Duration,
}

impl TcpPoll {
    /// Create a check against an explicit address.
    pub fn new(address: impl Into<String>, timeout: Duration) -> Self {
        Self {
            address: address.into(),
            timeout,
        }
    }

    /// Build from resource attributes.
    pub fn from_attributes(
        _config: &PollingConfig,
        attrs: &ResourceAttributes,
    ) -> BrokerResult<Self> {
        let address = match attrs.get_str("address") {
            Some(address) => address,
            None => {
                let host = attrs.get_str("host").ok_or_else(|| {
                    BrokerError::configuration("tcp polling requires 'address' or 'host'/'port'")
                })?;
                let port = attrs.get_u64("port").ok_or_else(|| {
                    BrokerError::configuration("tcp polling requires a numeric 'port'")
                })?;
                format!("{host}:{port}")
            }
        };
        let timeout = attrs
            .get_u64("timeout_seconds")
            .unwrap_or(DEFAULT_TIMEOUT_SECONDS);

        Ok(Self::new(address, Duration::from_secs(timeout)))
    }
}

#[async_trait]
impl PollingMethod for TcpPoll {
    async fn poll(&self) -> BrokerResult<bool> {
        match time::timeout(self.timeout, TcpStream::connect(&self.address)).await {
            Ok(Ok(_stream)) => Ok(true),
            Ok(Err(e)) => Err(BrokerError::from(e)),
            Err(_) => Ok(false),
        }
    }
}
