//! Broker configuration schemas.
//!
//! All configuration structs are deserialized via the `config` crate from
//! TOML files plus a `BROKER__`-prefixed environment overlay. Each
//! sub-module represents one logical section.

pub mod logging;
pub mod resource;
pub mod store;

use serde::{Deserialize, Serialize};

use self::logging::LoggingConfig;
use self::resource::ResourceGroupConfig;
use self::store::StoreConfig;

use crate::error::BrokerError;

/// Root broker configuration.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct BrokerConfig {
    /// Logging settings.
    #[serde(default)]
    pub logging: LoggingConfig,
    /// Redundant backend pools.
    #[serde(default)]
    pub resource_groups: Vec<ResourceGroupConfig>,
    /// Expiring stores for sessions, tickets, and cached assertions.
    #[serde(default)]
    pub stores: Vec<StoreConfig>,
}

impl BrokerConfig {
    /// Load configuration from `{config_dir}/default`, the `{config_dir}/{env}`
    /// overlay, and `BROKER__*` environment variables.
    pub fn load(config_dir: &str, env: &str) -> Result<Self, BrokerError> {
        let config = config::Config::builder()
            .add_source(config::File::with_name(&format!("{config_dir}/default")).required(false))
            .add_source(config::File::with_name(&format!("{config_dir}/{env}")).required(false))
            .add_source(
                config::Environment::with_prefix("BROKER")
                    .separator("__")
                    .try_parsing(true),
            )
            .build()
            .map_err(|e| BrokerError::configuration(format!("Failed to build config: {e}")))?;

        config
            .try_deserialize()
            .map_err(|e| BrokerError::configuration(format!("Failed to deserialize config: {e}")))
    }

    /// Parse configuration from a TOML document.
    pub fn from_toml(source: &str) -> Result<Self, BrokerError> {
        config::Config::builder()
            .add_source(config::File::from_str(source, config::FileFormat::Toml))
            .build()?
            .try_deserialize()
            .map_err(|e| BrokerError::configuration(format!("Failed to deserialize config: {e}")))
    }
}
