//! Expiring store configuration.

use serde::{Deserialize, Serialize};

use crate::types::ResourceAttributes;

/// Sentinel for "no capacity limit".
pub const UNLIMITED: i64 = -1;

/// Default seconds between cleanup sweeps when expiry is enabled.
pub const DEFAULT_CLEANUP_INTERVAL_SECONDS: u64 = 60;

/// Configuration of one expiring store.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StoreConfig {
    /// Store identifier.
    pub id: String,
    /// Maximum number of entries; `-1` means unlimited.
    #[serde(default = "default_max")]
    pub max: i64,
    /// Seconds after insert/update at which an entry expires. Absent or `0`
    /// disables expiry and the cleaner.
    #[serde(default)]
    pub expire_seconds: Option<u64>,
    /// Seconds between cleanup sweeps.
    #[serde(default)]
    pub interval_seconds: Option<u64>,
    /// Name of the resource group a networked backend should connect through.
    #[serde(default)]
    pub resource_group: Option<String>,
    /// Backend selection and backend-specific settings.
    pub handler: HandlerConfig,
}

/// Backend selection for a store.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HandlerConfig {
    /// Handler instance identifier, used in log events.
    pub id: String,
    /// Registered backend name (e.g. `"memory"`, `"sql"`, `"redis"`).
    pub class: String,
    /// Backend-specific options.
    #[serde(default)]
    pub options: ResourceAttributes,
}

fn default_max() -> i64 {
    UNLIMITED
}
