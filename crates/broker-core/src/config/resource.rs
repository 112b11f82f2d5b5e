//! Resource group configuration.

use serde::{Deserialize, Serialize};

use crate::types::ResourceAttributes;

/// One pool of redundant resources serving a single logical role.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ResourceGroupConfig {
    /// Group identifier.
    pub id: String,
    /// Seconds between recomputations of the active order. A default is
    /// used, with a warning, when absent.
    #[serde(default)]
    pub interval_seconds: Option<u64>,
    /// Severity of the event logged when no resource is live. Parsed
    /// leniently; unknown values fall back to `warn`.
    #[serde(default)]
    pub critical_notice_level: Option<String>,
    /// Member resources, in configuration order.
    #[serde(default)]
    pub resources: Vec<ResourceConfig>,
}

/// One backend endpoint within a group.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ResourceConfig {
    /// Resource identifier, unique within the group.
    pub id: String,
    /// Priority; lower is preferred.
    #[serde(default)]
    pub cost: i32,
    /// Health-check settings. Without them the resource is always live.
    #[serde(default)]
    pub polling: Option<PollingConfig>,
    /// Connection parameters passed through to callers.
    #[serde(default)]
    pub attributes: ResourceAttributes,
}

/// Health-check settings for a resource.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PollingConfig {
    /// Identifier of this health-check instance, used in log events.
    #[serde(default)]
    pub method_id: Option<String>,
    /// Registered polling method name (e.g. `"tcp"`, `"sql"`).
    pub method: String,
    /// Seconds between health checks. Without it no check runs and the
    /// resource stays live.
    #[serde(default)]
    pub interval_seconds: Option<u64>,
}
