//! Lookup of the currently preferred backend endpoint.

use std::sync::Arc;

use crate::result::BrokerResult;
use crate::types::ResourceAttributes;

/// The resource a locator currently recommends.
#[derive(Debug, Clone)]
pub struct ActiveResource {
    /// Resource id, unique within its group.
    pub id: String,
    /// Connection parameters for the resource.
    pub attributes: Arc<ResourceAttributes>,
}

/// Something that can name the live endpoint to connect to right now.
///
/// Resource groups implement this so networked storage backends can follow
/// failover without knowing about groups.
pub trait ResourceLocator: Send + Sync + std::fmt::Debug + 'static {
    /// Return the preferred live resource, or a `NoResourceActive` error.
    fn locate(&self) -> BrokerResult<ActiveResource>;
}
