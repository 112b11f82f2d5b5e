//! Capability traits defined in `broker-core` and implemented by other crates.

pub mod locator;
pub mod polling;
pub mod storage;

pub use locator::{ActiveResource, ResourceLocator};
pub use polling::PollingMethod;
pub use storage::{StorageBackend, WriteMode, WriteOutcome};
