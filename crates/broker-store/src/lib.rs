//! # broker-store
//!
//! Generic expiring key/value stores for the SSO broker: sessions, tickets,
//! and cached assertions. An [`ExpiringStore`] enforces a capacity ceiling
//! and write modes, and runs a background [`Cleaner`] that purges entries
//! older than the configured age. Storage is delegated to a backend resolved
//! through a [`BackendRegistry`]:
//!
//! - **memory**: in-process map using [dashmap](https://crates.io/crates/dashmap)
//! - **sql**: PostgreSQL table via [sqlx](https://crates.io/crates/sqlx)
//! - **redis**: hash plus timestamp index via the [redis](https://crates.io/crates/redis) crate
//!
//! Networked backends may connect through a resource group so they follow
//! failover.

pub mod cleaner;
#[cfg(any(feature = "sql", feature = "redis-backend"))]
pub mod endpoint;
#[cfg(feature = "memory")]
pub mod memory;
#[cfg(feature = "redis-backend")]
pub mod redis;
pub mod registry;
#[cfg(feature = "sql")]
pub mod sql;
pub mod store;

pub use cleaner::Cleaner;
pub use registry::{BackendContext, BackendRegistry};
pub use store::ExpiringStore;
