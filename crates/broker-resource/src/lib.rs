//! # broker-resource
//!
//! Redundant backend pools for the SSO broker. A [`ResourceGroup`] owns a
//! set of [`PollableResource`]s, each optionally health-checked by a
//! [`PollingMethod`](broker_core::traits::PollingMethod) resolved through a
//! [`PollingRegistry`]. Callers ask the group for the active resource before
//! making a remote call and always receive the most recently computed,
//! lowest-cost live member.
//!
//! Built-in polling methods:
//!
//! - **tcp**: opens a TCP connection to `host`/`port` (or `address`)
//! - **sql**: runs `SELECT 1` against the PostgreSQL `url` (feature `sql`)

pub mod group;
pub mod polling;
pub mod registry;
pub mod resource;

pub use group::ResourceGroup;
pub use registry::PollingRegistry;
pub use resource::PollableResource;
