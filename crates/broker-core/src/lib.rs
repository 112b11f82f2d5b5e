//! # broker-core
//!
//! Core crate for the SSO broker infrastructure. Contains the capability
//! traits implemented by polling methods and storage backends, the
//! configuration schemas, shared types, and the unified error system.
//!
//! This crate has **no** internal dependencies on other broker crates.

pub mod config;
pub mod error;
pub mod result;
pub mod traits;
pub mod types;

pub use error::BrokerError;
pub use result::BrokerResult;
