//! Redis storage backend.
//!
//! Each store uses two keys: a hash of serialized values and a sorted set of
//! write timestamps (epoch milliseconds) that drives expiry.

pub mod backend;
pub mod client;

pub use backend::RedisBackend;
pub use client::StoreKeys;
