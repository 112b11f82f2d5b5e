//! Built-in polling methods.

#[cfg(feature = "sql")]
pub mod sql;
pub mod tcp;
