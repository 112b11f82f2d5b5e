//! PostgreSQL table storage backend.

pub mod backend;
mod table;

pub use backend::SqlBackend;
pub use table::TableName;
