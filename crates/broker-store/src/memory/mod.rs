//! In-memory storage backend.

pub mod backend;

pub use backend::MemoryBackend;
