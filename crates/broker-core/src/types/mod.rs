//! Shared value types used across broker crates.

pub mod attributes;
pub mod notice;

pub use attributes::ResourceAttributes;
pub use notice::NoticeLevel;
