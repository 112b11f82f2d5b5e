//! Convenience result type alias for the broker.

use crate::error::BrokerError;

/// A specialized `Result` type for broker operations.
pub type BrokerResult<T> = Result<T, BrokerError>;
