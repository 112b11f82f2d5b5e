//! Unified error types for the broker infrastructure.
//!
//! Resource groups, stores, and backends all map their failures into
//! [`BrokerError`] so callers can branch on [`ErrorKind`] and propagate
//! with the `?` operator.

use std::fmt;
use thiserror::Error;

/// Error categories surfaced to callers.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, serde::Serialize, serde::Deserialize)]
pub enum ErrorKind {
    /// Missing or malformed configuration, or an unresolvable identifier.
    Configuration,
    /// A resource group has no live member.
    NoResourceActive,
    /// A store is at its configured maximum number of entries.
    CapacityExceeded,
    /// A storage backend failed (I/O, connection, query).
    Storage,
    /// A value could not be serialized or deserialized.
    Serialization,
    /// An unexpected internal failure.
    Internal,
    /// The component has been destroyed or is not yet initialized.
    ServiceUnavailable,
}

impl fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Configuration => write!(f, "CONFIGURATION"),
            Self::NoResourceActive => write!(f, "NO_RESOURCE_ACTIVE"),
            Self::CapacityExceeded => write!(f, "CAPACITY_EXCEEDED"),
            Self::Storage => write!(f, "STORAGE"),
            Self::Serialization => write!(f, "SERIALIZATION"),
            Self::Internal => write!(f, "INTERNAL"),
            Self::ServiceUnavailable => write!(f, "SERVICE_UNAVAILABLE"),
        }
    }
}

/// The error type shared by every broker crate.
#[derive(Debug, Error)]
#[error("{kind}: {message}")]
pub struct BrokerError {
    /// The category of error.
    pub kind: ErrorKind,
    /// A human-readable error message.
    pub message: String,
    /// Optional underlying cause.
    #[source]
    pub source: Option<Box<dyn std::error::Error + Send + Sync>>,
}

impl BrokerError {
    /// Create a new error.
    pub fn new(kind: ErrorKind, message: impl Into<String>) -> Self {
        Self {
            kind,
            message: message.into(),
            source: None,
        }
    }

    /// Create a new error with an underlying cause.
    pub fn with_source(
        kind: ErrorKind,
        message: impl Into<String>,
        source: impl std::error::Error + Send + Sync + 'static,
    ) -> Self {
        Self {
            kind,
            message: message.into(),
            source: Some(Box::new(source)),
        }
    }

    /// Create a configuration error.
    pub fn configuration(message: impl Into<String>) -> Self {
        Self::new(ErrorKind::Configuration, message)
    }

    /// Create a no-resource-active error for the named group.
    pub fn no_resource_active(group_id: &str) -> Self {
        Self::new(
            ErrorKind::NoResourceActive,
            format!("No active resource available in group '{group_id}'"),
        )
    }

    /// Create a capacity-exceeded error for the named store.
    pub fn capacity_exceeded(store_id: &str, max: i64) -> Self {
        Self::new(
            ErrorKind::CapacityExceeded,
            format!("Store '{store_id}' is at its maximum of {max} entries"),
        )
    }

    /// Create a storage error.
    pub fn storage(message: impl Into<String>) -> Self {
        Self::new(ErrorKind::Storage, message)
    }

    /// Create an internal error.
    pub fn internal(message: impl Into<String>) -> Self {
        Self::new(ErrorKind::Internal, message)
    }

    /// Create a service-unavailable error.
    pub fn service_unavailable(message: impl Into<String>) -> Self {
        Self::new(ErrorKind::ServiceUnavailable, message)
    }

    /// Whether this error is of the given kind.
    pub fn is(&self, kind: ErrorKind) -> bool {
        self.kind == kind
    }
}

impl Clone for BrokerError {
    fn clone(&self) -> Self {
        Self {
            kind: self.kind,
            message: self.message.clone(),
            source: None,
        }
    }
}

impl From<serde_json::Error> for BrokerError {
    fn from(err: serde_json::Error) -> Self {
        Self::with_source(
            ErrorKind::Serialization,
            format!("JSON serialization error: {err}"),
            err,
        )
    }
}

impl From<std::io::Error> for BrokerError {
    fn from(err: std::io::Error) -> Self {
        Self::with_source(ErrorKind::Storage, format!("I/O error: {err}"), err)
    }
}

impl From<config::ConfigError> for BrokerError {
    fn from(err: config::ConfigError) -> Self {
        Self::with_source(
            ErrorKind::Configuration,
            format!("Configuration error: {err}"),
            err,
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_display_includes_kind() {
        let err = BrokerError::no_resource_active("ldap-pool");
        assert_eq!(
            err.to_string(),
            "NO_RESOURCE_ACTIVE: No active resource available in group 'ldap-pool'"
        );
        assert!(err.is(ErrorKind::NoResourceActive));
    }

    #[test]
    fn test_clone_drops_source() {
        let io = std::io::Error::other("disk gone");
        let err = BrokerError::from(io);
        assert!(err.source.is_some());
        let cloned = err.clone();
        assert_eq!(cloned.kind, ErrorKind::Storage);
        assert!(cloned.source.is_none());
    }
}
