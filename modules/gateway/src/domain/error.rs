//! Domain error taxonomy for the gateway.
//!
//! Every RPC method resolves to exactly one of these kinds. Lookup failures
//! (`NotFound`, `TypeMismatch`) are caller errors and are never retried
//! internally; creation failures trigger local cleanup before they surface;
//! cancellation is classified before anything is wrapped as `Internal`.

use coordgate_discovery::{CoordinationError, DiscoveryError};
use thiserror::Error;

/// Domain-level errors for the gateway module.
#[derive(Error, Debug)]
pub enum DomainError {
    /// Unknown or already-closed session/resource handle.
    #[error("unknown handle: {0}")]
    NotFound(String),

    /// The handle resolved, but to a resource of a different kind.
    #[error("resource {id} is not a {expected}")]
    TypeMismatch { id: String, expected: &'static str },

    /// The coordination client failed to start or communicate.
    #[error("connection failed: {0}")]
    Connection(String),

    /// A discovery registry or provider failed to start.
    #[error("discovery failure: {0}")]
    Discovery(String),

    /// Selection found no eligible instance.
    #[error("no instances available for service: {0}")]
    NoInstancesAvailable(String),

    /// The caller's request was cancelled mid-flight.
    #[error("operation cancelled")]
    Cancelled,

    /// Unexpected failure from a collaborator, wrapped opaquely.
    #[error("internal error: {0}")]
    Internal(#[from] anyhow::Error),
}

impl DomainError {
    /// Creates a `NotFound` error.
    #[must_use]
    pub fn not_found(handle: impl Into<String>) -> Self {
        Self::NotFound(handle.into())
    }

    /// Creates a `TypeMismatch` error.
    #[must_use]
    pub fn type_mismatch(id: impl Into<String>, expected: &'static str) -> Self {
        Self::TypeMismatch {
            id: id.into(),
            expected,
        }
    }

    /// Creates a `Connection` error.
    #[must_use]
    pub fn connection(msg: impl Into<String>) -> Self {
        Self::Connection(msg.into())
    }

    /// Creates a `Discovery` error.
    #[must_use]
    pub fn discovery(msg: impl Into<String>) -> Self {
        Self::Discovery(msg.into())
    }
}

impl From<CoordinationError> for DomainError {
    fn from(e: CoordinationError) -> Self {
        match e {
            CoordinationError::Cancelled => Self::Cancelled,
            CoordinationError::Connection(msg) => Self::Connection(msg),
            CoordinationError::Closed => Self::Connection("client is closed".to_owned()),
            CoordinationError::Internal(msg) => Self::Internal(anyhow::anyhow!(msg)),
        }
    }
}

impl From<DiscoveryError> for DomainError {
    fn from(e: DiscoveryError) -> Self {
        match e {
            DiscoveryError::NoInstancesAvailable(name) => Self::NoInstancesAvailable(name),
            DiscoveryError::Coordination(CoordinationError::Cancelled) => Self::Cancelled,
            other => Self::Discovery(other.to_string()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn constructors_build_expected_variants() {
        assert!(matches!(
            DomainError::not_found("s-1"),
            DomainError::NotFound(_)
        ));
        assert!(matches!(
            DomainError::type_mismatch("r-1", "provider"),
            DomainError::TypeMismatch { .. }
        ));
        assert!(matches!(
            DomainError::connection("refused"),
            DomainError::Connection(_)
        ));
        assert!(matches!(
            DomainError::discovery("bad path"),
            DomainError::Discovery(_)
        ));
    }

    #[test]
    fn cancellation_is_classified_before_internal() {
        let e: DomainError = CoordinationError::Cancelled.into();
        assert!(matches!(e, DomainError::Cancelled));

        let e: DomainError =
            DiscoveryError::Coordination(CoordinationError::Cancelled).into();
        assert!(matches!(e, DomainError::Cancelled));
    }

    #[test]
    fn discovery_failures_map_by_kind() {
        let e: DomainError = DiscoveryError::NoInstancesAvailable("foo".to_owned()).into();
        assert!(matches!(e, DomainError::NoInstancesAvailable(name) if name == "foo"));

        let e: DomainError = DiscoveryError::InvalidBasePath("oops".to_owned()).into();
        assert!(matches!(e, DomainError::Discovery(_)));
    }

    #[test]
    fn error_display() {
        assert_eq!(
            DomainError::not_found("s-1").to_string(),
            "unknown handle: s-1"
        );
        assert_eq!(
            DomainError::type_mismatch("r-1", "provider").to_string(),
            "resource r-1 is not a provider"
        );
    }
}
