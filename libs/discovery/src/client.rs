//! The coordination-client seam.
//!
//! Everything the discovery layer needs from the coordination service is a
//! flat namespace of nodes with ephemeral ownership. Session handling, watch
//! delivery, and the wire protocol all live behind [`CoordinationClient`];
//! this crate never sees them.

use std::sync::Arc;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Failures surfaced by a coordination client.
#[derive(Error, Debug)]
pub enum CoordinationError {
    /// The client could not connect to or negotiate with the service.
    #[error("connection failed: {0}")]
    Connection(String),

    /// The calling task was cancelled while the operation was in flight.
    #[error("operation cancelled")]
    Cancelled,

    /// The client was already closed.
    #[error("client is closed")]
    Closed,

    /// Unexpected failure inside the client.
    #[error("coordination failure: {0}")]
    Internal(String),
}

impl CoordinationError {
    #[must_use]
    pub fn connection(msg: impl Into<String>) -> Self {
        Self::Connection(msg.into())
    }

    #[must_use]
    pub fn internal(msg: impl Into<String>) -> Self {
        Self::Internal(msg.into())
    }
}

/// Parameters for establishing one coordination session.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ConnectionConfig {
    /// Backend-specific connect string (host list, namespace, ...).
    #[serde(default)]
    pub connect_string: String,
    #[serde(default = "default_session_timeout_ms")]
    pub session_timeout_ms: u64,
    #[serde(default = "default_connection_timeout_ms")]
    pub connection_timeout_ms: u64,
}

impl Default for ConnectionConfig {
    fn default() -> Self {
        Self {
            connect_string: String::new(),
            session_timeout_ms: default_session_timeout_ms(),
            connection_timeout_ms: default_connection_timeout_ms(),
        }
    }
}

fn default_session_timeout_ms() -> u64 {
    60_000
}

fn default_connection_timeout_ms() -> u64 {
    15_000
}

/// One connected coordination session.
///
/// Nodes written with [`put_ephemeral`](Self::put_ephemeral) belong to this
/// client and disappear when it closes. Implementations must be safe to call
/// from concurrently running tasks.
#[async_trait]
pub trait CoordinationClient: Send + Sync + 'static {
    /// Establish the session. Must be called exactly once, before any other
    /// operation.
    async fn start(&self) -> Result<(), CoordinationError>;

    /// Tear the session down, releasing every ephemeral node it owns.
    /// Closing an already-closed client is an error (`Closed`).
    async fn close(&self) -> Result<(), CoordinationError>;

    /// Create or replace the ephemeral node at `path`.
    async fn put_ephemeral(&self, path: &str, data: Vec<u8>) -> Result<(), CoordinationError>;

    /// Delete the node at `path`. Deleting a missing node is a no-op.
    async fn delete(&self, path: &str) -> Result<(), CoordinationError>;

    /// Read the data stored at `path`, if the node exists.
    async fn read(&self, path: &str) -> Result<Option<Vec<u8>>, CoordinationError>;

    /// Names of the nodes directly under `path`.
    async fn list_children(&self, path: &str) -> Result<Vec<String>, CoordinationError>;
}

/// Builds coordination clients from caller-supplied connection parameters.
///
/// The gateway's session directory owns one factory and calls it once per
/// `createSession`; the returned client is exclusively owned by that session.
#[async_trait]
pub trait ClientFactory: Send + Sync + 'static {
    async fn connect(
        &self,
        config: &ConnectionConfig,
    ) -> Result<Arc<dyn CoordinationClient>, CoordinationError>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn connection_config_defaults() {
        let cfg: ConnectionConfig = serde_json::from_str("{}").unwrap();
        assert_eq!(cfg.session_timeout_ms, 60_000);
        assert_eq!(cfg.connection_timeout_ms, 15_000);
        assert!(cfg.connect_string.is_empty());
    }

    #[test]
    fn connection_config_rejects_unknown_fields() {
        let res: Result<ConnectionConfig, _> = serde_json::from_str(r#"{"bogus": 1}"#);
        assert!(res.is_err(), "deny_unknown_fields should reject bogus keys");
    }
}
