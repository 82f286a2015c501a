//! Immutable service-instance values.

use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// How an advertised instance was registered.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum InstanceKind {
    /// Registered by a live process; expected to disappear with it.
    Dynamic,
    /// Registered out of band; survives process churn.
    Static,
    /// Never removed automatically.
    Permanent,
}

/// Snapshot of one advertised service endpoint.
///
/// A pure value: produced fresh on every query, never mutated after
/// construction, and carrying no ownership of anything.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ServiceInstance {
    pub id: String,
    pub name: String,
    /// Opaque application payload.
    #[serde(default)]
    pub payload: Vec<u8>,
    pub port: u16,
    pub kind: InstanceKind,
}

impl ServiceInstance {
    /// New dynamic instance with a fresh random id.
    #[must_use]
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            id: Uuid::new_v4().to_string(),
            name: name.into(),
            payload: Vec::new(),
            port: 0,
            kind: InstanceKind::Dynamic,
        }
    }

    #[must_use]
    pub fn with_id(mut self, id: impl Into<String>) -> Self {
        self.id = id.into();
        self
    }

    #[must_use]
    pub fn with_payload(mut self, payload: impl Into<Vec<u8>>) -> Self {
        self.payload = payload.into();
        self
    }

    #[must_use]
    pub fn with_port(mut self, port: u16) -> Self {
        self.port = port;
        self
    }

    #[must_use]
    pub fn with_kind(mut self, kind: InstanceKind) -> Self {
        self.kind = kind;
        self
    }
}
