//! Discovery registry: the set of instances advertised under one base path.

use std::sync::Arc;

use parking_lot::Mutex;
use thiserror::Error;
use tracing::warn;

use crate::client::{CoordinationClient, CoordinationError};
use crate::instance::ServiceInstance;
use crate::provider::ProviderBuilder;

/// Failures in the discovery layer (registries and providers).
#[derive(Error, Debug)]
pub enum DiscoveryError {
    #[error("invalid base path: {0}")]
    InvalidBasePath(String),

    /// Operation issued outside the `Started` state.
    #[error("{0} is not started")]
    NotStarted(&'static str),

    #[error("no instances available for service: {0}")]
    NoInstancesAvailable(String),

    #[error("instance record could not be encoded: {0}")]
    Encode(#[from] serde_json::Error),

    #[error(transparent)]
    Coordination(#[from] CoordinationError),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum LifecycleState {
    Created,
    Started,
    Closed,
}

/// A started registry of service instances rooted at `base_path`.
///
/// Instances live at `{base_path}/{service_name}/{instance_id}` as ephemeral
/// JSON nodes owned by whichever client registered them. The registry can
/// advertise the current process itself (`self_instance`) for its own
/// lifetime, and hands out [`ProviderBuilder`]s for selection-policy views
/// over one service name.
pub struct ServiceDiscovery {
    client: Arc<dyn CoordinationClient>,
    base_path: String,
    self_instance: Option<ServiceInstance>,
    state: Mutex<LifecycleState>,
}

impl std::fmt::Debug for ServiceDiscovery {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ServiceDiscovery")
            .field("base_path", &self.base_path)
            .field("self_instance", &self.self_instance)
            .finish_non_exhaustive()
    }
}

impl ServiceDiscovery {
    /// Build a registry bound to `client` and rooted at `base_path`.
    ///
    /// # Errors
    /// `InvalidBasePath` unless `base_path` is absolute and not `/`.
    pub fn new(
        client: Arc<dyn CoordinationClient>,
        base_path: impl Into<String>,
        self_instance: Option<ServiceInstance>,
    ) -> Result<Self, DiscoveryError> {
        let base_path = base_path.into();
        if !base_path.starts_with('/') || base_path.len() < 2 || base_path.ends_with('/') {
            return Err(DiscoveryError::InvalidBasePath(base_path));
        }
        Ok(Self {
            client,
            base_path,
            self_instance,
            state: Mutex::new(LifecycleState::Created),
        })
    }

    #[must_use]
    pub fn base_path(&self) -> &str {
        &self.base_path
    }

    fn transition(
        &self,
        from: LifecycleState,
        to: LifecycleState,
        what: &'static str,
    ) -> Result<(), DiscoveryError> {
        let mut state = self.state.lock();
        if *state != from {
            return Err(DiscoveryError::NotStarted(what));
        }
        *state = to;
        Ok(())
    }

    fn ensure_started(&self) -> Result<(), DiscoveryError> {
        if *self.state.lock() == LifecycleState::Started {
            Ok(())
        } else {
            Err(DiscoveryError::NotStarted("discovery registry"))
        }
    }

    /// Start the registry, advertising `self_instance` if one was supplied.
    ///
    /// # Errors
    /// `NotStarted` when called twice; coordination failures pass through.
    pub async fn start(&self) -> Result<(), DiscoveryError> {
        self.transition(
            LifecycleState::Created,
            LifecycleState::Started,
            "discovery registry",
        )?;
        if let Some(inst) = &self.self_instance {
            if let Err(e) = self.register(inst).await {
                // Failed start leaves the registry closed, not half-open.
                *self.state.lock() = LifecycleState::Closed;
                return Err(e);
            }
        }
        Ok(())
    }

    /// Stop the registry, withdrawing the self-advertised instance.
    ///
    /// # Errors
    /// `NotStarted` if the registry never started or was already closed.
    pub async fn close(&self) -> Result<(), DiscoveryError> {
        self.transition(
            LifecycleState::Started,
            LifecycleState::Closed,
            "discovery registry",
        )?;
        if let Some(inst) = &self.self_instance {
            if let Err(e) = self.client.delete(&self.instance_path(inst)).await {
                warn!(error = %e, id = %inst.id, "failed to withdraw self instance");
            }
        }
        Ok(())
    }

    /// Advertise `instance` under this registry's base path.
    ///
    /// # Errors
    /// Coordination or encoding failures pass through.
    pub async fn register(&self, instance: &ServiceInstance) -> Result<(), DiscoveryError> {
        self.ensure_started()?;
        let data = serde_json::to_vec(instance)?;
        self.client
            .put_ephemeral(&self.instance_path(instance), data)
            .await?;
        Ok(())
    }

    /// Withdraw a previously advertised instance.
    ///
    /// # Errors
    /// Coordination failures pass through.
    pub async fn unregister(&self, instance: &ServiceInstance) -> Result<(), DiscoveryError> {
        self.ensure_started()?;
        self.client.delete(&self.instance_path(instance)).await?;
        Ok(())
    }

    /// Decoded, id-sorted snapshot of every instance of `service_name`.
    ///
    /// Records that fail to decode are skipped with a warning; a registry
    /// with one corrupt node must stay usable.
    ///
    /// # Errors
    /// Coordination failures pass through; `NotStarted` outside `Started`.
    pub async fn instances_of(
        &self,
        service_name: &str,
    ) -> Result<Vec<ServiceInstance>, DiscoveryError> {
        self.ensure_started()?;
        let dir = format!("{}/{}", self.base_path, service_name);
        let mut out = Vec::new();
        for child in self.client.list_children(&dir).await? {
            let path = format!("{dir}/{child}");
            let Some(data) = self.client.read(&path).await? else {
                continue; // deleted between list and read
            };
            match serde_json::from_slice::<ServiceInstance>(&data) {
                Ok(inst) => out.push(inst),
                Err(e) => warn!(%path, error = %e, "skipping undecodable instance record"),
            }
        }
        out.sort_unstable_by(|a, b| a.id.cmp(&b.id));
        Ok(out)
    }

    /// Builder for a provider over one service name. The provider keeps its
    /// own reference to this registry.
    #[must_use]
    pub fn provider_builder(self: Arc<Self>) -> ProviderBuilder {
        ProviderBuilder::new(self)
    }

    fn instance_path(&self, instance: &ServiceInstance) -> String {
        format!("{}/{}/{}", self.base_path, instance.name, instance.id)
    }
}
