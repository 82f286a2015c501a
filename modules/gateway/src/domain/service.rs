//! Gateway service: the method surface exposed to remote callers.
//!
//! Every method resolves handles through the session directory and the
//! session's resource registry, does the work against the discovery layer,
//! and maps failures into [`DomainError`]. Creation methods register the new
//! object together with a closer before the handle is returned, so a handle
//! the caller holds always has teardown wired up.

use std::sync::Arc;
use std::time::Duration;

use coordgate_discovery::{
    ConnectionConfig, DownInstancePolicy, SelectionStrategy, ServiceDiscovery, ServiceInstance,
    ServiceProvider,
};
use tracing::{info, warn};

use crate::domain::error::DomainError;
use crate::domain::registry::closer;
use crate::domain::session::SessionDirectory;

/// The gateway's remote method surface.
#[derive(Debug, Clone)]
pub struct GatewayService {
    sessions: Arc<SessionDirectory>,
}

impl GatewayService {
    #[must_use]
    pub fn new(sessions: Arc<SessionDirectory>) -> Self {
        Self { sessions }
    }

    #[must_use]
    pub fn sessions(&self) -> &Arc<SessionDirectory> {
        &self.sessions
    }

    /// Build an instance record without advertising it. Pure helper: callers
    /// pass the result back to [`GatewayService::start_discovery`] or
    /// register it out of band.
    #[must_use]
    pub fn make_instance(name: &str, payload: Vec<u8>, port: u16) -> ServiceInstance {
        ServiceInstance::new(name)
            .with_payload(payload)
            .with_port(port)
    }

    /// Open a new session.
    ///
    /// # Errors
    /// `Connection` when the coordination client cannot be started.
    pub async fn create_session(&self, config: &ConnectionConfig) -> Result<String, DomainError> {
        self.sessions.create_session(config).await
    }

    /// Close a session and everything allocated under it.
    ///
    /// # Errors
    /// `NotFound` for an unknown or already-closed handle.
    pub async fn close_session(&self, session: &str) -> Result<(), DomainError> {
        self.sessions.close_session(session).await
    }

    /// Start a discovery registry rooted at `base_path`, optionally
    /// advertising `self_instance`, and project it into the session.
    ///
    /// # Errors
    /// `NotFound` for an unknown session; `Discovery` when the base path is
    /// invalid or the registry fails to start.
    pub async fn start_discovery(
        &self,
        session: &str,
        base_path: &str,
        self_instance: Option<ServiceInstance>,
    ) -> Result<String, DomainError> {
        let entry = self.sessions.must_get(session)?;
        let discovery = Arc::new(ServiceDiscovery::new(
            entry.client(),
            base_path,
            self_instance,
        )?);
        discovery.start().await?;

        let to_close = Arc::clone(&discovery);
        let put = entry.registry().put(
            discovery,
            closer(move || async move {
                if let Err(e) = to_close.close().await {
                    warn!(error = %e, "failed to close discovery registry");
                }
            }),
        );
        let id = match put {
            Ok(id) => id,
            Err(rejected) => {
                // The session was closed underneath us; release the fresh
                // registry and report the session gone.
                rejected.close().await;
                return Err(DomainError::not_found(session));
            }
        };
        info!(session, resource = %id, base_path, "discovery registry started");
        Ok(id)
    }

    /// Start a provider over `service_name` backed by the discovery registry
    /// behind `discovery_id`, and project it into the session.
    ///
    /// The provider's lifetime is independent of the registry's projection:
    /// closing one never closes the other.
    ///
    /// # Errors
    /// `NotFound`/`TypeMismatch` for bad handles; `Discovery` when the
    /// provider cannot start.
    pub async fn start_provider(
        &self,
        session: &str,
        discovery_id: &str,
        service_name: &str,
        strategy: SelectionStrategy,
        down_timeout: Duration,
        down_error_threshold: u32,
    ) -> Result<String, DomainError> {
        let entry = self.sessions.must_get(session)?;
        let discovery = entry.registry().get::<ServiceDiscovery>(discovery_id)?;

        let provider = Arc::new(
            discovery
                .provider_builder()
                .service_name(service_name)
                .strategy(strategy)
                .down_instance_policy(DownInstancePolicy::new(
                    down_timeout,
                    down_error_threshold,
                ))
                .build(),
        );
        provider.start()?;

        let to_close = Arc::clone(&provider);
        let put = entry.registry().put(
            provider,
            closer(move || async move {
                to_close.close();
            }),
        );
        let id = match put {
            Ok(id) => id,
            Err(rejected) => {
                rejected.close().await;
                return Err(DomainError::not_found(session));
            }
        };
        info!(session, resource = %id, service = service_name, "provider started");
        Ok(id)
    }

    /// Select one live instance through the provider behind `provider_id`.
    ///
    /// # Errors
    /// `NotFound`/`TypeMismatch` for bad handles; `NoInstancesAvailable`
    /// when selection comes up empty.
    pub async fn get_instance(
        &self,
        session: &str,
        provider_id: &str,
    ) -> Result<ServiceInstance, DomainError> {
        let entry = self.sessions.must_get(session)?;
        let provider = entry.registry().get::<ServiceProvider>(provider_id)?;
        Ok(provider.select_instance().await?)
    }

    /// Unfiltered snapshot of every instance the provider can see.
    ///
    /// # Errors
    /// `NotFound`/`TypeMismatch` for bad handles.
    pub async fn get_all_instances(
        &self,
        session: &str,
        provider_id: &str,
    ) -> Result<Vec<ServiceInstance>, DomainError> {
        let entry = self.sessions.must_get(session)?;
        let provider = entry.registry().get::<ServiceProvider>(provider_id)?;
        Ok(provider.all_instances().await?)
    }

    /// Record an error observation against `instance_id` for the provider's
    /// health policy. An id no longer present in the registry is silently
    /// ignored; the instance may have legitimately withdrawn.
    ///
    /// # Errors
    /// `NotFound`/`TypeMismatch` for bad session/provider handles.
    pub async fn note_error(
        &self,
        session: &str,
        provider_id: &str,
        instance_id: &str,
    ) -> Result<(), DomainError> {
        let entry = self.sessions.must_get(session)?;
        let provider = entry.registry().get::<ServiceProvider>(provider_id)?;
        for instance in provider.all_instances().await? {
            if instance.id == instance_id {
                provider.report_error(&instance);
                return Ok(());
            }
        }
        Ok(())
    }

    /// Close one projected resource ahead of its session.
    ///
    /// # Errors
    /// `NotFound` for an unknown session or resource handle.
    pub async fn close_resource(&self, session: &str, resource_id: &str) -> Result<(), DomainError> {
        let entry = self.sessions.must_get(session)?;
        let close = entry.registry().remove(resource_id)?;
        close().await;
        info!(session, resource = %resource_id, "resource closed");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use coordgate_discovery::{MemoryCluster, MemoryClusterFactory};

    fn service() -> (MemoryCluster, GatewayService) {
        let cluster = MemoryCluster::new();
        let factory = Arc::new(MemoryClusterFactory::new(cluster.clone()));
        let sessions = Arc::new(SessionDirectory::new(factory));
        (cluster, GatewayService::new(sessions))
    }

    async fn session_with_discovery(svc: &GatewayService) -> (String, String) {
        let session = svc
            .create_session(&ConnectionConfig::default())
            .await
            .unwrap();
        let discovery_id = svc
            .start_discovery(&session, "/services", None)
            .await
            .unwrap();
        (session, discovery_id)
    }

    #[test]
    fn make_instance_fills_defaults() {
        let inst = GatewayService::make_instance("web", b"meta".to_vec(), 8080);
        assert_eq!(inst.name, "web");
        assert_eq!(inst.port, 8080);
        assert_eq!(inst.payload, b"meta");
        assert!(!inst.id.is_empty());
    }

    #[tokio::test]
    async fn discovery_requires_a_live_session_and_valid_path() {
        let (_cluster, svc) = service();

        assert!(matches!(
            svc.start_discovery("ghost", "/services", None)
                .await
                .unwrap_err(),
            DomainError::NotFound(_)
        ));

        let session = svc
            .create_session(&ConnectionConfig::default())
            .await
            .unwrap();
        assert!(matches!(
            svc.start_discovery(&session, "relative", None)
                .await
                .unwrap_err(),
            DomainError::Discovery(_)
        ));
    }

    #[tokio::test]
    async fn provider_rejects_wrong_handle_kinds() {
        let (_cluster, svc) = service();
        let (session, discovery_id) = session_with_discovery(&svc).await;

        let provider_id = svc
            .start_provider(
                &session,
                &discovery_id,
                "foo",
                SelectionStrategy::Random,
                Duration::from_secs(30),
                2,
            )
            .await
            .unwrap();

        // A provider handle is not a discovery handle and vice versa.
        assert!(matches!(
            svc.start_provider(
                &session,
                &provider_id,
                "foo",
                SelectionStrategy::Random,
                Duration::from_secs(30),
                2,
            )
            .await
            .unwrap_err(),
            DomainError::TypeMismatch { .. }
        ));
        assert!(matches!(
            svc.get_instance(&session, &discovery_id).await.unwrap_err(),
            DomainError::TypeMismatch { .. }
        ));
    }

    #[tokio::test]
    async fn selection_and_snapshots_see_registered_instances() {
        let (_cluster, svc) = service();
        let (session, discovery_id) = session_with_discovery(&svc).await;

        // A second session advertises itself into the same tree.
        let advertiser = svc
            .create_session(&ConnectionConfig::default())
            .await
            .unwrap();
        let me = ServiceInstance::new("foo").with_id("i1").with_port(8080);
        svc.start_discovery(&advertiser, "/services", Some(me))
            .await
            .unwrap();

        let provider_id = svc
            .start_provider(
                &session,
                &discovery_id,
                "foo",
                SelectionStrategy::RoundRobin,
                Duration::from_secs(30),
                2,
            )
            .await
            .unwrap();

        let all = svc.get_all_instances(&session, &provider_id).await.unwrap();
        assert_eq!(all.len(), 1);
        assert_eq!(all[0].id, "i1");

        let picked = svc.get_instance(&session, &provider_id).await.unwrap();
        assert_eq!(picked.id, "i1");
        assert_eq!(picked.port, 8080);
    }

    #[tokio::test]
    async fn note_error_downs_instances_and_ignores_ghosts() {
        let (_cluster, svc) = service();
        let (session, discovery_id) = session_with_discovery(&svc).await;

        let advertiser = svc
            .create_session(&ConnectionConfig::default())
            .await
            .unwrap();
        let me = ServiceInstance::new("foo").with_id("i1");
        svc.start_discovery(&advertiser, "/services", Some(me))
            .await
            .unwrap();

        let provider_id = svc
            .start_provider(
                &session,
                &discovery_id,
                "foo",
                SelectionStrategy::Random,
                Duration::from_secs(30),
                2,
            )
            .await
            .unwrap();

        // Ghost id: no-op, not an error.
        svc.note_error(&session, &provider_id, "vanished")
            .await
            .unwrap();
        assert!(svc.get_instance(&session, &provider_id).await.is_ok());

        svc.note_error(&session, &provider_id, "i1").await.unwrap();
        svc.note_error(&session, &provider_id, "i1").await.unwrap();
        assert!(matches!(
            svc.get_instance(&session, &provider_id).await.unwrap_err(),
            DomainError::NoInstancesAvailable(name) if name == "foo"
        ));
    }

    #[tokio::test]
    async fn close_resource_withdraws_a_self_advertised_instance() {
        let (cluster, svc) = service();
        let session = svc
            .create_session(&ConnectionConfig::default())
            .await
            .unwrap();

        let me = ServiceInstance::new("foo").with_id("i1");
        let discovery_id = svc
            .start_discovery(&session, "/services", Some(me))
            .await
            .unwrap();
        assert_eq!(cluster.node_count(), 1);

        svc.close_resource(&session, &discovery_id).await.unwrap();
        assert_eq!(cluster.node_count(), 0, "closing the registry withdraws the instance");

        assert!(matches!(
            svc.close_resource(&session, &discovery_id)
                .await
                .unwrap_err(),
            DomainError::NotFound(_)
        ));
    }

    #[tokio::test]
    async fn provider_outlives_a_closed_registry_projection() {
        let (_cluster, svc) = service();
        let (session, discovery_id) = session_with_discovery(&svc).await;
        let provider_id = svc
            .start_provider(
                &session,
                &discovery_id,
                "foo",
                SelectionStrategy::Random,
                Duration::from_secs(30),
                2,
            )
            .await
            .unwrap();

        svc.close_resource(&session, &discovery_id).await.unwrap();

        // The provider handle stays valid but its backing registry is closed,
        // so operations surface a discovery failure rather than panicking.
        assert!(matches!(
            svc.get_all_instances(&session, &provider_id)
                .await
                .unwrap_err(),
            DomainError::Discovery(_)
        ));
    }
}
