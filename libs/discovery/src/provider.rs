//! Providers: a selection-policy view over one service name.

use std::sync::Arc;

use parking_lot::Mutex;

use crate::discovery::{DiscoveryError, LifecycleState, ServiceDiscovery};
use crate::down::{DownInstancePolicy, DownInstanceTracker};
use crate::instance::ServiceInstance;
use crate::strategy::{selector_for, InstanceSelector, SelectionStrategy};

/// Configures and builds one [`ServiceProvider`].
pub struct ProviderBuilder {
    discovery: Arc<ServiceDiscovery>,
    service_name: String,
    strategy: SelectionStrategy,
    policy: DownInstancePolicy,
}

impl ProviderBuilder {
    pub(crate) fn new(discovery: Arc<ServiceDiscovery>) -> Self {
        Self {
            discovery,
            service_name: String::new(),
            strategy: SelectionStrategy::Random,
            policy: DownInstancePolicy::default(),
        }
    }

    #[must_use]
    pub fn service_name(mut self, name: impl Into<String>) -> Self {
        self.service_name = name.into();
        self
    }

    #[must_use]
    pub fn strategy(mut self, strategy: SelectionStrategy) -> Self {
        self.strategy = strategy;
        self
    }

    #[must_use]
    pub fn down_instance_policy(mut self, policy: DownInstancePolicy) -> Self {
        self.policy = policy;
        self
    }

    #[must_use]
    pub fn build(self) -> ServiceProvider {
        ServiceProvider {
            discovery: self.discovery,
            service_name: self.service_name,
            selector: selector_for(self.strategy),
            tracker: DownInstanceTracker::new(self.policy),
            state: Mutex::new(LifecycleState::Created),
        }
    }
}

/// A started view over one service name, applying a selection strategy and
/// a health policy to the backing registry's instance set.
///
/// The provider borrows the registry's view but owns none of it: closing the
/// provider never touches the registry, and vice versa.
pub struct ServiceProvider {
    discovery: Arc<ServiceDiscovery>,
    service_name: String,
    selector: Box<dyn InstanceSelector>,
    tracker: DownInstanceTracker,
    state: Mutex<LifecycleState>,
}

impl std::fmt::Debug for ServiceProvider {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ServiceProvider")
            .field("service_name", &self.service_name)
            .field("base_path", &self.discovery.base_path())
            .finish_non_exhaustive()
    }
}

impl ServiceProvider {
    #[must_use]
    pub fn service_name(&self) -> &str {
        &self.service_name
    }

    fn ensure_started(&self) -> Result<(), DiscoveryError> {
        if *self.state.lock() == LifecycleState::Started {
            Ok(())
        } else {
            Err(DiscoveryError::NotStarted("provider"))
        }
    }

    /// Start the provider.
    ///
    /// # Errors
    /// `NotStarted` when called on anything but a freshly built provider.
    pub fn start(&self) -> Result<(), DiscoveryError> {
        let mut state = self.state.lock();
        if *state != LifecycleState::Created {
            return Err(DiscoveryError::NotStarted("provider"));
        }
        *state = LifecycleState::Started;
        Ok(())
    }

    /// Stop the provider. Closing an already-closed provider is a no-op.
    pub fn close(&self) {
        *self.state.lock() = LifecycleState::Closed;
    }

    /// Select one live instance under this provider's strategy and current
    /// health view.
    ///
    /// # Errors
    /// `NoInstancesAvailable` when every known instance is absent or down;
    /// registry/coordination failures pass through.
    pub async fn select_instance(&self) -> Result<ServiceInstance, DiscoveryError> {
        self.ensure_started()?;
        let all = self.discovery.instances_of(&self.service_name).await?;
        let eligible: Vec<ServiceInstance> = all
            .into_iter()
            .filter(|inst| !self.tracker.is_down(&inst.id))
            .collect();
        self.selector
            .select(&eligible)
            .cloned()
            .ok_or_else(|| DiscoveryError::NoInstancesAvailable(self.service_name.clone()))
    }

    /// Unfiltered snapshot of every instance currently known, health and
    /// selection policy not applied.
    ///
    /// # Errors
    /// Registry/coordination failures pass through.
    pub async fn all_instances(&self) -> Result<Vec<ServiceInstance>, DiscoveryError> {
        self.ensure_started()?;
        self.discovery.instances_of(&self.service_name).await
    }

    /// Record one error observation against `instance` for the health policy.
    pub fn report_error(&self, instance: &ServiceInstance) {
        self.tracker.note_error(&instance.id);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::client::CoordinationClient;
    use crate::memory::MemoryCluster;
    use std::time::Duration;

    async fn started_discovery() -> Arc<ServiceDiscovery> {
        let cluster = MemoryCluster::new();
        let client: Arc<dyn CoordinationClient> = Arc::new(cluster.client());
        client.start().await.unwrap();
        let discovery = Arc::new(ServiceDiscovery::new(client, "/services", None).unwrap());
        discovery.start().await.unwrap();
        discovery
    }

    #[tokio::test]
    async fn selection_requires_started_provider() {
        let discovery = started_discovery().await;
        let provider = discovery.provider_builder().service_name("foo").build();

        assert!(matches!(
            provider.select_instance().await.unwrap_err(),
            DiscoveryError::NotStarted(_)
        ));

        provider.start().unwrap();
        assert!(provider.start().is_err(), "double start must fail");

        provider.close();
        assert!(matches!(
            provider.all_instances().await.unwrap_err(),
            DiscoveryError::NotStarted(_)
        ));
    }

    #[tokio::test]
    async fn empty_service_yields_no_instances_available() {
        let discovery = started_discovery().await;
        let provider = discovery.provider_builder().service_name("foo").build();
        provider.start().unwrap();

        match provider.select_instance().await.unwrap_err() {
            DiscoveryError::NoInstancesAvailable(name) => assert_eq!(name, "foo"),
            other => panic!("expected NoInstancesAvailable, got {other}"),
        }
        assert!(provider.all_instances().await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn round_robin_alternates_between_registered_instances() {
        let discovery = started_discovery().await;
        let i1 = ServiceInstance::new("foo").with_id("i1").with_port(8080);
        let i2 = ServiceInstance::new("foo").with_id("i2").with_port(8081);
        discovery.register(&i1).await.unwrap();
        discovery.register(&i2).await.unwrap();

        let provider = discovery
            .provider_builder()
            .service_name("foo")
            .strategy(SelectionStrategy::RoundRobin)
            .build();
        provider.start().unwrap();

        let mut picks = Vec::new();
        for _ in 0..4 {
            picks.push(provider.select_instance().await.unwrap().id);
        }
        assert_eq!(picks, ["i1", "i2", "i1", "i2"]);
    }

    #[tokio::test]
    async fn down_instances_are_excluded_from_selection_but_not_snapshots() {
        let discovery = started_discovery().await;
        let i1 = ServiceInstance::new("foo").with_id("i1");
        let i2 = ServiceInstance::new("foo").with_id("i2");
        discovery.register(&i1).await.unwrap();
        discovery.register(&i2).await.unwrap();

        let provider = discovery
            .provider_builder()
            .service_name("foo")
            .strategy(SelectionStrategy::RoundRobin)
            .down_instance_policy(DownInstancePolicy::new(Duration::from_secs(30), 2))
            .build();
        provider.start().unwrap();

        provider.report_error(&i1);
        provider.report_error(&i1);

        for _ in 0..3 {
            assert_eq!(
                provider.select_instance().await.unwrap().id,
                "i2",
                "down instance must be excluded"
            );
        }
        assert_eq!(
            provider.all_instances().await.unwrap().len(),
            2,
            "all_instances reports the unfiltered view"
        );
    }

    #[tokio::test]
    async fn all_instances_down_yields_no_instances_available() {
        let discovery = started_discovery().await;
        let i1 = ServiceInstance::new("foo").with_id("i1");
        discovery.register(&i1).await.unwrap();

        let provider = discovery
            .provider_builder()
            .service_name("foo")
            .down_instance_policy(DownInstancePolicy::new(Duration::from_secs(30), 1))
            .build();
        provider.start().unwrap();

        provider.report_error(&i1);
        assert!(matches!(
            provider.select_instance().await.unwrap_err(),
            DiscoveryError::NoInstancesAvailable(_)
        ));
    }
}
