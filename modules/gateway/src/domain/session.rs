//! Session entries and the session directory.
//!
//! A session is the unit of lifetime for everything a caller allocates
//! after connecting: one exclusively owned coordination client plus one
//! resource registry. Teardown ordering is strict: the registry (and with
//! it every discovery registry and provider) is swept before the client is
//! closed, so no closer ever observes a dead client.

use std::sync::Arc;
use std::time::{Duration, Instant};

use coordgate_discovery::{ClientFactory, ConnectionConfig, CoordinationClient};
use dashmap::DashMap;
use parking_lot::Mutex;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};
use uuid::Uuid;

use crate::domain::error::DomainError;
use crate::domain::registry::ResourceRegistry;

/// One active coordination session and everything allocated under it.
pub struct SessionEntry {
    handle: String,
    client: Arc<dyn CoordinationClient>,
    registry: ResourceRegistry,
    last_used: Mutex<Instant>,
}

impl std::fmt::Debug for SessionEntry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SessionEntry")
            .field("handle", &self.handle)
            .field("registry", &self.registry)
            .finish_non_exhaustive()
    }
}

impl SessionEntry {
    fn new(handle: String, client: Arc<dyn CoordinationClient>) -> Self {
        Self {
            handle,
            client,
            registry: ResourceRegistry::new(),
            last_used: Mutex::new(Instant::now()),
        }
    }

    #[must_use]
    pub fn handle(&self) -> &str {
        &self.handle
    }

    #[must_use]
    pub fn client(&self) -> Arc<dyn CoordinationClient> {
        Arc::clone(&self.client)
    }

    #[must_use]
    pub fn registry(&self) -> &ResourceRegistry {
        &self.registry
    }

    fn touch(&self) {
        *self.last_used.lock() = Instant::now();
    }

    fn idle_for(&self) -> Duration {
        self.last_used.lock().elapsed()
    }

    /// Registry first, client second. Always.
    async fn close(&self) {
        self.registry.teardown_all().await;
        if let Err(e) = self.client.close().await {
            warn!(session = %self.handle, error = %e, "failed to close coordination client");
        }
    }
}

/// Directory of caller-visible session handles.
///
/// The hot paths (`must_get`, inserts, removals) ride on the concurrent map;
/// the blocking work of connecting and starting a client happens before the
/// directory is touched at all.
pub struct SessionDirectory {
    sessions: DashMap<String, Arc<SessionEntry>>,
    factory: Arc<dyn ClientFactory>,
}

impl std::fmt::Debug for SessionDirectory {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SessionDirectory")
            .field("sessions", &self.sessions.len())
            .finish_non_exhaustive()
    }
}

impl SessionDirectory {
    #[must_use]
    pub fn new(factory: Arc<dyn ClientFactory>) -> Self {
        Self {
            sessions: DashMap::new(),
            factory,
        }
    }

    /// Connect and start a coordination client, then store it under a fresh
    /// session handle.
    ///
    /// # Errors
    /// `Connection` (or `Cancelled`) when the client cannot be started; a
    /// partially connected client is closed before the error surfaces.
    pub async fn create_session(
        &self,
        config: &ConnectionConfig,
    ) -> Result<String, DomainError> {
        let client = self.factory.connect(config).await?;
        if let Err(e) = client.start().await {
            if let Err(close_err) = client.close().await {
                debug!(error = %close_err, "closing unstarted client failed");
            }
            return Err(e.into());
        }

        let handle = Uuid::new_v4().to_string();
        let entry = Arc::new(SessionEntry::new(handle.clone(), client));
        self.sessions.insert(handle.clone(), entry);
        info!(session = %handle, "session created");
        Ok(handle)
    }

    /// Resolve a session handle, refreshing its idle stamp.
    ///
    /// # Errors
    /// `NotFound` for unknown or already-closed handles; always a caller
    /// error, never tolerated silently.
    pub fn must_get(&self, handle: &str) -> Result<Arc<SessionEntry>, DomainError> {
        let entry = self
            .sessions
            .get(handle)
            .ok_or_else(|| DomainError::not_found(handle))?;
        entry.touch();
        Ok(Arc::clone(&entry))
    }

    /// Remove the session and tear down everything it owns.
    ///
    /// # Errors
    /// `NotFound` when the handle is unknown or already closed; the
    /// directory state is untouched in that case.
    pub async fn close_session(&self, handle: &str) -> Result<(), DomainError> {
        let (_, entry) = self
            .sessions
            .remove(handle)
            .ok_or_else(|| DomainError::not_found(handle))?;
        entry.close().await;
        info!(session = %handle, "session closed");
        Ok(())
    }

    /// Close every session idle for longer than `max_idle`. Returns the
    /// number of sessions reaped.
    pub async fn reap_idle(&self, max_idle: Duration) -> usize {
        let expired: Vec<String> = self
            .sessions
            .iter()
            .filter(|e| e.value().idle_for() > max_idle)
            .map(|e| e.key().clone())
            .collect();

        let mut reaped = 0;
        for handle in expired {
            // Re-check under removal; the session may have been touched or
            // closed since the scan.
            if let Some((_, entry)) = self
                .sessions
                .remove_if(&handle, |_, entry| entry.idle_for() > max_idle)
            {
                warn!(session = %handle, "reaping idle session");
                entry.close().await;
                reaped += 1;
            }
        }
        reaped
    }

    /// Periodic idle sweep until `cancel` fires.
    pub fn spawn_reaper(
        self: Arc<Self>,
        interval: Duration,
        max_idle: Duration,
        cancel: CancellationToken,
    ) -> tokio::task::JoinHandle<()> {
        let directory = self;
        tokio::spawn(async move {
            let mut ticker = tokio::time::interval(interval);
            ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);
            loop {
                tokio::select! {
                    () = cancel.cancelled() => break,
                    _ = ticker.tick() => {
                        let reaped = directory.reap_idle(max_idle).await;
                        if reaped > 0 {
                            info!(reaped, "idle session sweep");
                        }
                    }
                }
            }
        })
    }

    /// Close every remaining session (server stop phase).
    pub async fn shutdown(&self) {
        let handles: Vec<String> = self.sessions.iter().map(|e| e.key().clone()).collect();
        for handle in handles {
            if let Some((_, entry)) = self.sessions.remove(&handle) {
                entry.close().await;
            }
        }
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.sessions.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.sessions.is_empty()
    }
}
