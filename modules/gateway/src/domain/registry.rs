//! Heterogeneous resource registry with typed retrieval.
//!
//! One registry per session holds every stateful object the caller has
//! allocated (discovery registries, providers, future kinds) behind opaque
//! ids. Storage is capability-erased (`Arc<dyn Any>`), with the concrete
//! type checked at the retrieval boundary, so new resource kinds need no
//! change here. Each entry carries exactly one closer, and the registry
//! guarantees it runs exactly once: through an explicit `remove`, or through
//! `teardown_all`, never both.

use std::any::Any;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use dashmap::DashMap;
use futures::future::BoxFuture;
use uuid::Uuid;

use crate::domain::error::DomainError;

/// Type-erased release action for one registered resource.
///
/// Closers own their error handling: they log failures and never propagate
/// them, so one stale handle cannot abort a whole teardown sweep.
pub type CloseFn = Box<dyn FnOnce() -> BoxFuture<'static, ()> + Send + Sync>;

/// Wrap an async block as a [`CloseFn`].
pub fn closer<F, Fut>(f: F) -> CloseFn
where
    F: FnOnce() -> Fut + Send + Sync + 'static,
    Fut: Future<Output = ()> + Send + 'static,
{
    Box::new(move || Box::pin(f()))
}

/// Rejection handed back by [`ResourceRegistry::put`] once the registry has
/// been torn down. Carries the entry's cleanup so the caller can still run
/// it exactly once.
pub struct RegistryClosed(CloseFn);

impl std::fmt::Debug for RegistryClosed {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str("RegistryClosed")
    }
}

impl RegistryClosed {
    /// Run the rejected entry's cleanup.
    pub async fn close(self) {
        (self.0)().await;
    }
}

struct Slot {
    resource: Arc<dyn Any + Send + Sync>,
    closer: CloseFn,
}

/// Registry of `(resource, closer)` pairs scoped to one session.
///
/// Once [`teardown_all`](Self::teardown_all) has run the registry is closed
/// for good: later `put`s are rejected with the closer handed back, so no
/// entry can outlive the sweep with nothing left to release it.
#[derive(Default)]
pub struct ResourceRegistry {
    slots: DashMap<String, Slot>,
    closed: AtomicBool,
}

impl std::fmt::Debug for ResourceRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ResourceRegistry")
            .field("len", &self.slots.len())
            .finish()
    }
}

impl ResourceRegistry {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Store `resource` with its closer under a fresh id.
    ///
    /// Ids are random UUIDs: pairwise distinct for the registry's lifetime,
    /// never recycled after removal.
    ///
    /// # Errors
    /// [`RegistryClosed`] when the registry has been torn down; the entry is
    /// not stored and the closer comes back to the caller to run.
    pub fn put<T>(&self, resource: Arc<T>, close: CloseFn) -> Result<String, RegistryClosed>
    where
        T: Send + Sync + 'static,
    {
        if self.closed.load(Ordering::SeqCst) {
            return Err(RegistryClosed(close));
        }
        let id = Uuid::new_v4().to_string();
        self.slots.insert(id.clone(), Slot { resource, closer: close });
        // Insert-then-recheck: a put racing teardown either lands before the
        // sweep collects ids (and is swept there) or observes the flag here
        // and takes its own entry back out.
        if self.closed.load(Ordering::SeqCst) {
            return match self.slots.remove(&id) {
                Some((_, slot)) => Err(RegistryClosed(slot.closer)),
                // The sweep claimed the entry; its closer already ran.
                None => Err(RegistryClosed(closer(|| async {}))),
            };
        }
        Ok(id)
    }

    /// Typed retrieval.
    ///
    /// # Errors
    /// `NotFound` for an absent id; `TypeMismatch` when the stored resource
    /// is not a `T`.
    pub fn get<T>(&self, id: &str) -> Result<Arc<T>, DomainError>
    where
        T: Send + Sync + 'static,
    {
        let slot = self
            .slots
            .get(id)
            .ok_or_else(|| DomainError::not_found(id))?;
        Arc::clone(&slot.resource)
            .downcast::<T>()
            .map_err(|_| DomainError::type_mismatch(id, std::any::type_name::<T>()))
    }

    /// Atomically remove the entry, handing its closer to the caller.
    ///
    /// The caller invokes the closer exactly once, outside any registry
    /// lock, so a slow close cannot stall other registry operations.
    ///
    /// # Errors
    /// `NotFound` for an absent id.
    pub fn remove(&self, id: &str) -> Result<CloseFn, DomainError> {
        let (_, slot) = self
            .slots
            .remove(id)
            .ok_or_else(|| DomainError::not_found(id))?;
        Ok(slot.closer)
    }

    /// Close the registry and run every closer present.
    ///
    /// Best-effort sweep: each closer runs exactly once and individual
    /// failures (handled inside the closers) never stop the rest. The
    /// registry stays closed afterwards; see [`put`](Self::put).
    pub async fn teardown_all(&self) {
        self.closed.store(true, Ordering::SeqCst);
        let ids: Vec<String> = self.slots.iter().map(|e| e.key().clone()).collect();
        for id in ids {
            // A concurrent remove may have won the race; that entry's closer
            // already belongs to whoever removed it.
            if let Some((_, slot)) = self.slots.remove(&id) {
                (slot.closer)().await;
            }
        }
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.slots.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.slots.is_empty()
    }
}
