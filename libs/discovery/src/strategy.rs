//! Instance-selection strategies.

use std::sync::atomic::{AtomicUsize, Ordering};

use parking_lot::Mutex;
use rand::Rng;
use serde::{Deserialize, Serialize};

use crate::instance::ServiceInstance;

/// Strategy for picking one instance among those currently eligible.
///
/// Chosen at provider-creation time and immutable for that provider.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum SelectionStrategy {
    #[default]
    Random,
    RoundRobin,
    StickyRandom,
    StickyRoundRobin,
}

pub(crate) trait InstanceSelector: Send + Sync {
    /// Pick from `instances`; `None` iff the slice is empty.
    fn select<'a>(&self, instances: &'a [ServiceInstance]) -> Option<&'a ServiceInstance>;
}

pub(crate) fn selector_for(strategy: SelectionStrategy) -> Box<dyn InstanceSelector> {
    match strategy {
        SelectionStrategy::Random => Box::new(RandomSelector),
        SelectionStrategy::RoundRobin => Box::new(RoundRobinSelector::default()),
        SelectionStrategy::StickyRandom => Box::new(StickySelector::new(Box::new(RandomSelector))),
        SelectionStrategy::StickyRoundRobin => {
            Box::new(StickySelector::new(Box::new(RoundRobinSelector::default())))
        }
    }
}

struct RandomSelector;

impl InstanceSelector for RandomSelector {
    fn select<'a>(&self, instances: &'a [ServiceInstance]) -> Option<&'a ServiceInstance> {
        if instances.is_empty() {
            return None;
        }
        let idx = rand::rng().random_range(0..instances.len());
        instances.get(idx)
    }
}

/// Walks the (id-sorted) snapshot with a shared counter, so consecutive
/// selections alternate deterministically while the instance set is stable.
#[derive(Default)]
struct RoundRobinSelector {
    counter: AtomicUsize,
}

impl InstanceSelector for RoundRobinSelector {
    fn select<'a>(&self, instances: &'a [ServiceInstance]) -> Option<&'a ServiceInstance> {
        if instances.is_empty() {
            return None;
        }
        let idx = self.counter.fetch_add(1, Ordering::Relaxed) % instances.len();
        instances.get(idx)
    }
}

/// Pins the inner selector's first choice until that instance disappears
/// from the eligible set, then picks (and pins) again.
struct StickySelector {
    inner: Box<dyn InstanceSelector>,
    current: Mutex<Option<String>>,
}

impl StickySelector {
    fn new(inner: Box<dyn InstanceSelector>) -> Self {
        Self {
            inner,
            current: Mutex::new(None),
        }
    }
}

impl InstanceSelector for StickySelector {
    fn select<'a>(&self, instances: &'a [ServiceInstance]) -> Option<&'a ServiceInstance> {
        let mut current = self.current.lock();
        if let Some(id) = current.as_deref() {
            if let Some(inst) = instances.iter().find(|i| i.id == id) {
                return Some(inst);
            }
        }
        let picked = self.inner.select(instances)?;
        *current = Some(picked.id.clone());
        Some(picked)
    }
}
