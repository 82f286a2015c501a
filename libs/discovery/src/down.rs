//! Health policy: temporary exclusion of instances with repeated errors.

use std::time::{Duration, Instant};

use dashmap::DashMap;

/// An instance is considered down once it accumulates `error_threshold`
/// reported errors within a trailing `timeout` window. The window opens at
/// the first observation and ages the whole count out when it expires.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DownInstancePolicy {
    pub timeout: Duration,
    pub error_threshold: u32,
}

impl Default for DownInstancePolicy {
    fn default() -> Self {
        Self {
            timeout: Duration::from_secs(30),
            error_threshold: 2,
        }
    }
}

impl DownInstancePolicy {
    #[must_use]
    pub fn new(timeout: Duration, error_threshold: u32) -> Self {
        Self {
            timeout,
            error_threshold,
        }
    }
}

#[derive(Debug, Clone, Copy)]
struct ErrorWindow {
    count: u32,
    opened: Instant,
}

/// Per-instance error bookkeeping for one provider.
#[derive(Debug)]
pub(crate) struct DownInstanceTracker {
    policy: DownInstancePolicy,
    windows: DashMap<String, ErrorWindow>,
}

impl DownInstanceTracker {
    pub(crate) fn new(policy: DownInstancePolicy) -> Self {
        Self {
            policy,
            windows: DashMap::new(),
        }
    }

    pub(crate) fn note_error(&self, instance_id: &str) {
        let now = Instant::now();
        let mut entry = self
            .windows
            .entry(instance_id.to_owned())
            .or_insert(ErrorWindow { count: 0, opened: now });
        if now.duration_since(entry.opened) > self.policy.timeout {
            entry.count = 0;
            entry.opened = now;
        }
        entry.count += 1;
    }

    pub(crate) fn is_down(&self, instance_id: &str) -> bool {
        let Some(entry) = self.windows.get(instance_id) else {
            return false;
        };
        if entry.opened.elapsed() > self.policy.timeout {
            drop(entry);
            self.windows.remove(instance_id);
            return false;
        }
        entry.count >= self.policy.error_threshold
    }
}
