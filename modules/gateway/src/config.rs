use serde::{Deserialize, Serialize};

/// Configuration for the gateway module.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct GatewayConfig {
    /// Sessions idle longer than this are reaped with the normal teardown
    /// path. Remote callers can disconnect without closing their session.
    #[serde(default = "default_session_idle_timeout_secs")]
    pub session_idle_timeout_secs: u64,
    #[serde(default = "default_reap_interval_secs")]
    pub reap_interval_secs: u64,
}

impl Default for GatewayConfig {
    fn default() -> Self {
        Self {
            session_idle_timeout_secs: default_session_idle_timeout_secs(),
            reap_interval_secs: default_reap_interval_secs(),
        }
    }
}

fn default_session_idle_timeout_secs() -> u64 {
    300
}

fn default_reap_interval_secs() -> u64 {
    30
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_apply_to_empty_config() {
        let cfg: GatewayConfig = serde_json::from_str("{}").unwrap();
        assert_eq!(cfg.session_idle_timeout_secs, 300);
        assert_eq!(cfg.reap_interval_secs, 30);
    }
}
