//! Logging initialization.

use tracing_subscriber::EnvFilter;

use crate::config::LoggingConfig;

/// Install the global subscriber. Verbosity flags beat the configured
/// filter; `RUST_LOG` beats both when set.
pub fn init(config: &LoggingConfig, verbose: u8) {
    let fallback = match verbose {
        0 => config.filter.clone(),
        1 => "info,coordgate_gateway=debug,coordgate_discovery=debug".to_owned(),
        2 => "debug".to_owned(),
        _ => "trace".to_owned(),
    };
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(fallback));

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(true)
        .init();
}
