//! Tracing subscriber setup
//!
//! The SDK only emits `tracing` events. Hosts without their own subscriber
//! can call [`init_logging`].

use tracing_subscriber::EnvFilter;

use glean_core::config::LoggingConfig;

/// Installs a global fmt subscriber
///
/// `RUST_LOG` takes precedence over `config.level`. Returns `false` if a
/// global subscriber was already installed.
pub fn init_logging(config: &LoggingConfig) -> bool {
    let env_filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(config.level.as_str()));

    let result = if config.json {
        tracing_subscriber::fmt()
            .json()
            .with_env_filter(env_filter)
            .with_target(true)
            .try_init()
    } else {
        tracing_subscriber::fmt()
            .with_env_filter(env_filter)
            .with_target(true)
            .try_init()
    };

    result.is_ok()
}
