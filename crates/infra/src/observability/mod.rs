//! Logging bootstrap
//!
//! Library code only emits `tracing` events; applications (and tests) call
//! [`init_logging`] once to install a subscriber.

use tracing_subscriber::EnvFilter;
use vkrelay_domain::{LoggingConfig, Result, VkRelayError};

/// Install the global `tracing` subscriber.
///
/// `RUST_LOG` wins over `config.level` when set. Returns `Ok(false)` when a
/// global subscriber was already installed.
///
/// # Errors
/// `VkRelayError::Config` when the configured filter directive is invalid.
pub fn init_logging(config: &LoggingConfig) -> Result<bool> {
    let filter = build_filter(config)?;

    let installed = if config.json {
        tracing_subscriber::fmt()
            .json()
            .with_current_span(true)
            .with_env_filter(filter)
            .try_init()
    } else {
        tracing_subscriber::fmt().with_target(true).with_env_filter(filter).try_init()
    };

    match installed {
        Ok(()) => {
            tracing::debug!(level = %config.level, json = config.json, "logging initialized");
            Ok(true)
        }
        Err(_) => Ok(false),
    }
}

fn build_filter(config: &LoggingConfig) -> Result<EnvFilter> {
    if let Ok(filter) = EnvFilter::try_from_default_env() {
        return Ok(filter);
    }
    EnvFilter::try_new(&config.level).map_err(|e| {
        VkRelayError::Config(format!("Invalid log level directive '{}': {}", config.level, e))
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_invalid_directive_is_config_error() {
        if std::env::var("RUST_LOG").is_ok() {
            return;
        }
        let config = LoggingConfig { level: "vkrelay=loud".into(), json: false };
        assert!(matches!(build_filter(&config), Err(VkRelayError::Config(_))));
    }

    #[test]
    fn test_second_init_reports_already_installed() {
        let config = LoggingConfig::default();
        let _first = init_logging(&config).expect("first init");
        let second = init_logging(&config).expect("second init");
        assert!(!second);
    }
}
