//! Configuration structures
//!
//! Every section defaults sensibly, so a config file only has to name the
//! values it changes.

use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::constants::{
    DEFAULT_API_BASE_URL, DEFAULT_API_VERSION, DEFAULT_LONG_POLL_WAIT_SECS,
    DEFAULT_RATE_PERIOD_MS, DEFAULT_REQUESTS_PER_PERIOD, DEFAULT_TIMEOUT_SECS,
    DEFAULT_USER_LONG_POLL_VERSION, EXECUTE_CALL_LIMIT,
};
use crate::errors::{Result, VkRelayError};

/// Top-level client configuration
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ClientConfig {
    pub api: ApiConfig,
    pub rate_limit: RateLimitConfig,
    pub long_poll: LongPollConfig,
    pub pool: PoolConfig,
    pub http: HttpConfig,
    pub logging: LoggingConfig,
}

impl ClientConfig {
    /// Reject values the runtime cannot work with.
    ///
    /// # Errors
    /// Returns `VkRelayError::Config` naming the first offending field.
    pub fn validate(&self) -> Result<()> {
        if self.api.base_url.trim().is_empty() {
            return Err(VkRelayError::Config("api.base_url must not be empty".into()));
        }
        if self.api.version.trim().is_empty() {
            return Err(VkRelayError::Config("api.version must not be empty".into()));
        }
        if self.api.timeout_secs == 0 {
            return Err(VkRelayError::Config("api.timeout_secs must be greater than 0".into()));
        }
        if self.rate_limit.enabled {
            if self.rate_limit.requests_per_period == 0 {
                return Err(VkRelayError::Config(
                    "rate_limit.requests_per_period must be greater than 0".into(),
                ));
            }
            if self.rate_limit.period_ms == 0 {
                return Err(VkRelayError::Config(
                    "rate_limit.period_ms must be greater than 0".into(),
                ));
            }
        }
        if self.long_poll.wait_secs == 0 {
            return Err(VkRelayError::Config("long_poll.wait_secs must be greater than 0".into()));
        }
        if self.pool.calls_per_request == 0 || self.pool.calls_per_request > EXECUTE_CALL_LIMIT {
            return Err(VkRelayError::Config(format!(
                "pool.calls_per_request must be between 1 and {EXECUTE_CALL_LIMIT}"
            )));
        }
        Ok(())
    }
}

/// Method-call endpoint settings
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ApiConfig {
    /// Base URL; calls go to `{base_url}/method/{name}`
    pub base_url: String,
    /// Protocol version sent as `v` with every call
    pub version: String,
    /// Default per-call timeout in seconds
    pub timeout_secs: u64,
}

impl ApiConfig {
    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }
}

impl Default for ApiConfig {
    fn default() -> Self {
        Self {
            base_url: DEFAULT_API_BASE_URL.to_string(),
            version: DEFAULT_API_VERSION.to_string(),
            timeout_secs: DEFAULT_TIMEOUT_SECS,
        }
    }
}

/// Outbound call pacing
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct RateLimitConfig {
    pub enabled: bool,
    /// Burst size; the permit pool is refilled to this every period
    pub requests_per_period: usize,
    pub period_ms: u64,
}

impl RateLimitConfig {
    pub fn period(&self) -> Duration {
        Duration::from_millis(self.period_ms)
    }
}

impl Default for RateLimitConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            requests_per_period: DEFAULT_REQUESTS_PER_PERIOD,
            period_ms: DEFAULT_RATE_PERIOD_MS,
        }
    }
}

/// Long-poll protocol options
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct LongPollConfig {
    /// Server-side wait window in seconds
    pub wait_secs: u64,
    /// Answer-option bitmask (user long poll only)
    pub mode: Option<u32>,
    /// Long-poll protocol version
    pub version: u32,
    /// Whether user long-poll server hosts are reached over https
    pub use_https: bool,
}

impl Default for LongPollConfig {
    fn default() -> Self {
        Self {
            wait_secs: DEFAULT_LONG_POLL_WAIT_SECS,
            mode: None,
            version: DEFAULT_USER_LONG_POLL_VERSION,
            use_https: true,
        }
    }
}

/// Execute batching options
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct PoolConfig {
    pub calls_per_request: usize,
}

impl Default for PoolConfig {
    fn default() -> Self {
        Self { calls_per_request: EXECUTE_CALL_LIMIT }
    }
}

/// HTTP transport options
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct HttpConfig {
    /// Total attempts per request (initial try + transport-level retries)
    pub max_attempts: usize,
    pub base_backoff_ms: u64,
    pub user_agent: Option<String>,
}

impl Default for HttpConfig {
    fn default() -> Self {
        Self { max_attempts: 1, base_backoff_ms: 200, user_agent: None }
    }
}

/// Logging bootstrap options
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    /// Default `EnvFilter` directive, overridden by `RUST_LOG`
    pub level: String,
    /// Emit JSON lines instead of human-readable output
    pub json: bool,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self { level: "info".to_string(), json: false }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults_are_valid() {
        let config = ClientConfig::default();
        assert!(config.validate().is_ok());
        assert_eq!(config.rate_limit.requests_per_period, 3);
        assert_eq!(config.rate_limit.period(), Duration::from_secs(1));
        assert_eq!(config.pool.calls_per_request, 25);
        assert_eq!(config.long_poll.wait_secs, 25);
    }

    #[test]
    fn test_validate_rejects_zero_capacity() {
        let mut config = ClientConfig::default();
        config.rate_limit.requests_per_period = 0;
        assert!(matches!(config.validate(), Err(VkRelayError::Config(_))));

        // Disabled limiter ignores its own settings
        config.rate_limit.enabled = false;
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_validate_rejects_oversized_chunks() {
        let mut config = ClientConfig::default();
        config.pool.calls_per_request = 26;
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_partial_json_uses_defaults() {
        let config: ClientConfig =
            serde_json::from_str(r#"{"api": {"version": "5.199"}}"#).unwrap();
        assert_eq!(config.api.version, "5.199");
        assert_eq!(config.api.base_url, "https://api.vk.com");
        assert!(config.rate_limit.enabled);
    }
}
