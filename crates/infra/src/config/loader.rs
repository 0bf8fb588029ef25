//! Configuration loader
//!
//! ## Loading Strategy
//! 1. Environment variables, when `VKRELAY_API_VERSION` is set
//! 2. Otherwise a config file, searched for in the standard locations
//! 3. JSON and TOML are detected by extension
//!
//! Every loaded configuration is validated before it is returned.
//!
//! ## Environment Variables
//! - `VKRELAY_API_VERSION` (required): protocol version sent as `v`
//! - `VKRELAY_API_BASE_URL`: API base URL
//! - `VKRELAY_API_TIMEOUT_SECS`: default per-call timeout
//! - `VKRELAY_RATE_LIMIT_ENABLED`: whether calls are paced (true/false)
//! - `VKRELAY_RATE_LIMIT_REQUESTS`: permits per period
//! - `VKRELAY_RATE_LIMIT_PERIOD_MS`: refill period in milliseconds
//! - `VKRELAY_LONG_POLL_WAIT_SECS`: long-poll wait window
//! - `VKRELAY_POOL_CALLS_PER_REQUEST`: calls per `execute` request
//! - `VKRELAY_LOG_LEVEL`: default log filter directive
//! - `VKRELAY_LOG_JSON`: emit JSON log lines (true/false)
//!
//! ## File Locations
//! 1. `./vkrelay.{json,toml}`, then `./config.{json,toml}`
//! 2. The same names one and two directories up
//! 3. The same names next to the executable

use std::path::{Path, PathBuf};
use std::str::FromStr;

use vkrelay_domain::{ClientConfig, Result, VkRelayError};

const CONFIG_FILE_NAMES: [&str; 4] = ["vkrelay.json", "vkrelay.toml", "config.json", "config.toml"];

/// Load configuration, environment first, then file
///
/// # Errors
/// Returns `VkRelayError::Config` if neither source yields a valid
/// configuration.
pub fn load() -> Result<ClientConfig> {
    match load_from_env() {
        Ok(config) => {
            tracing::info!("Configuration loaded from environment variables");
            Ok(config)
        }
        Err(e) => {
            tracing::debug!(error = ?e, "Failed to load from environment, trying file");
            load_from_file(None)
        }
    }
}

/// Load configuration from `VKRELAY_*` environment variables
///
/// `VKRELAY_API_VERSION` must be set; every other variable falls back to
/// the section default.
///
/// # Errors
/// Returns `VkRelayError::Config` if the version is missing, a numeric
/// variable does not parse or the result fails validation.
pub fn load_from_env() -> Result<ClientConfig> {
    let mut config = ClientConfig::default();

    config.api.version = env_var("VKRELAY_API_VERSION")?;
    if let Some(base_url) = env_opt("VKRELAY_API_BASE_URL") {
        config.api.base_url = base_url;
    }
    if let Some(timeout) = env_parse::<u64>("VKRELAY_API_TIMEOUT_SECS")? {
        config.api.timeout_secs = timeout;
    }

    config.rate_limit.enabled = env_bool("VKRELAY_RATE_LIMIT_ENABLED", config.rate_limit.enabled);
    if let Some(requests) = env_parse::<usize>("VKRELAY_RATE_LIMIT_REQUESTS")? {
        config.rate_limit.requests_per_period = requests;
    }
    if let Some(period) = env_parse::<u64>("VKRELAY_RATE_LIMIT_PERIOD_MS")? {
        config.rate_limit.period_ms = period;
    }

    if let Some(wait) = env_parse::<u64>("VKRELAY_LONG_POLL_WAIT_SECS")? {
        config.long_poll.wait_secs = wait;
    }
    if let Some(calls) = env_parse::<usize>("VKRELAY_POOL_CALLS_PER_REQUEST")? {
        config.pool.calls_per_request = calls;
    }

    if let Some(level) = env_opt("VKRELAY_LOG_LEVEL") {
        config.logging.level = level;
    }
    config.logging.json = env_bool("VKRELAY_LOG_JSON", config.logging.json);

    config.validate()?;
    Ok(config)
}

/// Load configuration from a file
///
/// If `path` is `None`, searches the standard locations via
/// [`find_config_path`].
///
/// # Errors
/// Returns `VkRelayError::Config` if the file is missing, unreadable,
/// malformed or fails validation.
pub fn load_from_file(path: Option<PathBuf>) -> Result<ClientConfig> {
    let config_path = match path {
        Some(p) => {
            if !p.exists() {
                return Err(VkRelayError::Config(format!(
                    "Config file not found: {}",
                    p.display()
                )));
            }
            p
        }
        None => find_config_path().ok_or_else(|| {
            VkRelayError::Config("No config file found in any of the standard locations".to_string())
        })?,
    };

    tracing::info!(path = %config_path.display(), "Loading configuration from file");

    let contents = std::fs::read_to_string(&config_path)
        .map_err(|e| VkRelayError::Config(format!("Failed to read config file: {}", e)))?;

    let config = parse_config(&contents, &config_path)?;
    config.validate()?;
    Ok(config)
}

/// Format is detected by file extension, defaulting to JSON.
fn parse_config(contents: &str, path: &Path) -> Result<ClientConfig> {
    let extension = path.extension().and_then(|e| e.to_str()).unwrap_or("json");

    match extension {
        "toml" => toml::from_str(contents)
            .map_err(|e| VkRelayError::Config(format!("Invalid TOML format: {}", e))),
        "json" => serde_json::from_str(contents)
            .map_err(|e| VkRelayError::Config(format!("Invalid JSON format: {}", e))),
        _ => Err(VkRelayError::Config(format!("Unsupported config format: {}", extension))),
    }
}

/// Probe the standard locations for a config file
///
/// # Returns
/// The first config file found, or `None` if no file exists.
pub fn find_config_path() -> Option<PathBuf> {
    let mut roots = Vec::new();

    if let Ok(cwd) = std::env::current_dir() {
        roots.push(cwd.clone());
        roots.push(cwd.join(".."));
        roots.push(cwd.join("../.."));
    }

    if let Ok(exe_path) = std::env::current_exe() {
        if let Some(exe_dir) = exe_path.parent() {
            roots.push(exe_dir.to_path_buf());
        }
    }

    roots
        .iter()
        .flat_map(|root| CONFIG_FILE_NAMES.iter().map(move |name| root.join(name)))
        .find(|path| path.exists())
}

fn env_var(key: &str) -> Result<String> {
    std::env::var(key).map_err(|_| {
        VkRelayError::Config(format!("Missing required environment variable: {}", key))
    })
}

fn env_opt(key: &str) -> Option<String> {
    std::env::var(key).ok().filter(|value| !value.trim().is_empty())
}

/// Parse an optional numeric variable; unset means `None`, garbage is an error.
fn env_parse<T>(key: &str) -> Result<Option<T>>
where
    T: FromStr,
    T::Err: std::fmt::Display,
{
    env_opt(key)
        .map(|raw| {
            raw.trim()
                .parse::<T>()
                .map_err(|e| VkRelayError::Config(format!("Invalid value for {}: {}", key, e)))
        })
        .transpose()
}

/// Accepts `1`/`0`, `true`/`false`, `yes`/`no`, `on`/`off` (case-insensitive)
fn env_bool(key: &str, default: bool) -> bool {
    std::env::var(key)
        .ok()
        .map(|s| matches!(s.to_ascii_lowercase().as_str(), "1" | "true" | "yes" | "on"))
        .unwrap_or(default)
}
