//! Integration tests for configuration loader
//!
//! Tests the end-to-end behavior of loading configuration from files.

use std::io::Write;

use tempfile::NamedTempFile;
use vkrelay_domain::VkRelayError;
use vkrelay_infra::config;

fn write_temp(contents: &str, extension: &str) -> std::path::PathBuf {
    let mut temp_file = NamedTempFile::new().expect("Failed to create temp file");
    temp_file.write_all(contents.as_bytes()).expect("Failed to write to temp file");

    let path = temp_file.path().with_extension(extension);
    std::fs::copy(temp_file.path(), &path).expect("Failed to copy file");
    path
}

#[test]
fn test_load_config_from_json_file() {
    let json_content = r#"{
        "api": {
            "base_url": "https://api.example.test",
            "version": "5.199",
            "timeout_secs": 15
        },
        "rate_limit": {
            "enabled": true,
            "requests_per_period": 20,
            "period_ms": 1000
        },
        "long_poll": {
            "wait_secs": 60,
            "mode": 234,
            "use_https": false
        },
        "pool": { "calls_per_request": 10 },
        "logging": { "level": "debug", "json": true }
    }"#;

    let path = write_temp(json_content, "json");
    let result = config::load_from_file(Some(path.clone()));
    std::fs::remove_file(&path).ok();

    let config = result.expect("Failed to load config from JSON file");
    assert_eq!(config.api.base_url, "https://api.example.test");
    assert_eq!(config.api.version, "5.199");
    assert_eq!(config.api.timeout_secs, 15);
    assert_eq!(config.rate_limit.requests_per_period, 20);
    assert_eq!(config.long_poll.wait_secs, 60);
    assert_eq!(config.long_poll.mode, Some(234));
    assert!(!config.long_poll.use_https);
    assert_eq!(config.long_poll.version, 3);
    assert_eq!(config.pool.calls_per_request, 10);
    assert!(config.logging.json);
    assert_eq!(config.http.max_attempts, 1);
}

#[test]
fn test_load_config_from_toml_file() {
    let toml_content = r#"
[api]
version = "5.131"

[rate_limit]
enabled = false

[http]
max_attempts = 3
base_backoff_ms = 50
user_agent = "vkrelay-tests"
"#;

    let path = write_temp(toml_content, "toml");
    let result = config::load_from_file(Some(path.clone()));
    std::fs::remove_file(&path).ok();

    let config = result.expect("Failed to load config from TOML file");
    assert!(!config.rate_limit.enabled);
    assert_eq!(config.http.max_attempts, 3);
    assert_eq!(config.http.user_agent.as_deref(), Some("vkrelay-tests"));
    assert_eq!(config.pool.calls_per_request, 25);
}

#[test]
fn test_load_config_rejects_invalid_values() {
    let json_content = r#"{ "rate_limit": { "enabled": true, "requests_per_period": 0 } }"#;

    let path = write_temp(json_content, "json");
    let result = config::load_from_file(Some(path.clone()));
    std::fs::remove_file(&path).ok();

    assert!(matches!(result, Err(VkRelayError::Config(_))));
}

#[test]
fn test_load_config_with_malformed_json() {
    let path = write_temp(r#"{ "api": { "version": "#, "json");
    let result = config::load_from_file(Some(path.clone()));
    std::fs::remove_file(&path).ok();

    match result {
        Err(VkRelayError::Config(msg)) => assert!(msg.contains("Invalid JSON")),
        other => panic!("expected config error, got {other:?}"),
    }
}
