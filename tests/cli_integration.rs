//! CLI integration tests.
//!
//! These tests verify the CLI argument parsing and configuration loading.

use std::ffi::OsString;
use std::io::Write;
use std::path::PathBuf;
use tempfile::NamedTempFile;

use chat_bridge::cli::{parse_args_from, Args};
use chat_bridge::config::Config;
use chat_bridge::session::LoggedOutPolicy;

fn args(args: &[&str]) -> Vec<OsString> {
    std::iter::once("chat-bridge")
        .chain(args.iter().copied())
        .map(OsString::from)
        .collect()
}

// ============================================================================
// CLI Argument Tests
// ============================================================================

#[test]
fn test_cli_defaults() {
    let result = parse_args_from(args(&[])).unwrap();

    assert_eq!(result.host.to_string(), "127.0.0.1");
    assert_eq!(result.port, 5000);
    assert!(result.config.is_none());
    assert!(result.db.is_none());
    assert!(result.log_level.is_none());
}

#[test]
fn test_cli_full_options() {
    let result = parse_args_from(args(&[
        "-H",
        "0.0.0.0",
        "-p",
        "8080",
        "-d",
        "/var/lib/chat-bridge/bridge.db",
        "-l",
        "debug",
    ]))
    .unwrap();

    assert_eq!(result.host.to_string(), "0.0.0.0");
    assert_eq!(result.port, 8080);
    assert_eq!(
        result.db,
        Some(PathBuf::from("/var/lib/chat-bridge/bridge.db"))
    );
    assert_eq!(result.log_level, Some("debug".to_string()));
}

#[test]
fn test_cli_config_file() {
    let result = parse_args_from(args(&["-c", "/etc/chat-bridge.json"])).unwrap();

    assert!(result.config.is_some());
    assert_eq!(
        result.config.unwrap().to_str().unwrap(),
        "/etc/chat-bridge.json"
    );
}

#[test]
fn test_cli_invalid_port() {
    let result = parse_args_from(args(&["-p", "not-a-number"]));
    assert!(result.is_err());
}

#[test]
fn test_cli_invalid_host() {
    let result = parse_args_from(args(&["-H", "not-an-ip"]));
    assert!(result.is_err());
}

// ============================================================================
// Configuration Loading Tests
// ============================================================================

#[test]
fn test_config_from_json_file() {
    let json = r#"{
        "server": {
            "host": "192.168.1.100",
            "port": 9000
        },
        "store": {
            "path": "/data/bridge.db"
        },
        "reconnect": {
            "max_attempts": 8,
            "base_delay_ms": 500,
            "max_delay_ms": 10000,
            "logged_out": "manual"
        },
        "logging": {
            "level": "debug"
        }
    }"#;

    let mut file = NamedTempFile::new().unwrap();
    file.write_all(json.as_bytes()).unwrap();

    let config = Config::from_file(file.path()).unwrap();

    assert_eq!(config.server.host, "192.168.1.100");
    assert_eq!(config.server.port, 9000);
    assert_eq!(config.store.path, PathBuf::from("/data/bridge.db"));
    assert_eq!(config.reconnect.max_attempts, 8);
    assert_eq!(config.logged_out_policy().unwrap(), LoggedOutPolicy::Manual);
    assert_eq!(config.logging.level, "debug");

    let policy = config.reconnect_policy();
    assert_eq!(policy.base_delay.as_millis(), 500);
    assert_eq!(policy.max_delay.as_millis(), 10000);
}

#[test]
fn test_config_priority_cli_over_file() {
    // Create config file
    let json = r#"{
        "server": {
            "host": "10.0.0.1",
            "port": 5000
        }
    }"#;

    let mut file = NamedTempFile::new().unwrap();
    file.write_all(json.as_bytes()).unwrap();

    // CLI args should override file
    let args = Args {
        host: "192.168.1.1".parse().unwrap(),
        port: 8080,
        config: Some(file.path().to_path_buf()),
        ..Args::default()
    };

    let config = Config::load(&args).unwrap();

    // CLI values should win
    assert_eq!(config.server.host, "192.168.1.1");
    assert_eq!(config.server.port, 8080);
}

#[test]
fn test_config_db_override() {
    let args = Args {
        db: Some(PathBuf::from("/tmp/override.db")),
        ..Args::default()
    };

    let config = Config::load(&args).unwrap();
    assert_eq!(config.store.path, PathBuf::from("/tmp/override.db"));
}

#[test]
fn test_config_to_server_config() {
    let args = Args {
        host: "0.0.0.0".parse().unwrap(),
        port: 8080,
        ..Args::default()
    };

    let config = Config::load(&args).unwrap();
    let server_config = config.to_server_config().unwrap();

    assert_eq!(server_config.host, "0.0.0.0");
    assert_eq!(server_config.port, 8080);
}

// ============================================================================
// Configuration Serialization Tests
// ============================================================================

#[test]
fn test_config_roundtrip() {
    let original = Config::default();
    let json = serde_json::to_string(&original).unwrap();
    let loaded: Config = serde_json::from_str(&json).unwrap();

    assert_eq!(original.server.host, loaded.server.host);
    assert_eq!(original.server.port, loaded.server.port);
    assert_eq!(original.reconnect.logged_out, loaded.reconnect.logged_out);
}

#[test]
fn test_config_partial_deserialization() {
    // Only specify some fields, others should use defaults
    let json = r#"{"server": {"port": 9999}}"#;
    let config: Config = serde_json::from_str(json).unwrap();

    assert_eq!(config.server.port, 9999);
    assert_eq!(config.server.host, "127.0.0.1"); // Default
    assert_eq!(config.reconnect.max_attempts, 5); // Default
}
