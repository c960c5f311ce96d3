//! Configuration system tests

use anyhow::Result;
use std::fs;
use stream_indexer::config::{IndexerConfig, StorageBackend};
use tempfile::TempDir;

/// Create a test configuration file
fn create_test_config_content() -> String {
    r#"
[server]
bind_address = "0.0.0.0:8080"
enable_cors = false
request_timeout_secs = 15
max_request_size_mb = 5

[rate_limit]
requests_per_minute = 120
burst = 20

[storage]
backend = "postgres"
url = "postgresql://indexer:indexer@db:5432/streams"
max_connections = 8

[realtime]
redis_url = "redis://localhost:6379"
channel_prefix = "streams:"

[chain]
node_url = "https://api.testnet.hiro.so"
treasury_contract = "ST1PQHQKV0RJXZFY1DGX8MNSNYVE3VGZJSRTPGZGM.treasury"
fallback_admins = ["ST_ADMIN1", "ST_ADMIN2"]
fallback_threshold = 2

[indexer]
journal_depth = 64

[monitoring]
metrics_port = 9191
log_level = "debug"
structured_logging = false
"#
    .to_string()
}

#[test]
fn test_config_from_file() -> Result<()> {
    let dir = TempDir::new()?;
    let path = dir.path().join("indexer.toml");
    fs::write(&path, create_test_config_content())?;

    let config = IndexerConfig::from_file(path.to_str().unwrap())?;

    assert_eq!(config.server.bind_address, "0.0.0.0:8080");
    assert!(!config.server.enable_cors);
    assert_eq!(config.rate_limit.requests_per_minute, 120);
    assert_eq!(config.storage.backend, StorageBackend::Postgres);
    assert_eq!(config.storage.max_connections, 8);
    assert_eq!(config.realtime.redis_url.as_deref(), Some("redis://localhost:6379"));
    assert_eq!(config.chain.fallback_admins.len(), 2);
    assert_eq!(config.indexer.journal_depth, 64);
    assert_eq!(config.monitoring.metrics_port, 9191);
    assert!(!config.monitoring.structured_logging);

    // Unlisted fields keep their defaults
    assert_eq!(config.chain.admins_function, "get-admins");
    assert_eq!(config.realtime.broadcast_capacity, 1024);
    // Secrets come from the environment, never the file
    assert!(config.auth.chainhook_token.is_none());
    Ok(())
}

#[test]
fn test_missing_file_is_an_error() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("absent.toml");
    assert!(IndexerConfig::from_file(path.to_str().unwrap()).is_err());
}

#[test]
fn test_invalid_values_are_rejected() {
    let cases = [
        "[rate_limit]\nrequests_per_minute = 10\nburst = 50\n",
        "[storage]\nbackend = \"postgres\"\nurl = \"\"\n",
        "[chain]\nnode_url = \"not a url\"\n",
        "[monitoring]\nmetrics_port = 80\n",
        "[storage]\nbackend = \"sqlite\"\n",
    ];
    for case in cases {
        assert!(IndexerConfig::from_toml(case).is_err(), "accepted: {}", case);
    }
}

#[test]
fn test_memory_backend_needs_no_url() -> Result<()> {
    let config = IndexerConfig::from_toml("[storage]\nbackend = \"memory\"\nurl = \"\"\n")?;
    assert_eq!(config.storage.backend, StorageBackend::Memory);
    Ok(())
}
