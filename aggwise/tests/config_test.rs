//! Tests for config module

use aggwise::config::{expand_tilde, Config, StoreBackend};
use std::path::PathBuf;
use tempfile::tempdir;

#[test]
fn test_default_config() {
    let config = Config::default();

    assert_eq!(config.server.bind_addr, "127.0.0.1:3080");
    assert_eq!(config.store.backend, StoreBackend::Memory);
    assert_eq!(config.store.url, "http://localhost:9200");
    assert_eq!(config.store.timeout_ms, 30_000);
    assert!(config.store.username.is_none());
    assert_eq!(config.analytics.customer_buckets, 10);
    assert_eq!(config.analytics.min_daily_amount, 100.0);
    assert_eq!(config.observability.log_format, "pretty");
}

#[test]
fn test_expand_tilde() {
    let home = dirs::home_dir().unwrap();

    // ~/foo -> /home/user/foo
    let expanded = expand_tilde(&PathBuf::from("~/foo")).unwrap();
    assert_eq!(expanded, home.join("foo"));

    // Just ~ -> /home/user
    let expanded = expand_tilde(&PathBuf::from("~")).unwrap();
    assert_eq!(expanded, home);

    // relative/path stays as is
    let expanded = expand_tilde(&PathBuf::from("relative/path")).unwrap();
    assert_eq!(expanded, PathBuf::from("relative/path"));
}

#[test]
fn test_load_or_create_writes_defaults() {
    let temp = tempdir().unwrap();
    let path = temp.path().join("nested").join("config.toml");

    let config = Config::load_or_create(&path).unwrap();
    assert_eq!(config.server.bind_addr, "127.0.0.1:3080");
    assert!(path.exists());

    // Reload from the file just written
    let reloaded = Config::load_or_create(&path).unwrap();
    assert_eq!(reloaded.store.index, config.store.index);
    assert_eq!(reloaded.analytics.lookback_days, 30);
}

#[test]
fn test_save_and_load_roundtrip() {
    let temp = tempdir().unwrap();
    let path = temp.path().join("config.toml");

    let mut config = Config::default();
    config.store.backend = StoreBackend::Elasticsearch;
    config.store.username = Some("elastic".to_string());
    config.analytics.lookback_days = 7;
    config.observability.log_format = "json".to_string();
    config.save(&path).unwrap();

    let loaded = Config::load_or_create(&path).unwrap();
    assert_eq!(loaded.store.backend, StoreBackend::Elasticsearch);
    assert_eq!(loaded.store.username.as_deref(), Some("elastic"));
    assert!(loaded.store.password.is_none());
    assert_eq!(loaded.analytics.lookback_days, 7);
    assert_eq!(loaded.observability.log_format, "json");
}

#[test]
fn test_invalid_file_is_rejected() {
    let temp = tempdir().unwrap();
    let path = temp.path().join("config.toml");
    std::fs::write(&path, "[analytics]\ntop_customers = 0\n").unwrap();
    assert!(Config::load_or_create(&path).is_err());

    std::fs::write(&path, "[store]\nbackend = \"cassandra\"\n").unwrap();
    assert!(Config::load_or_create(&path).is_err());
}
