//! Tests for config module

use qlens::config::{expand_tilde, Config};
use qlens::search::MissingTimeFieldPolicy;
use std::path::PathBuf;
use tempfile::tempdir;

#[test]
fn test_default_config() {
    let config = Config::default();

    assert_eq!(config.backend.base_url, "http://127.0.0.1:5601");
    assert_eq!(config.backend.request_timeout_ms, 30_000);
    assert!(config.backend.data_source_id.is_none());
    assert_eq!(config.endpoints.ppl, "/api/pplql/search");
    assert_eq!(config.endpoints.sql, "/api/sqlql/search");
    assert_eq!(config.endpoints.sql_async, "/api/sqlasyncql/jobs");
    assert_eq!(config.endpoints.query_assist, "/api/ql/query_assist/generate");
    assert_eq!(config.observability.log_format, "pretty");
}

#[test]
fn test_expand_tilde() {
    let home = dirs::home_dir().unwrap();

    let expanded = expand_tilde(&PathBuf::from("~/qlens.toml")).unwrap();
    assert_eq!(expanded, home.join("qlens.toml"));

    let expanded = expand_tilde(&PathBuf::from("~")).unwrap();
    assert_eq!(expanded, home);

    let expanded = expand_tilde(&PathBuf::from("relative/path")).unwrap();
    assert_eq!(expanded, PathBuf::from("relative/path"));
}

#[test]
fn test_load_or_create_writes_defaults() {
    let temp = tempdir().unwrap();
    let config_path = temp.path().join("nested").join("config.toml");

    let config = Config::load_or_create(&config_path).unwrap();
    assert!(config_path.exists());
    assert_eq!(config.search.histogram_bar_target, 50);

    // second load reads the file it just wrote
    let reloaded = Config::load_or_create(&config_path).unwrap();
    assert_eq!(reloaded.endpoints, config.endpoints);
}

#[test]
fn test_save_and_load() {
    let temp = tempdir().unwrap();
    let config_path = temp.path().join("config.toml");

    let mut config = Config::default();
    config.backend.base_url = "https://dashboards.internal:5601".to_string();
    config.backend.data_source_id = Some("ds-1".to_string());
    config.search.date_format = "%Y-%m-%d %H:%M:%S%.3f".to_string();
    config.search.missing_time_field = MissingTimeFieldPolicy::Reject;
    config.save(&config_path).unwrap();

    let loaded = Config::load_from(&config_path).unwrap();
    assert_eq!(loaded.backend.base_url, "https://dashboards.internal:5601");
    assert_eq!(loaded.backend.data_source_id.as_deref(), Some("ds-1"));
    assert_eq!(loaded.search.date_format, "%Y-%m-%d %H:%M:%S%.3f");
    assert_eq!(loaded.search.missing_time_field, MissingTimeFieldPolicy::Reject);
}

#[test]
fn test_load_missing_file_uses_defaults() {
    let temp = tempdir().unwrap();
    let config = Config::load_from(&temp.path().join("absent.toml")).unwrap();
    assert_eq!(config.endpoints.ppl, "/api/pplql/search");
}

#[test]
fn test_invalid_values_rejected() {
    let temp = tempdir().unwrap();

    let bad_url = temp.path().join("bad_url.toml");
    std::fs::write(&bad_url, "[backend]\nbase_url = \"not a url\"\n").unwrap();
    assert!(Config::load_from(&bad_url).is_err());

    let zero_bars = temp.path().join("zero_bars.toml");
    std::fs::write(&zero_bars, "[search]\nhistogram_bar_target = 0\n").unwrap();
    assert!(Config::load_from(&zero_bars).is_err());

    let bad_policy = temp.path().join("bad_policy.toml");
    std::fs::write(&bad_policy, "[search]\nmissing_time_field = \"guess\"\n").unwrap();
    assert!(Config::load_from(&bad_policy).is_err());

    let bad_format = temp.path().join("bad_format.toml");
    std::fs::write(&bad_format, "[search]\ndate_format = \"%Y-%Q\"\n").unwrap();
    let err = Config::load_from(&bad_format).unwrap_err();
    assert!(err.to_string().contains("date_format"));
}
