//! Tests for config functionality.

use crate::config::{Config, ENV_LOCKING, ENV_TIMEOUT_SECS};
use crate::locks::StrategyKind;
use std::collections::HashMap;
use std::time::Duration;

fn env(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
    let map: HashMap<String, String> = pairs
        .iter()
        .map(|(k, v)| (k.to_string(), v.to_string()))
        .collect();
    move |key| map.get(key).cloned()
}

#[test]
fn test_default_config() {
    let config = Config::default();

    assert_eq!(config.locking, StrategyKind::File);
    assert_eq!(config.default_timeout(), Duration::from_secs(60));
    assert_eq!(config.poll_interval_ms, 10);
    assert_eq!(config.max_poll_interval_ms, 200);
    assert!(config.lock_root.is_none());
}

#[test]
fn test_parse_minimal_yaml() {
    let config = Config::from_yaml("").unwrap();

    // Should use all defaults
    assert_eq!(config.locking, StrategyKind::File);
    assert_eq!(config.default_timeout_secs, 60.0);
}

#[test]
fn test_parse_full_yaml() {
    let yaml = r#"
locking: null
default_timeout_secs: 2.5
poll_interval_ms: 5
max_poll_interval_ms: 50
lock_root: /opt/stack/.locks
"#;
    let config = Config::from_yaml(yaml).unwrap();

    assert_eq!(config.locking, StrategyKind::Null);
    assert_eq!(config.default_timeout(), Duration::from_millis(2500));
    let poll = config.poll_settings();
    assert_eq!(poll.interval, Duration::from_millis(5));
    assert_eq!(poll.max_interval, Duration::from_millis(50));
    assert_eq!(
        config.lock_root.as_deref(),
        Some(std::path::Path::new("/opt/stack/.locks"))
    );
}

#[test]
fn test_parse_yaml_with_unknown_fields() {
    let yaml = r#"
locking: file
build_jobs: 16
mirrors:
  local: /srv/mirror
"#;
    let config = Config::from_yaml(yaml).unwrap();

    assert_eq!(config.locking, StrategyKind::File);
    assert_eq!(config.poll_interval_ms, 10);
}

#[test]
fn test_unknown_strategy_is_rejected() {
    let err = Config::from_yaml("locking: lockd").unwrap_err();
    assert!(err.to_string().contains("failed to parse config YAML"));
}

#[test]
fn test_validate_negative_timeout() {
    let err = Config::from_yaml("default_timeout_secs: -1").unwrap_err();
    assert!(err.to_string().contains("default_timeout_secs"));
}

#[test]
fn test_validate_zero_poll_interval() {
    let err = Config::from_yaml("poll_interval_ms: 0").unwrap_err();
    assert!(err.to_string().contains("poll_interval_ms must be greater than 0"));
}

#[test]
fn test_validate_backoff_cap_below_interval() {
    let yaml = r#"
poll_interval_ms: 100
max_poll_interval_ms: 10
"#;
    let err = Config::from_yaml(yaml).unwrap_err();
    assert!(err.to_string().contains("max_poll_interval_ms"));
}

#[test]
fn test_zero_timeout_is_valid() {
    let config = Config::from_yaml("default_timeout_secs: 0").unwrap();
    assert_eq!(config.default_timeout(), Duration::ZERO);
}

#[test]
fn test_huge_timeout_saturates() {
    let config = Config::from_yaml("default_timeout_secs: 1e300").unwrap();
    assert_eq!(config.default_timeout(), Duration::MAX);
}

#[test]
fn test_env_selects_null_strategy() {
    let config = Config::default()
        .with_env_overrides(env(&[(ENV_LOCKING, "false")]))
        .unwrap();
    assert_eq!(config.locking, StrategyKind::Null);
}

#[test]
fn test_env_overrides_timeout() {
    let config = Config::default()
        .with_env_overrides(env(&[(ENV_TIMEOUT_SECS, " 3 ")]))
        .unwrap();
    assert_eq!(config.default_timeout(), Duration::from_secs(3));
}

#[test]
fn test_env_rejects_garbage() {
    let err = Config::default()
        .with_env_overrides(env(&[(ENV_LOCKING, "maybe")]))
        .unwrap_err();
    assert!(err.to_string().contains(ENV_LOCKING));

    let err = Config::default()
        .with_env_overrides(env(&[(ENV_TIMEOUT_SECS, "soon")]))
        .unwrap_err();
    assert!(err.to_string().contains(ENV_TIMEOUT_SECS));
}

#[test]
fn test_env_absent_keeps_file_values() {
    let config = Config::from_yaml("locking: null")
        .unwrap()
        .with_env_overrides(env(&[]))
        .unwrap();
    assert_eq!(config.locking, StrategyKind::Null);
}

#[test]
fn test_to_yaml_round_trips_selection() {
    let mut config = Config::default();
    config.locking = StrategyKind::Null;

    let parsed = Config::from_yaml(&config.to_yaml().unwrap()).unwrap();
    assert_eq!(parsed.locking, StrategyKind::Null);
    assert_eq!(parsed.default_timeout_secs, config.default_timeout_secs);
}

#[test]
fn test_config_load_from_file() {
    use std::io::Write;
    use tempfile::NamedTempFile;

    let mut file = NamedTempFile::new().unwrap();
    writeln!(file, "locking: null").unwrap();
    writeln!(file, "default_timeout_secs: 1").unwrap();

    let config = Config::load(file.path()).unwrap();
    assert_eq!(config.locking, StrategyKind::Null);
    assert_eq!(config.default_timeout(), Duration::from_secs(1));
}

#[test]
fn test_config_load_missing_file() {
    let err = Config::load("/nonexistent/path/buildlock.yaml").unwrap_err();
    assert!(err.to_string().contains("failed to read config file"));
}

#[test]
fn test_boolean_locking_switch() {
    let config = Config::from_yaml("locking: false").unwrap();
    assert_eq!(config.locking, StrategyKind::Null);

    let config = Config::from_yaml("locking: true").unwrap();
    assert_eq!(config.locking, StrategyKind::File);

    let config = Config::from_yaml("locking: \"null\"").unwrap();
    assert_eq!(config.locking, StrategyKind::Null);
}
