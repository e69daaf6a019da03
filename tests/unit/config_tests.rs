// Configuration module unit tests
// Extracted from src/config/mod.rs for improved readability

use bossbar::config::*;
use std::io::Write;
use tempfile::NamedTempFile;

#[test]
fn test_can_deserialize_full_yaml_config() {
    let yaml = r#"
app:
  name: "bossbar"
  run_mode: "prod"
logging:
  level: "debug"
  format: "json"
cache:
  adapter: "redis"
  redis_prefix: "bossbar"
  redis_host: "10.1.2.3:6379"
  redis_password: "pw"
  redis_dbnum: 1
  redis_maxidle: 16
  circuit_breaker:
    failure_threshold: 3
    timeout_seconds: 10
"#;
    let config = AppConfig::from_yaml_with_env(yaml).expect("Failed to parse config");
    assert_eq!(config.app.run_mode, "prod");
    assert_eq!(config.logging.level, "debug");
    assert_eq!(config.logging.format, LogFormat::Json);
    assert_eq!(config.cache.redis_host, "10.1.2.3:6379");
    assert_eq!(config.cache.redis_password.as_deref(), Some("pw"));
    assert_eq!(config.cache.redis_dbnum, 1);
    assert_eq!(config.cache.redis_maxidle, 16);
    assert_eq!(config.cache.circuit_breaker.failure_threshold, 3);
    assert_eq!(config.cache.circuit_breaker.timeout_seconds, 10);
    assert!(config.validate().is_ok());
}

#[test]
fn test_env_var_substitution() {
    std::env::set_var("BOSSBAR_TEST_REDIS_HOST", "cache.internal:6380");
    let yaml = r#"
cache:
  redis_host: "${BOSSBAR_TEST_REDIS_HOST}"
"#;
    let config = AppConfig::from_yaml_with_env(yaml).unwrap();
    assert_eq!(config.cache.redis_host, "cache.internal:6380");
}

#[test]
fn test_missing_env_var_fails() {
    let yaml = r#"
cache:
  redis_password: "${BOSSBAR_TEST_UNSET_PASSWORD}"
"#;
    let err = AppConfig::from_yaml_with_env(yaml).unwrap_err();
    assert!(err.contains("BOSSBAR_TEST_UNSET_PASSWORD"));
}

#[test]
fn test_invalid_yaml_fails() {
    assert!(AppConfig::from_yaml_with_env("cache: [unclosed").is_err());
}

#[test]
fn test_unknown_log_format_fails() {
    let yaml = "logging:\n  format: xml\n";
    assert!(AppConfig::from_yaml_with_env(yaml).is_err());
}

#[test]
fn test_from_file() {
    let mut file = NamedTempFile::new().expect("Failed to create temp config");
    writeln!(
        file,
        "cache:\n  adapter: memory\n  gc_interval_seconds: 5\n"
    )
    .unwrap();

    let config = AppConfig::from_file(file.path()).unwrap();
    assert_eq!(config.cache.adapter, "memory");
    assert_eq!(config.cache.gc_interval_seconds, 5);
    assert!(config.validate().is_ok());
}

#[test]
fn test_from_missing_file_fails() {
    let err = AppConfig::from_file("/nonexistent/bossbar.yaml").unwrap_err();
    assert!(err.contains("Failed to read config file"));
}

#[test]
fn test_validate_rejects_zero_max_idle() {
    let mut config = AppConfig::default();
    config.cache.redis_host = "h:1".to_string();
    config.cache.redis_maxidle = 0;
    assert!(config.validate().unwrap_err().contains("redis_maxidle"));
}

#[test]
fn test_validate_rejects_bad_breaker_settings() {
    let mut config = AppConfig::default();
    config.cache.redis_host = "h:1".to_string();
    config.cache.circuit_breaker.success_threshold = 0;
    assert!(config.validate().is_err());
}

#[test]
fn test_adapter_config_is_accepted_by_redis_parser() {
    let settings = CacheSettings {
        redis_prefix: "svc".to_string(),
        redis_host: "redis://user:pw@10.0.0.9:6379".to_string(),
        redis_dbnum: 3,
        ..Default::default()
    };
    let parsed = bossbar::cache::redis::RedisConfig::from_json(&settings.adapter_config()).unwrap();
    assert_eq!(parsed.key_prefix, "svc");
    assert_eq!(parsed.address, "10.0.0.9:6379");
    assert_eq!(parsed.password.as_deref(), Some("pw"));
    assert_eq!(parsed.db_num, 3);
}
