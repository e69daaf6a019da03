// Configuration module

use regex::Regex;
use serde::{Deserialize, Serialize};
use std::path::Path;

use crate::constants::{
    DEFAULT_DB_NUM, DEFAULT_GC_INTERVAL_SECS, DEFAULT_KEY_PREFIX, DEFAULT_MAX_ACTIVE,
    DEFAULT_MAX_IDLE, DEFAULT_WAIT_TIMEOUT_MS, MEMORY_ADAPTER, REDIS_ADAPTER,
};

pub mod circuit_breaker;

pub use circuit_breaker::CircuitBreakerSettings;

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct AppConfig {
    #[serde(default)]
    pub app: AppSection,
    #[serde(default)]
    pub logging: LoggingConfig,
    #[serde(default)]
    pub cache: CacheSettings,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AppSection {
    #[serde(default = "default_app_name")]
    pub name: String,
    #[serde(default = "default_run_mode")]
    pub run_mode: String,
}

impl Default for AppSection {
    fn default() -> Self {
        Self {
            name: default_app_name(),
            run_mode: default_run_mode(),
        }
    }
}

fn default_app_name() -> String {
    "bossbar".to_string()
}

fn default_run_mode() -> String {
    "dev".to_string()
}

/// Log output format
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Default)]
#[serde(rename_all = "lowercase")]
pub enum LogFormat {
    #[default]
    Text,
    Json,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct LoggingConfig {
    /// Level or filter directives, e.g. `info` or `bossbar=debug,warn`
    #[serde(default = "default_log_level")]
    pub level: String,
    #[serde(default)]
    pub format: LogFormat,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
            format: LogFormat::default(),
        }
    }
}

fn default_log_level() -> String {
    "info".to_string()
}

/// `cache` section: which adapter the facade starts and how
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct CacheSettings {
    /// Registered adapter name
    #[serde(default = "default_adapter")]
    pub adapter: String,
    /// Namespace prefix for every key
    #[serde(default = "default_redis_prefix")]
    pub redis_prefix: String,
    /// `host:port`, optionally `redis://` and `password@`
    #[serde(default)]
    pub redis_host: String,
    #[serde(default)]
    pub redis_password: Option<String>,
    #[serde(default = "default_redis_dbnum")]
    pub redis_dbnum: i64,
    #[serde(default = "default_redis_maxidle")]
    pub redis_maxidle: usize,
    /// Connections open at once; checkouts beyond this wait `redis_wait_timeout_ms`
    #[serde(default = "default_redis_maxactive")]
    pub redis_maxactive: usize,
    #[serde(default = "default_redis_wait_timeout_ms")]
    pub redis_wait_timeout_ms: u64,
    /// Sweep interval of the memory adapter (seconds)
    #[serde(default = "default_gc_interval_seconds")]
    pub gc_interval_seconds: u64,
    #[serde(default)]
    pub circuit_breaker: CircuitBreakerSettings,
}

impl Default for CacheSettings {
    fn default() -> Self {
        Self {
            adapter: default_adapter(),
            redis_prefix: default_redis_prefix(),
            redis_host: String::new(),
            redis_password: None,
            redis_dbnum: default_redis_dbnum(),
            redis_maxidle: default_redis_maxidle(),
            redis_maxactive: default_redis_maxactive(),
            redis_wait_timeout_ms: default_redis_wait_timeout_ms(),
            gc_interval_seconds: default_gc_interval_seconds(),
            circuit_breaker: CircuitBreakerSettings::default(),
        }
    }
}

fn default_adapter() -> String {
    REDIS_ADAPTER.to_string()
}

fn default_redis_prefix() -> String {
    DEFAULT_KEY_PREFIX.to_string()
}

fn default_redis_dbnum() -> i64 {
    DEFAULT_DB_NUM
}

fn default_redis_maxidle() -> usize {
    DEFAULT_MAX_IDLE
}

fn default_redis_maxactive() -> usize {
    DEFAULT_MAX_ACTIVE
}

fn default_redis_wait_timeout_ms() -> u64 {
    DEFAULT_WAIT_TIMEOUT_MS
}

fn default_gc_interval_seconds() -> u64 {
    DEFAULT_GC_INTERVAL_SECS
}

impl CacheSettings {
    /// JSON blob handed to the adapter's `start_and_gc`
    ///
    /// The redis adapter gets `key`, `conn`, `dbNum`, `maxIdle`, `maxActive`,
    /// `waitTimeoutMs` and, when set, `password`. The memory adapter gets `interval`. Other adapters get the
    /// redis keys, which is what a drop-in replacement expects.
    pub fn adapter_config(&self) -> String {
        let value = if self.adapter == MEMORY_ADAPTER {
            serde_json::json!({
                "interval": self.gc_interval_seconds.to_string(),
            })
        } else {
            let mut blob = serde_json::json!({
                "key": self.redis_prefix,
                "conn": self.redis_host,
                "dbNum": self.redis_dbnum.to_string(),
                "maxIdle": self.redis_maxidle.to_string(),
                "maxActive": self.redis_maxactive.to_string(),
                "waitTimeoutMs": self.redis_wait_timeout_ms.to_string(),
            });
            if let Some(password) = self.redis_password.as_deref().filter(|p| !p.is_empty()) {
                blob["password"] = serde_json::Value::String(password.to_string());
            }
            blob
        };
        value.to_string()
    }

    pub fn validate(&self) -> Result<(), String> {
        if self.adapter.is_empty() {
            return Err("cache.adapter cannot be empty".to_string());
        }
        if self.adapter == REDIS_ADAPTER && self.redis_host.is_empty() {
            return Err("cache.redis_host is required for the redis adapter".to_string());
        }
        if self.redis_prefix.is_empty() {
            return Err("cache.redis_prefix cannot be empty".to_string());
        }
        if self.redis_dbnum < 0 {
            return Err(format!(
                "cache.redis_dbnum must not be negative, got {}",
                self.redis_dbnum
            ));
        }
        if self.redis_maxidle == 0 {
            return Err("cache.redis_maxidle must be at least 1".to_string());
        }
        if self.gc_interval_seconds == 0 {
            return Err("cache.gc_interval_seconds must be at least 1".to_string());
        }
        self.circuit_breaker.validate()
    }
}

impl AppConfig {
    pub fn from_yaml_with_env(yaml: &str) -> Result<Self, String> {
        let substituted = substitute_env(yaml)?;
        serde_yaml::from_str(&substituted).map_err(|e| e.to_string())
    }

    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self, String> {
        let yaml = std::fs::read_to_string(path)
            .map_err(|e| format!("Failed to read config file: {}", e))?;
        Self::from_yaml_with_env(&yaml)
    }

    pub fn validate(&self) -> Result<(), String> {
        if self.app.name.is_empty() {
            return Err("app.name cannot be empty".to_string());
        }
        if self.logging.level.trim().is_empty() {
            return Err("logging.level cannot be empty".to_string());
        }
        self.cache.validate()
    }
}

/// Replace `${VAR_NAME}` with environment variable values.
///
/// Every referenced variable must be set; the first missing one is reported.
pub fn substitute_env(yaml: &str) -> Result<String, String> {
    let re = Regex::new(r"\$\{([A-Z_][A-Z0-9_]*)\}").map_err(|e| e.to_string())?;

    let mut missing = None;
    let substituted = re.replace_all(yaml, |caps: &regex::Captures| {
        let var_name = &caps[1];
        match std::env::var(var_name) {
            Ok(value) => value,
            Err(_) => {
                missing.get_or_insert_with(|| var_name.to_string());
                String::new()
            }
        }
    });

    match missing {
        Some(var_name) => Err(format!(
            "Environment variable '{}' is referenced but not set",
            var_name
        )),
        None => Ok(substituted.into_owned()),
    }
}
