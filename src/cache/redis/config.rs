// Redis adapter configuration module

use serde_json::{Map, Value};
use std::time::Duration;

use crate::cache::CacheError;
use crate::constants::{
    DEFAULT_DB_NUM, DEFAULT_IDLE_TIMEOUT_SECS, DEFAULT_KEY_PREFIX, DEFAULT_MAX_ACTIVE,
    DEFAULT_MAX_IDLE, DEFAULT_WAIT_TIMEOUT_MS, REDIS_SCHEME,
};

/// Settings parsed from the JSON blob passed to `start_and_gc`
///
/// Recognized keys: `key`, `conn`, `dbNum`, `password`, `maxIdle`,
/// `maxActive`, `waitTimeoutMs`.
/// Values may be JSON strings or numbers.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RedisConfig {
    /// Namespace prefix applied to every key
    pub key_prefix: String,

    /// Store address as `host:port`
    pub address: String,

    /// Database index selected on every new connection
    pub db_num: i64,

    /// Password sent with AUTH; `None` skips authentication
    pub password: Option<String>,

    /// Idle connections kept between calls; the rest are closed by the reaper
    pub max_idle: usize,

    /// Pool capacity: connections open at once, never below `max_idle`
    pub max_active: usize,

    /// How long a checkout waits for a free connection
    pub wait_timeout: Duration,

    /// Idle connections older than this are discarded on checkout
    pub idle_timeout: Duration,
}

impl RedisConfig {
    /// Parses the adapter config blob
    ///
    /// `conn` accepts `host:port`, optionally prefixed with `redis://` and
    /// optionally carrying credentials as `password@host:port` or
    /// `user:password@host:port`. Embedded credentials override `password`.
    ///
    /// # Errors
    /// Returns CacheError::Configuration if the JSON is malformed, `conn` is
    /// missing or empty, or `dbNum`/`maxIdle`/`maxActive`/`waitTimeoutMs` are
    /// not integers.
    pub fn from_json(config: &str) -> Result<Self, CacheError> {
        let raw: Map<String, Value> = serde_json::from_str(config)?;

        let key_prefix =
            string_setting(&raw, "key")?.unwrap_or_else(|| DEFAULT_KEY_PREFIX.to_string());

        let conn = string_setting(&raw, "conn")?
            .ok_or_else(|| CacheError::Configuration("config has no conn key".to_string()))?;
        let conn = conn.strip_prefix(REDIS_SCHEME).unwrap_or(&conn);

        let mut password = string_setting(&raw, "password")?.filter(|p| !p.is_empty());
        let address = match conn.rfind('@') {
            Some(at) => {
                let userinfo = &conn[..at];
                // `user:password` keeps only the password part
                let secret = userinfo.rsplit(':').next().unwrap_or(userinfo);
                if !secret.is_empty() {
                    password = Some(secret.to_string());
                }
                conn[at + 1..].to_string()
            }
            None => conn.to_string(),
        };

        if address.is_empty() {
            return Err(CacheError::Configuration(
                "conn does not name a host".to_string(),
            ));
        }

        let db_num = match string_setting(&raw, "dbNum")? {
            Some(v) => v.trim().parse::<i64>().map_err(|_| {
                CacheError::Configuration(format!("dbNum must be an integer, got {:?}", v))
            })?,
            None => DEFAULT_DB_NUM,
        };

        let max_idle = match string_setting(&raw, "maxIdle")? {
            Some(v) => v.trim().parse::<usize>().map_err(|_| {
                CacheError::Configuration(format!("maxIdle must be an integer, got {:?}", v))
            })?,
            None => DEFAULT_MAX_IDLE,
        };
        if max_idle == 0 {
            return Err(CacheError::Configuration(
                "maxIdle must be at least 1".to_string(),
            ));
        }

        let max_active = match string_setting(&raw, "maxActive")? {
            Some(v) => v.trim().parse::<usize>().map_err(|_| {
                CacheError::Configuration(format!("maxActive must be an integer, got {:?}", v))
            })?,
            None => DEFAULT_MAX_ACTIVE,
        };

        let wait_timeout_ms = match string_setting(&raw, "waitTimeoutMs")? {
            Some(v) => v.trim().parse::<u64>().map_err(|_| {
                CacheError::Configuration(format!("waitTimeoutMs must be an integer, got {:?}", v))
            })?,
            None => DEFAULT_WAIT_TIMEOUT_MS,
        };

        Ok(Self {
            key_prefix,
            address,
            db_num,
            password,
            max_idle,
            max_active: max_active.max(max_idle),
            wait_timeout: Duration::from_millis(wait_timeout_ms),
            idle_timeout: Duration::from_secs(DEFAULT_IDLE_TIMEOUT_SECS),
        })
    }

    /// Connection URL without credentials; AUTH and SELECT are issued by the pool.
    pub fn connection_url(&self) -> String {
        format!("{}{}", REDIS_SCHEME, self.address)
    }
}

/// Reads a setting as a string. Numbers are accepted and rendered;
/// `null` counts as absent.
fn string_setting(raw: &Map<String, Value>, name: &str) -> Result<Option<String>, CacheError> {
    match raw.get(name) {
        None | Some(Value::Null) => Ok(None),
        Some(Value::String(s)) => Ok(Some(s.clone())),
        Some(Value::Number(n)) => Ok(Some(n.to_string())),
        Some(other) => Err(CacheError::Configuration(format!(
            "{} must be a string, got {}",
            name, other
        ))),
    }
}
