//! Cache facade
//!
//! [`CacheClient`] wraps one active adapter for application code. It is built
//! once during startup and shared as `Arc<CacheClient>`.
//!
//! Every call:
//! 1. fails fast with `NotConfigured` when no adapter is installed,
//! 2. fails fast with `CircuitOpen` while the circuit breaker rejects calls,
//! 3. runs the adapter call under `catch_unwind`; a panic uninstalls the
//!    adapter, trips the breaker and returns `AdapterFault`.
//!
//! Consecutive connectivity errors open the breaker; it half-opens after its
//! timeout. Other errors (wrong type, bad reply) prove the store is reachable
//! and count as successes for the breaker.
//!
//! `set`/`put`/`get` route values through the codec. The `*_raw` accessors and
//! the collection operations store strings and bytes as given.

use arc_swap::ArcSwapOption;
use futures::FutureExt;
use serde::de::DeserializeOwned;
use serde::Serialize;
use std::any::Any;
use std::collections::HashMap;
use std::future::Future;
use std::panic::AssertUnwindSafe;
use std::sync::Arc;
use std::time::Duration;

use super::codec;
use super::error::CacheError;
use super::metrics::{CacheMetrics, Outcome};
use super::registry;
use super::traits::{Cache, SetOptions};
use crate::circuit_breaker::{CircuitBreaker, CircuitBreakerConfig, CircuitState};
use crate::config::CacheSettings;

type Adapter = Arc<Box<dyn Cache>>;

/// Panic-tolerant handle to the active cache adapter
pub struct CacheClient {
    adapter: ArcSwapOption<Box<dyn Cache>>,
    breaker: CircuitBreaker,
    metrics: Option<&'static CacheMetrics>,
}

impl CacheClient {
    /// Creates and starts the configured adapter through the global registry.
    ///
    /// # Errors
    /// Returns the registry or adapter startup error. Callers that prefer to
    /// run without a cache can fall back to [`CacheClient::disabled`].
    pub async fn connect(settings: &CacheSettings) -> Result<Self, CacheError> {
        let adapter = registry::new_cache(&settings.adapter, &settings.adapter_config()).await?;
        Ok(Self::from_adapter(
            adapter,
            settings.circuit_breaker.to_circuit_breaker_config(),
        ))
    }

    /// Wraps an already started adapter.
    pub fn from_adapter(adapter: Box<dyn Cache>, breaker: CircuitBreakerConfig) -> Self {
        Self {
            adapter: ArcSwapOption::from(Some(Arc::new(adapter))),
            breaker: CircuitBreaker::new(breaker),
            metrics: CacheMetrics::global(),
        }
    }

    /// A client with no adapter; every call returns `NotConfigured`.
    pub fn disabled() -> Self {
        Self {
            adapter: ArcSwapOption::empty(),
            breaker: CircuitBreaker::default(),
            metrics: CacheMetrics::global(),
        }
    }

    pub fn is_configured(&self) -> bool {
        self.adapter.load().is_some()
    }

    pub fn breaker_state(&self) -> CircuitState {
        self.breaker.state()
    }

    pub fn breaker(&self) -> &CircuitBreaker {
        &self.breaker
    }

    /// Installs a started adapter and closes the breaker.
    pub fn install(&self, adapter: Box<dyn Cache>) {
        self.adapter.store(Some(Arc::new(adapter)));
        self.breaker.reset();
        tracing::info!("Cache adapter installed");
    }

    /// Removes the adapter; later calls return `NotConfigured`.
    pub fn uninstall(&self) {
        self.adapter.store(None);
    }

    async fn call<T, F, Fut>(&self, operation: &'static str, key: &str, f: F) -> Result<T, CacheError>
    where
        F: FnOnce(Adapter) -> Fut,
        Fut: Future<Output = Result<T, CacheError>>,
    {
        self.call_classified(operation, key, |_| Outcome::Ok, f).await
    }

    async fn call_classified<T, F, Fut>(
        &self,
        operation: &'static str,
        key: &str,
        classify: fn(&T) -> Outcome,
        f: F,
    ) -> Result<T, CacheError>
    where
        F: FnOnce(Adapter) -> Fut,
        Fut: Future<Output = Result<T, CacheError>>,
    {
        let Some(adapter) = self.adapter.load_full() else {
            self.record(operation, Outcome::Rejected);
            return Err(CacheError::NotConfigured);
        };
        let permit = match self.breaker.admit() {
            Ok(permit) => permit,
            Err(state) => {
                tracing::debug!(operation = operation, circuit = %state, "Cache call refused");
                self.record(operation, Outcome::Rejected);
                return Err(CacheError::CircuitOpen);
            }
        };

        let timer = self.metrics.map(|m| m.start_timer(operation));
        let result = AssertUnwindSafe(f(adapter)).catch_unwind().await;
        drop(timer);

        match result {
            Ok(Ok(value)) => {
                permit.succeeded();
                self.record(operation, classify(&value));
                Ok(value)
            }
            Ok(Err(e)) => {
                // the store answered; only unreachable stores count against it
                if e.is_connectivity() {
                    permit.failed();
                } else {
                    permit.succeeded();
                }
                tracing::error!(operation = operation, key = %key, error = %e, "Cache operation failed");
                self.record(operation, Outcome::Error);
                Err(e)
            }
            Err(panic) => {
                let message = panic_message(panic);
                // later calls fail fast instead of reaching the faulty adapter
                self.adapter.store(None);
                self.breaker.trip();
                tracing::error!(
                    operation = operation,
                    key = %key,
                    panic = %message,
                    "Cache adapter panicked, cache disabled"
                );
                self.record(operation, Outcome::Fault);
                Err(CacheError::AdapterFault(message))
            }
        }
    }

    fn record(&self, operation: &str, outcome: Outcome) {
        if let Some(metrics) = self.metrics {
            metrics.record(operation, outcome);
        }
    }

    // ---------------------------------------------------------------------
    // Codec-routed values
    // ---------------------------------------------------------------------

    /// Encodes and stores `value`. `timeout_secs > 0` sets an expiry.
    pub async fn set<T: Serialize + ?Sized>(
        &self,
        key: &str,
        value: &T,
        timeout_secs: u64,
    ) -> Result<(), CacheError> {
        if !self.is_configured() {
            self.record("set", Outcome::Rejected);
            return Err(CacheError::NotConfigured);
        }
        let data = codec::encode(value).map_err(|e| {
            tracing::error!(key = %key, error = %e, "Failed to encode cache value");
            e
        })?;
        self.call("set", key, |c| async move {
            if timeout_secs > 0 {
                c.put(key, &data, Duration::from_secs(timeout_secs)).await
            } else {
                c.set(key, &data, SetOptions::default()).await
            }
        })
        .await
    }

    /// Encodes and stores `value` with a TTL (zero = no expiry).
    pub async fn put<T: Serialize + ?Sized>(
        &self,
        key: &str,
        value: &T,
        ttl: Duration,
    ) -> Result<(), CacheError> {
        if !self.is_configured() {
            self.record("put", Outcome::Rejected);
            return Err(CacheError::NotConfigured);
        }
        let data = codec::encode(value)?;
        self.call("put", key, |c| async move { c.put(key, &data, ttl).await })
            .await
    }

    /// Fetches and decodes a value stored with [`CacheClient::set`].
    /// `Ok(None)` when the key is absent.
    pub async fn get<T: DeserializeOwned>(&self, key: &str) -> Result<Option<T>, CacheError> {
        let data = self
            .call_classified("get", key, hit_or_miss, |c| async move { c.get(key).await })
            .await?;
        match data {
            Some(bytes) => codec::decode(&bytes).map(Some).map_err(|e| {
                tracing::error!(key = %key, error = %e, "Failed to decode cache value");
                e
            }),
            None => Ok(None),
        }
    }

    // ---------------------------------------------------------------------
    // Raw values
    // ---------------------------------------------------------------------

    /// Stored bytes, without decoding
    pub async fn get_raw(&self, key: &str) -> Result<Option<Vec<u8>>, CacheError> {
        self.call_classified("get_raw", key, hit_or_miss, |c| async move { c.get(key).await })
            .await
    }

    /// Stored value as a string; an absent key is `NotFound`.
    pub async fn get_pure(&self, key: &str) -> Result<String, CacheError> {
        match self.get_raw(key).await? {
            Some(bytes) => Ok(String::from_utf8_lossy(&bytes).into_owned()),
            None => Err(CacheError::NotFound(key.to_string())),
        }
    }

    pub async fn get_multi_raw(&self, keys: &[&str]) -> Result<Vec<Option<Vec<u8>>>, CacheError> {
        let first = keys.first().copied().unwrap_or_default();
        self.call("get_multi", first, |c| async move { c.get_multi(keys).await })
            .await
    }

    pub async fn set_raw(&self, key: &str, value: &[u8], options: SetOptions) -> Result<(), CacheError> {
        self.call("set_raw", key, |c| async move { c.set(key, value, options).await })
            .await
    }

    /// Create-only write of raw bytes with an expiry in seconds (0 = none).
    /// `ConditionNotMet` if the key already exists.
    pub async fn set_nx_ex(&self, key: &str, value: &[u8], timeout_secs: u64) -> Result<(), CacheError> {
        let options = SetOptions::default()
            .expire_secs(timeout_secs)
            .must_not_exist();
        self.call("set_nx_ex", key, |c| async move { c.set(key, value, options).await })
            .await
    }

    pub async fn setnx(&self, key: &str, value: &[u8]) -> Result<bool, CacheError> {
        self.call("setnx", key, |c| async move { c.setnx(key, value).await })
            .await
    }

    pub async fn delete(&self, key: &str) -> Result<(), CacheError> {
        self.call("delete", key, |c| async move { c.delete(key).await })
            .await
    }

    pub async fn exists(&self, key: &str) -> Result<bool, CacheError> {
        self.call("exists", key, |c| async move { c.exists(key).await })
            .await
    }

    /// Existence check that reports every failure as `false`
    pub async fn is_exist(&self, key: &str) -> bool {
        self.exists(key).await.unwrap_or(false)
    }

    /// Sets a TTL in seconds; any failure reports `false`.
    pub async fn expire(&self, key: &str, seconds: i64) -> bool {
        self.call("expire", key, |c| async move { c.expire(key, seconds).await })
            .await
            .unwrap_or(false)
    }

    // ---------------------------------------------------------------------
    // Counters
    // ---------------------------------------------------------------------

    pub async fn incr(&self, key: &str) -> Result<i64, CacheError> {
        self.call("incr", key, |c| async move { c.incr(key).await })
            .await
    }

    pub async fn incr_by(&self, key: &str, increment: i64) -> Result<i64, CacheError> {
        self.call("incr_by", key, |c| async move { c.incr_by(key, increment).await })
            .await
    }

    pub async fn decr(&self, key: &str) -> Result<i64, CacheError> {
        self.call("decr", key, |c| async move { c.decr(key).await })
            .await
    }

    pub async fn decr_by(&self, key: &str, decrement: i64) -> Result<i64, CacheError> {
        self.call("decr_by", key, |c| async move { c.decr_by(key, decrement).await })
            .await
    }

    // ---------------------------------------------------------------------
    // Sets
    // ---------------------------------------------------------------------

    pub async fn sadd(&self, key: &str, members: &[&str]) -> Result<usize, CacheError> {
        self.call("sadd", key, |c| async move { c.sadd(key, members).await })
            .await
    }

    pub async fn spop(&self, key: &str) -> Result<Option<String>, CacheError> {
        self.call("spop", key, |c| async move { c.spop(key).await })
            .await
    }

    pub async fn sismember(&self, key: &str, member: &str) -> Result<bool, CacheError> {
        self.call("sismember", key, |c| async move { c.sismember(key, member).await })
            .await
    }

    pub async fn smembers(&self, key: &str) -> Result<Vec<String>, CacheError> {
        self.call("smembers", key, |c| async move { c.smembers(key).await })
            .await
    }

    pub async fn sdiff(&self, keys: &[&str]) -> Result<Vec<String>, CacheError> {
        let first = keys.first().copied().unwrap_or_default();
        self.call("sdiff", first, |c| async move { c.sdiff(keys).await })
            .await
    }

    pub async fn smove(&self, source: &str, destination: &str, member: &str) -> Result<bool, CacheError> {
        self.call("smove", source, |c| async move {
            c.smove(source, destination, member).await
        })
        .await
    }

    pub async fn srem(&self, key: &str, members: &[&str]) -> Result<usize, CacheError> {
        self.call("srem", key, |c| async move { c.srem(key, members).await })
            .await
    }

    pub async fn sunion(&self, keys: &[&str]) -> Result<Vec<String>, CacheError> {
        let first = keys.first().copied().unwrap_or_default();
        self.call("sunion", first, |c| async move { c.sunion(keys).await })
            .await
    }

    // ---------------------------------------------------------------------
    // Sorted sets
    // ---------------------------------------------------------------------

    pub async fn zadd(&self, key: &str, pairs: &HashMap<String, f64>) -> Result<usize, CacheError> {
        self.call("zadd", key, |c| async move { c.zadd(key, pairs).await })
            .await
    }

    pub async fn zscore(&self, key: &str, member: &str) -> Result<Option<f64>, CacheError> {
        self.call("zscore", key, |c| async move { c.zscore(key, member).await })
            .await
    }

    pub async fn zrange(
        &self,
        key: &str,
        start: isize,
        stop: isize,
        with_scores: bool,
    ) -> Result<Vec<String>, CacheError> {
        self.call("zrange", key, |c| async move {
            c.zrange(key, start, stop, with_scores).await
        })
        .await
    }

    pub async fn zrange_by_score(
        &self,
        key: &str,
        min: f64,
        max: f64,
        with_scores: bool,
    ) -> Result<Vec<String>, CacheError> {
        self.call("zrange_by_score", key, |c| async move {
            c.zrange_by_score(key, min, max, with_scores).await
        })
        .await
    }

    pub async fn zrevrange(
        &self,
        key: &str,
        start: isize,
        stop: isize,
        with_scores: bool,
    ) -> Result<Vec<String>, CacheError> {
        self.call("zrevrange", key, |c| async move {
            c.zrevrange(key, start, stop, with_scores).await
        })
        .await
    }

    pub async fn zrem(&self, key: &str, members: &[&str]) -> Result<usize, CacheError> {
        self.call("zrem", key, |c| async move { c.zrem(key, members).await })
            .await
    }

    pub async fn zincrby(&self, key: &str, member: &str, increment: f64) -> Result<f64, CacheError> {
        self.call("zincrby", key, |c| async move {
            c.zincrby(key, member, increment).await
        })
        .await
    }

    pub async fn zrem_range_by_rank(&self, key: &str, start: isize, stop: isize) -> Result<usize, CacheError> {
        self.call("zrem_range_by_rank", key, |c| async move {
            c.zrem_range_by_rank(key, start, stop).await
        })
        .await
    }

    pub async fn zrem_range_by_score(&self, key: &str, min: f64, max: f64) -> Result<usize, CacheError> {
        self.call("zrem_range_by_score", key, |c| async move {
            c.zrem_range_by_score(key, min, max).await
        })
        .await
    }

    // ---------------------------------------------------------------------
    // Hashes
    // ---------------------------------------------------------------------

    pub async fn hget(&self, key: &str, field: &str) -> Result<Option<String>, CacheError> {
        self.call("hget", key, |c| async move { c.hget(key, field).await })
            .await
    }

    pub async fn hset(&self, key: &str, field: &str, value: &str) -> Result<bool, CacheError> {
        self.call("hset", key, |c| async move { c.hset(key, field, value).await })
            .await
    }

    pub async fn hincrby(&self, key: &str, field: &str, increment: i64) -> Result<i64, CacheError> {
        self.call("hincrby", key, |c| async move {
            c.hincrby(key, field, increment).await
        })
        .await
    }

    pub async fn hexists(&self, key: &str, field: &str) -> Result<bool, CacheError> {
        self.call("hexists", key, |c| async move { c.hexists(key, field).await })
            .await
    }

    pub async fn hmget(&self, key: &str, fields: &[&str]) -> Result<Vec<Option<String>>, CacheError> {
        self.call("hmget", key, |c| async move { c.hmget(key, fields).await })
            .await
    }

    pub async fn hmset(&self, key: &str, pairs: &[(&str, &str)]) -> Result<(), CacheError> {
        self.call("hmset", key, |c| async move { c.hmset(key, pairs).await })
            .await
    }

    pub async fn hvals(&self, key: &str) -> Result<Vec<String>, CacheError> {
        self.call("hvals", key, |c| async move { c.hvals(key).await })
            .await
    }

    pub async fn hgetall(&self, key: &str) -> Result<HashMap<String, String>, CacheError> {
        self.call("hgetall", key, |c| async move { c.hgetall(key).await })
            .await
    }

    pub async fn hdel(&self, key: &str, fields: &[&str]) -> Result<usize, CacheError> {
        self.call("hdel", key, |c| async move { c.hdel(key, fields).await })
            .await
    }

    // ---------------------------------------------------------------------
    // Lists
    // ---------------------------------------------------------------------

    pub async fn rpush(&self, key: &str, values: &[&str]) -> Result<usize, CacheError> {
        self.call("rpush", key, |c| async move { c.rpush(key, values).await })
            .await
    }

    pub async fn lpush(&self, key: &str, values: &[&str]) -> Result<usize, CacheError> {
        self.call("lpush", key, |c| async move { c.lpush(key, values).await })
            .await
    }

    pub async fn lpop(&self, key: &str) -> Result<Option<String>, CacheError> {
        self.call_classified("lpop", key, some_or_miss, |c| async move { c.lpop(key).await })
            .await
    }

    /// Blocking pop; `Ok(None)` when `timeout_secs` elapse with nothing to pop.
    pub async fn blpop(&self, key: &str, timeout_secs: u64) -> Result<Option<String>, CacheError> {
        self.call_classified("blpop", key, some_or_miss, |c| async move {
            c.blpop(key, timeout_secs).await
        })
        .await
    }

    pub async fn lrem(&self, key: &str, count: isize, value: &str) -> Result<usize, CacheError> {
        self.call("lrem", key, |c| async move { c.lrem(key, count, value).await })
            .await
    }

    pub async fn lrange(&self, key: &str, start: isize, stop: isize) -> Result<Vec<String>, CacheError> {
        self.call("lrange", key, |c| async move { c.lrange(key, start, stop).await })
            .await
    }

    // ---------------------------------------------------------------------
    // Namespace
    // ---------------------------------------------------------------------

    pub async fn clear_all(&self) -> Result<(), CacheError> {
        self.call("clear_all", "*", |c| async move { c.clear_all().await })
            .await
    }
}

impl Default for CacheClient {
    fn default() -> Self {
        Self::disabled()
    }
}

impl std::fmt::Debug for CacheClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CacheClient")
            .field("configured", &self.is_configured())
            .field("breaker", &self.breaker.state())
            .finish()
    }
}

fn hit_or_miss(value: &Option<Vec<u8>>) -> Outcome {
    if value.is_some() {
        Outcome::Ok
    } else {
        Outcome::Miss
    }
}

fn some_or_miss(value: &Option<String>) -> Outcome {
    if value.is_some() {
        Outcome::Ok
    } else {
        Outcome::Miss
    }
}

fn panic_message(panic: Box<dyn Any + Send>) -> String {
    if let Some(s) = panic.downcast_ref::<&str>() {
        (*s).to_string()
    } else if let Some(s) = panic.downcast_ref::<String>() {
        s.clone()
    } else {
        "unknown panic".to_string()
    }
}
