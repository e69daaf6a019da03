//! Cache trait definition
//!
//! This module defines the `Cache` trait that every adapter must satisfy.
//! The contract covers plain values, counters, sets, sorted sets, hashes and
//! lists, plus adapter startup and namespace clearing. It is identical across
//! adapters: a zero TTL always means "no expiry", never "expire immediately".
//!
//! Values cross the trait as bytes. Typed values are encoded by the facade
//! through [`crate::cache::codec`] before they reach an adapter.

use async_trait::async_trait;
use std::collections::HashMap;
use std::time::Duration;

use super::error::CacheError;

/// Existence precondition for [`Cache::set`]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum SetCondition {
    /// Write unconditionally
    #[default]
    Always,
    /// Only overwrite an existing key (XX)
    MustExist,
    /// Only create a missing key (NX)
    MustNotExist,
}

/// Options for [`Cache::set`]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct SetOptions {
    /// Expiry of the stored value; `None` or zero stores it permanently
    pub expire: Option<Duration>,
    /// Existence precondition
    pub condition: SetCondition,
}

impl SetOptions {
    /// Expire after whole seconds (0 = no expiry)
    pub fn expire_secs(mut self, seconds: u64) -> Self {
        self.expire = Some(Duration::from_secs(seconds));
        self
    }

    /// Expire after milliseconds (0 = no expiry)
    pub fn expire_millis(mut self, millis: u64) -> Self {
        self.expire = Some(Duration::from_millis(millis));
        self
    }

    pub fn must_exist(mut self) -> Self {
        self.condition = SetCondition::MustExist;
        self
    }

    pub fn must_not_exist(mut self) -> Self {
        self.condition = SetCondition::MustNotExist;
        self
    }

    /// Effective expiry, with zero normalized to "never".
    pub fn ttl(&self) -> Option<Duration> {
        self.expire.filter(|d| !d.is_zero())
    }
}

/// Cache trait for the pluggable adapters (redis, memory)
///
/// Every key argument is a logical key; adapters apply their own namespacing.
#[async_trait]
pub trait Cache: Send + Sync {
    // ---------------------------------------------------------------------
    // Plain values
    // ---------------------------------------------------------------------

    /// Get a value by key. `Ok(None)` when the key is absent.
    async fn get(&self, key: &str) -> Result<Option<Vec<u8>>, CacheError>;

    /// Batch version of `get`; the result lines up with `keys`.
    async fn get_multi(&self, keys: &[&str]) -> Result<Vec<Option<Vec<u8>>>, CacheError>;

    /// Set a value with optional expiry and existence precondition.
    /// Returns `CacheError::ConditionNotMet` when the precondition blocks the write.
    async fn set(&self, key: &str, value: &[u8], options: SetOptions) -> Result<(), CacheError>;

    /// Set a value that expires after `ttl` (zero = no expiry).
    async fn put(&self, key: &str, value: &[u8], ttl: Duration) -> Result<(), CacheError>;

    /// Delete a key. Deleting a missing key is not an error.
    async fn delete(&self, key: &str) -> Result<(), CacheError>;

    async fn exists(&self, key: &str) -> Result<bool, CacheError>;

    /// Set a key's time to live in seconds. Returns false if the key does not exist.
    async fn expire(&self, key: &str, seconds: i64) -> Result<bool, CacheError>;

    /// Existence check that never fails: errors are reported as `false`.
    async fn is_exist(&self, key: &str) -> bool {
        self.exists(key).await.unwrap_or(false)
    }

    // ---------------------------------------------------------------------
    // Counters
    // ---------------------------------------------------------------------

    /// Increment an integer value; an absent key starts at 0.
    async fn incr(&self, key: &str) -> Result<i64, CacheError>;

    async fn incr_by(&self, key: &str, increment: i64) -> Result<i64, CacheError>;

    async fn decr(&self, key: &str) -> Result<i64, CacheError>;

    async fn decr_by(&self, key: &str, decrement: i64) -> Result<i64, CacheError>;

    /// Set only if absent. Returns whether the value was written.
    async fn setnx(&self, key: &str, value: &[u8]) -> Result<bool, CacheError>;

    // ---------------------------------------------------------------------
    // Sets
    // ---------------------------------------------------------------------

    /// Add members; returns how many were not already present.
    async fn sadd(&self, key: &str, members: &[&str]) -> Result<usize, CacheError>;

    /// Remove and return a random member.
    async fn spop(&self, key: &str) -> Result<Option<String>, CacheError>;

    async fn sismember(&self, key: &str, member: &str) -> Result<bool, CacheError>;

    async fn smembers(&self, key: &str) -> Result<Vec<String>, CacheError>;

    /// Members of the first set that are in none of the others.
    async fn sdiff(&self, keys: &[&str]) -> Result<Vec<String>, CacheError>;

    /// Move a member between sets. Returns false if it was not in `source`.
    async fn smove(
        &self,
        source: &str,
        destination: &str,
        member: &str,
    ) -> Result<bool, CacheError>;

    /// Remove members; returns how many were present.
    async fn srem(&self, key: &str, members: &[&str]) -> Result<usize, CacheError>;

    async fn sunion(&self, keys: &[&str]) -> Result<Vec<String>, CacheError>;

    // ---------------------------------------------------------------------
    // Sorted sets
    // ---------------------------------------------------------------------

    /// Add or update members with scores; returns how many were new.
    async fn zadd(&self, key: &str, pairs: &HashMap<String, f64>) -> Result<usize, CacheError>;

    async fn zscore(&self, key: &str, member: &str) -> Result<Option<f64>, CacheError>;

    /// Members by ascending rank. Negative indexes count from the end.
    /// With `with_scores` the result interleaves member, score.
    async fn zrange(
        &self,
        key: &str,
        start: isize,
        stop: isize,
        with_scores: bool,
    ) -> Result<Vec<String>, CacheError>;

    /// Members with `min <= score <= max`, ascending.
    async fn zrange_by_score(
        &self,
        key: &str,
        min: f64,
        max: f64,
        with_scores: bool,
    ) -> Result<Vec<String>, CacheError>;

    /// Members by descending rank.
    async fn zrevrange(
        &self,
        key: &str,
        start: isize,
        stop: isize,
        with_scores: bool,
    ) -> Result<Vec<String>, CacheError>;

    async fn zrem(&self, key: &str, members: &[&str]) -> Result<usize, CacheError>;

    /// Increment a member's score; returns the new score.
    async fn zincrby(&self, key: &str, member: &str, increment: f64) -> Result<f64, CacheError>;

    async fn zrem_range_by_rank(
        &self,
        key: &str,
        start: isize,
        stop: isize,
    ) -> Result<usize, CacheError>;

    async fn zrem_range_by_score(&self, key: &str, min: f64, max: f64)
        -> Result<usize, CacheError>;

    // ---------------------------------------------------------------------
    // Hashes
    // ---------------------------------------------------------------------

    async fn hget(&self, key: &str, field: &str) -> Result<Option<String>, CacheError>;

    /// Set a field; returns true if the field is new.
    async fn hset(&self, key: &str, field: &str, value: &str) -> Result<bool, CacheError>;

    async fn hincrby(&self, key: &str, field: &str, increment: i64) -> Result<i64, CacheError>;

    async fn hexists(&self, key: &str, field: &str) -> Result<bool, CacheError>;

    async fn hmget(&self, key: &str, fields: &[&str]) -> Result<Vec<Option<String>>, CacheError>;

    async fn hmset(&self, key: &str, pairs: &[(&str, &str)]) -> Result<(), CacheError>;

    async fn hvals(&self, key: &str) -> Result<Vec<String>, CacheError>;

    async fn hgetall(&self, key: &str) -> Result<HashMap<String, String>, CacheError>;

    /// Delete fields; returns how many existed.
    async fn hdel(&self, key: &str, fields: &[&str]) -> Result<usize, CacheError>;

    // ---------------------------------------------------------------------
    // Lists
    // ---------------------------------------------------------------------

    /// Append values; returns the new list length.
    async fn rpush(&self, key: &str, values: &[&str]) -> Result<usize, CacheError>;

    /// Prepend values; returns the new list length.
    async fn lpush(&self, key: &str, values: &[&str]) -> Result<usize, CacheError>;

    async fn lpop(&self, key: &str) -> Result<Option<String>, CacheError>;

    /// Blocking pop. Waits up to `timeout_secs` and returns `Ok(None)`
    /// if nothing arrived; a transport failure is still an `Err`.
    async fn blpop(&self, key: &str, timeout_secs: u64) -> Result<Option<String>, CacheError>;

    /// Remove occurrences of `value` (count > 0 from head, < 0 from tail, 0 all).
    async fn lrem(&self, key: &str, count: isize, value: &str) -> Result<usize, CacheError>;

    async fn lrange(&self, key: &str, start: isize, stop: isize)
        -> Result<Vec<String>, CacheError>;

    // ---------------------------------------------------------------------
    // Lifecycle
    // ---------------------------------------------------------------------

    /// Remove every key in this adapter's namespace, and nothing else.
    async fn clear_all(&self) -> Result<(), CacheError>;

    /// Configure and start the adapter from a JSON config blob.
    /// Called once, right after the registry instantiates the adapter.
    async fn start_and_gc(&mut self, config: &str) -> Result<(), CacheError>;
}
