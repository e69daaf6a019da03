// Redis cache implementation
//
// Each operation checks out one pooled connection, sends exactly one command
// (ClearAll sends a scan-then-delete sequence on the same connection) and
// converts the reply into the trait's return type. The connection goes back
// to the pool when the guard drops, on every exit path.

use async_trait::async_trait;
use redis::{Cmd, FromRedisValue};
use std::collections::HashMap;
use std::time::Duration;
use tokio::task::JoinHandle;

use super::config::RedisConfig;
use super::key::KeyNamespace;
use super::pool::{build_pool, checkout, trim_idle, PooledConnection, RedisPool};
use crate::cache::{Cache, CacheError, SetCondition, SetOptions};
use crate::constants::{CLEAR_SCAN_COUNT, DEFAULT_KEY_PREFIX, POOL_REAP_INTERVAL_SECS};

/// Adapter lifecycle: created unconfigured by the registry, ready once
/// `start_and_gc` has built the pool and proven a connection.
enum State {
    Unconfigured,
    Ready(RedisPool),
}

/// Redis-backed cache adapter
///
/// Provides:
/// - Pooled connections (deadpool) with per-connection AUTH and SELECT
/// - A background reaper closing idle connections beyond `maxIdle`
/// - `{prefix}:{key}` namespacing on every key argument
/// - Typed reply decoding; shape mismatches surface as errors
pub struct RedisCache {
    state: State,
    namespace: KeyNamespace,
    config: Option<RedisConfig>,
    reaper: Option<JoinHandle<()>>,
}

impl RedisCache {
    /// Creates an unconfigured adapter with the default namespace.
    pub fn new() -> Self {
        Self {
            state: State::Unconfigured,
            namespace: KeyNamespace::new(DEFAULT_KEY_PREFIX),
            config: None,
            reaper: None,
        }
    }

    /// Registry factory
    pub fn instance() -> Box<dyn Cache> {
        Box::new(Self::new())
    }

    pub fn namespace(&self) -> &KeyNamespace {
        &self.namespace
    }

    /// Parsed configuration, once started
    pub fn config(&self) -> Option<&RedisConfig> {
        self.config.as_ref()
    }

    pub fn is_ready(&self) -> bool {
        matches!(self.state, State::Ready(_))
    }

    /// Sends PING on a pooled connection
    pub async fn health_check(&self) -> bool {
        let mut cmd = redis::cmd("PING");
        self.query::<String>(&mut cmd).await.is_ok()
    }

    async fn connection(&self) -> Result<PooledConnection, CacheError> {
        match &self.state {
            State::Ready(pool) => checkout(pool).await,
            State::Unconfigured => Err(CacheError::NotConfigured),
        }
    }

    /// Runs one command on one pooled connection.
    async fn query<T: FromRedisValue>(&self, cmd: &mut Cmd) -> Result<T, CacheError> {
        let mut conn = self.connection().await?;
        let reply: T = cmd.query_async(&mut *conn).await?;
        Ok(reply)
    }

    fn k(&self, key: &str) -> String {
        self.namespace.key(key)
    }

    async fn range_cmd(
        &self,
        name: &str,
        key: &str,
        start: impl redis::ToRedisArgs,
        stop: impl redis::ToRedisArgs,
        with_scores: bool,
    ) -> Result<Vec<String>, CacheError> {
        let mut cmd = redis::cmd(name);
        cmd.arg(self.k(key)).arg(start).arg(stop);
        if with_scores {
            cmd.arg("WITHSCORES");
        }
        self.query(&mut cmd).await
    }
}

impl Default for RedisCache {
    fn default() -> Self {
        Self::new()
    }
}

impl Drop for RedisCache {
    fn drop(&mut self) {
        if let Some(reaper) = self.reaper.take() {
            reaper.abort();
        }
    }
}

/// Periodically trims the pool back to `max_idle` fresh idle connections.
fn spawn_reaper(pool: RedisPool, config: &RedisConfig) -> JoinHandle<()> {
    let max_idle = config.max_idle;
    let idle_timeout = config.idle_timeout;
    tokio::spawn(async move {
        let mut ticker = tokio::time::interval(Duration::from_secs(POOL_REAP_INTERVAL_SECS));
        // first tick fires immediately
        ticker.tick().await;
        loop {
            ticker.tick().await;
            let closed = trim_idle(&pool, max_idle, idle_timeout);
            if closed > 0 {
                tracing::debug!(closed = closed, "Closed idle Redis connections");
            }
        }
    })
}

#[async_trait]
impl Cache for RedisCache {
    async fn get(&self, key: &str) -> Result<Option<Vec<u8>>, CacheError> {
        self.query(redis::cmd("GET").arg(self.k(key))).await
    }

    async fn get_multi(&self, keys: &[&str]) -> Result<Vec<Option<Vec<u8>>>, CacheError> {
        if keys.is_empty() {
            return Ok(Vec::new());
        }
        let values: Vec<Option<Vec<u8>>> = self
            .query(redis::cmd("MGET").arg(self.namespace.keys(keys)))
            .await?;
        if values.len() != keys.len() {
            return Err(CacheError::UnexpectedReply(format!(
                "MGET returned {} values for {} keys",
                values.len(),
                keys.len()
            )));
        }
        Ok(values)
    }

    async fn set(&self, key: &str, value: &[u8], options: SetOptions) -> Result<(), CacheError> {
        let mut cmd = redis::cmd("SET");
        cmd.arg(self.k(key)).arg(value);
        if let Some(ttl) = options.ttl() {
            if ttl.subsec_nanos() == 0 {
                cmd.arg("EX").arg(ttl.as_secs());
            } else {
                cmd.arg("PX").arg(ttl.as_millis().max(1) as u64);
            }
        }
        match options.condition {
            SetCondition::Always => {}
            SetCondition::MustExist => {
                cmd.arg("XX");
            }
            SetCondition::MustNotExist => {
                cmd.arg("NX");
            }
        }

        // nil reply means the precondition blocked the write
        let reply: Option<String> = self.query(&mut cmd).await?;
        match reply {
            Some(_) => Ok(()),
            None => Err(CacheError::ConditionNotMet),
        }
    }

    async fn put(&self, key: &str, value: &[u8], ttl: Duration) -> Result<(), CacheError> {
        self.set(key, value, SetOptions {
            expire: Some(ttl),
            condition: SetCondition::Always,
        })
        .await
    }

    async fn delete(&self, key: &str) -> Result<(), CacheError> {
        let _: i64 = self.query(redis::cmd("DEL").arg(self.k(key))).await?;
        Ok(())
    }

    async fn exists(&self, key: &str) -> Result<bool, CacheError> {
        self.query(redis::cmd("EXISTS").arg(self.k(key))).await
    }

    async fn expire(&self, key: &str, seconds: i64) -> Result<bool, CacheError> {
        self.query(redis::cmd("EXPIRE").arg(self.k(key)).arg(seconds))
            .await
    }

    async fn incr(&self, key: &str) -> Result<i64, CacheError> {
        self.query(redis::cmd("INCR").arg(self.k(key))).await
    }

    async fn incr_by(&self, key: &str, increment: i64) -> Result<i64, CacheError> {
        self.query(redis::cmd("INCRBY").arg(self.k(key)).arg(increment))
            .await
    }

    async fn decr(&self, key: &str) -> Result<i64, CacheError> {
        self.query(redis::cmd("DECR").arg(self.k(key))).await
    }

    async fn decr_by(&self, key: &str, decrement: i64) -> Result<i64, CacheError> {
        self.query(redis::cmd("DECRBY").arg(self.k(key)).arg(decrement))
            .await
    }

    async fn setnx(&self, key: &str, value: &[u8]) -> Result<bool, CacheError> {
        self.query(redis::cmd("SETNX").arg(self.k(key)).arg(value))
            .await
    }

    async fn sadd(&self, key: &str, members: &[&str]) -> Result<usize, CacheError> {
        if members.is_empty() {
            return Ok(0);
        }
        self.query(redis::cmd("SADD").arg(self.k(key)).arg(members))
            .await
    }

    async fn spop(&self, key: &str) -> Result<Option<String>, CacheError> {
        self.query(redis::cmd("SPOP").arg(self.k(key))).await
    }

    async fn sismember(&self, key: &str, member: &str) -> Result<bool, CacheError> {
        self.query(redis::cmd("SISMEMBER").arg(self.k(key)).arg(member))
            .await
    }

    async fn smembers(&self, key: &str) -> Result<Vec<String>, CacheError> {
        self.query(redis::cmd("SMEMBERS").arg(self.k(key))).await
    }

    async fn sdiff(&self, keys: &[&str]) -> Result<Vec<String>, CacheError> {
        if keys.is_empty() {
            return Ok(Vec::new());
        }
        self.query(redis::cmd("SDIFF").arg(self.namespace.keys(keys)))
            .await
    }

    async fn smove(
        &self,
        source: &str,
        destination: &str,
        member: &str,
    ) -> Result<bool, CacheError> {
        self.query(
            redis::cmd("SMOVE")
                .arg(self.k(source))
                .arg(self.k(destination))
                .arg(member),
        )
        .await
    }

    async fn srem(&self, key: &str, members: &[&str]) -> Result<usize, CacheError> {
        if members.is_empty() {
            return Ok(0);
        }
        self.query(redis::cmd("SREM").arg(self.k(key)).arg(members))
            .await
    }

    async fn sunion(&self, keys: &[&str]) -> Result<Vec<String>, CacheError> {
        if keys.is_empty() {
            return Ok(Vec::new());
        }
        self.query(redis::cmd("SUNION").arg(self.namespace.keys(keys)))
            .await
    }

    async fn zadd(&self, key: &str, pairs: &HashMap<String, f64>) -> Result<usize, CacheError> {
        if pairs.is_empty() {
            return Ok(0);
        }
        let mut cmd = redis::cmd("ZADD");
        cmd.arg(self.k(key));
        for (member, score) in pairs {
            cmd.arg(*score).arg(member);
        }
        self.query(&mut cmd).await
    }

    async fn zscore(&self, key: &str, member: &str) -> Result<Option<f64>, CacheError> {
        self.query(redis::cmd("ZSCORE").arg(self.k(key)).arg(member))
            .await
    }

    async fn zrange(
        &self,
        key: &str,
        start: isize,
        stop: isize,
        with_scores: bool,
    ) -> Result<Vec<String>, CacheError> {
        self.range_cmd("ZRANGE", key, start, stop, with_scores).await
    }

    async fn zrange_by_score(
        &self,
        key: &str,
        min: f64,
        max: f64,
        with_scores: bool,
    ) -> Result<Vec<String>, CacheError> {
        self.range_cmd("ZRANGEBYSCORE", key, min, max, with_scores)
            .await
    }

    async fn zrevrange(
        &self,
        key: &str,
        start: isize,
        stop: isize,
        with_scores: bool,
    ) -> Result<Vec<String>, CacheError> {
        self.range_cmd("ZREVRANGE", key, start, stop, with_scores)
            .await
    }

    async fn zrem(&self, key: &str, members: &[&str]) -> Result<usize, CacheError> {
        if members.is_empty() {
            return Ok(0);
        }
        self.query(redis::cmd("ZREM").arg(self.k(key)).arg(members))
            .await
    }

    async fn zincrby(&self, key: &str, member: &str, increment: f64) -> Result<f64, CacheError> {
        self.query(
            redis::cmd("ZINCRBY")
                .arg(self.k(key))
                .arg(increment)
                .arg(member),
        )
        .await
    }

    async fn zrem_range_by_rank(
        &self,
        key: &str,
        start: isize,
        stop: isize,
    ) -> Result<usize, CacheError> {
        self.query(
            redis::cmd("ZREMRANGEBYRANK")
                .arg(self.k(key))
                .arg(start)
                .arg(stop),
        )
        .await
    }

    async fn zrem_range_by_score(
        &self,
        key: &str,
        min: f64,
        max: f64,
    ) -> Result<usize, CacheError> {
        self.query(
            redis::cmd("ZREMRANGEBYSCORE")
                .arg(self.k(key))
                .arg(min)
                .arg(max),
        )
        .await
    }

    async fn hget(&self, key: &str, field: &str) -> Result<Option<String>, CacheError> {
        self.query(redis::cmd("HGET").arg(self.k(key)).arg(field))
            .await
    }

    async fn hset(&self, key: &str, field: &str, value: &str) -> Result<bool, CacheError> {
        self.query(redis::cmd("HSET").arg(self.k(key)).arg(field).arg(value))
            .await
    }

    async fn hincrby(&self, key: &str, field: &str, increment: i64) -> Result<i64, CacheError> {
        self.query(
            redis::cmd("HINCRBY")
                .arg(self.k(key))
                .arg(field)
                .arg(increment),
        )
        .await
    }

    async fn hexists(&self, key: &str, field: &str) -> Result<bool, CacheError> {
        self.query(redis::cmd("HEXISTS").arg(self.k(key)).arg(field))
            .await
    }

    async fn hmget(&self, key: &str, fields: &[&str]) -> Result<Vec<Option<String>>, CacheError> {
        if fields.is_empty() {
            return Ok(Vec::new());
        }
        self.query(redis::cmd("HMGET").arg(self.k(key)).arg(fields))
            .await
    }

    async fn hmset(&self, key: &str, pairs: &[(&str, &str)]) -> Result<(), CacheError> {
        if pairs.is_empty() {
            return Ok(());
        }
        let mut cmd = redis::cmd("HSET");
        cmd.arg(self.k(key));
        for (field, value) in pairs {
            cmd.arg(*field).arg(*value);
        }
        let _: i64 = self.query(&mut cmd).await?;
        Ok(())
    }

    async fn hvals(&self, key: &str) -> Result<Vec<String>, CacheError> {
        self.query(redis::cmd("HVALS").arg(self.k(key))).await
    }

    async fn hgetall(&self, key: &str) -> Result<HashMap<String, String>, CacheError> {
        self.query(redis::cmd("HGETALL").arg(self.k(key))).await
    }

    async fn hdel(&self, key: &str, fields: &[&str]) -> Result<usize, CacheError> {
        if fields.is_empty() {
            return Ok(0);
        }
        self.query(redis::cmd("HDEL").arg(self.k(key)).arg(fields))
            .await
    }

    async fn rpush(&self, key: &str, values: &[&str]) -> Result<usize, CacheError> {
        if values.is_empty() {
            return Ok(0);
        }
        self.query(redis::cmd("RPUSH").arg(self.k(key)).arg(values))
            .await
    }

    async fn lpush(&self, key: &str, values: &[&str]) -> Result<usize, CacheError> {
        if values.is_empty() {
            return Ok(0);
        }
        self.query(redis::cmd("LPUSH").arg(self.k(key)).arg(values))
            .await
    }

    async fn lpop(&self, key: &str) -> Result<Option<String>, CacheError> {
        self.query(redis::cmd("LPOP").arg(self.k(key))).await
    }

    async fn blpop(&self, key: &str, timeout_secs: u64) -> Result<Option<String>, CacheError> {
        // nil on timeout, otherwise [key, value]
        let reply: Option<(String, String)> = self
            .query(redis::cmd("BLPOP").arg(self.k(key)).arg(timeout_secs))
            .await?;
        Ok(reply.map(|(_, value)| value))
    }

    async fn lrem(&self, key: &str, count: isize, value: &str) -> Result<usize, CacheError> {
        self.query(redis::cmd("LREM").arg(self.k(key)).arg(count).arg(value))
            .await
    }

    async fn lrange(
        &self,
        key: &str,
        start: isize,
        stop: isize,
    ) -> Result<Vec<String>, CacheError> {
        self.query(redis::cmd("LRANGE").arg(self.k(key)).arg(start).arg(stop))
            .await
    }

    async fn clear_all(&self) -> Result<(), CacheError> {
        let mut conn = self.connection().await?;
        let pattern = self.namespace.match_pattern();

        // Collect the full listing first so a listing failure deletes nothing.
        let mut cursor: u64 = 0;
        let mut keys: Vec<String> = Vec::new();
        loop {
            let (next, batch): (u64, Vec<String>) = redis::cmd("SCAN")
                .arg(cursor)
                .arg("MATCH")
                .arg(&pattern)
                .arg("COUNT")
                .arg(CLEAR_SCAN_COUNT)
                .query_async(&mut *conn)
                .await?;
            keys.extend(batch);
            if next == 0 {
                break;
            }
            cursor = next;
        }
        keys.sort();
        keys.dedup();

        let mut deleted = 0usize;
        for key in &keys {
            let result: Result<i64, redis::RedisError> =
                redis::cmd("DEL").arg(key).query_async(&mut *conn).await;
            if let Err(e) = result {
                tracing::error!(
                    prefix = %self.namespace.prefix(),
                    deleted = deleted,
                    remaining = keys.len() - deleted,
                    error = %e,
                    "ClearAll stopped part way"
                );
                return Err(CacheError::ClearIncomplete {
                    deleted,
                    reason: Box::new(e.into()),
                });
            }
            deleted += 1;
        }

        tracing::info!(prefix = %self.namespace.prefix(), deleted = deleted, "Cleared cache namespace");
        Ok(())
    }

    async fn start_and_gc(&mut self, config: &str) -> Result<(), CacheError> {
        let config = RedisConfig::from_json(config)?;
        let pool = build_pool(&config)?;

        // Prove the settings work: dial, AUTH and SELECT one connection now.
        drop(checkout(&pool).await?);

        tracing::info!(
            address = %config.address,
            db = config.db_num,
            prefix = %config.key_prefix,
            max_idle = config.max_idle,
            max_active = config.max_active,
            "Redis cache adapter ready"
        );

        if let Some(previous) = self.reaper.take() {
            previous.abort();
        }
        self.reaper = Some(spawn_reaper(pool.clone(), &config));
        self.namespace = KeyNamespace::new(config.key_prefix.clone());
        self.config = Some(config);
        self.state = State::Ready(pool);
        Ok(())
    }
}
