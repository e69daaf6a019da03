// Redis connection pool
//
// Every new connection authenticates (when a password is configured) and
// selects the configured database before the pool hands it out. A connection
// that fails either step is dropped and the error surfaces to the caller.
// Pooled connections are PINGed on checkout; a dead one is replaced.

use deadpool::managed::{self, Metrics, RecycleError, RecycleResult};
use redis::aio::MultiplexedConnection;
use redis::Client;
use std::time::Duration;

use super::config::RedisConfig;
use crate::cache::CacheError;
use crate::constants::{CONNECT_TIMEOUT_MS, RECYCLE_TIMEOUT_MS};

/// Pool of authenticated, database-selected Redis connections
pub type RedisPool = managed::Pool<RedisConnectionManager>;

/// Connection checked out of a [`RedisPool`]; returned to the pool on drop
pub type PooledConnection = managed::Object<RedisConnectionManager>;

/// deadpool manager that dials, AUTHs and SELECTs
#[derive(Debug)]
pub struct RedisConnectionManager {
    client: Client,
    password: Option<String>,
    db_num: i64,
    idle_timeout: Duration,
}

impl RedisConnectionManager {
    /// # Errors
    /// Returns CacheError::Configuration if the address cannot form a Redis URL
    pub fn new(config: &RedisConfig) -> Result<Self, CacheError> {
        let client = Client::open(config.connection_url()).map_err(|e| {
            CacheError::Configuration(format!("Invalid Redis address {}: {}", config.address, e))
        })?;

        Ok(Self {
            client,
            password: config.password.clone(),
            db_num: config.db_num,
            idle_timeout: config.idle_timeout,
        })
    }
}

impl managed::Manager for RedisConnectionManager {
    type Type = MultiplexedConnection;
    type Error = CacheError;

    async fn create(&self) -> Result<MultiplexedConnection, CacheError> {
        let mut conn = self
            .client
            .get_multiplexed_async_connection()
            .await
            .map_err(|e| CacheError::Connection(format!("Failed to connect to Redis: {}", e)))?;

        if let Some(password) = &self.password {
            let _: () = redis::cmd("AUTH")
                .arg(password)
                .query_async(&mut conn)
                .await
                .map_err(|e| CacheError::Authentication(e.to_string()))?;
        }

        let _: () = redis::cmd("SELECT")
            .arg(self.db_num)
            .query_async(&mut conn)
            .await
            .map_err(|e| CacheError::DatabaseSelection(format!("db {}: {}", self.db_num, e)))?;

        tracing::debug!(db = self.db_num, "Opened Redis connection");
        Ok(conn)
    }

    async fn recycle(
        &self,
        conn: &mut MultiplexedConnection,
        metrics: &Metrics,
    ) -> RecycleResult<CacheError> {
        if metrics.last_used() > self.idle_timeout {
            tracing::debug!(
                idle_secs = metrics.last_used().as_secs(),
                "Discarding idle Redis connection"
            );
            return Err(RecycleError::Message("idle timeout elapsed".into()));
        }

        // a socket closed by the server only shows up when it is used
        let _: () = redis::cmd("PING").query_async(conn).await.map_err(|e| {
            tracing::debug!(error = %e, "Discarding broken Redis connection");
            RecycleError::Backend(CacheError::from(e))
        })?;
        Ok(())
    }
}

/// Builds a pool holding up to `max_active` connections. No connection is
/// opened yet. Checkouts wait at most `wait_timeout` for a free slot.
pub fn build_pool(config: &RedisConfig) -> Result<RedisPool, CacheError> {
    let manager = RedisConnectionManager::new(config)?;
    managed::Pool::builder(manager)
        .max_size(config.max_active)
        .wait_timeout(Some(config.wait_timeout))
        .create_timeout(Some(Duration::from_millis(CONNECT_TIMEOUT_MS)))
        .recycle_timeout(Some(Duration::from_millis(RECYCLE_TIMEOUT_MS)))
        .runtime(deadpool::Runtime::Tokio1)
        .build()
        .map_err(|e| CacheError::Configuration(format!("Failed to build Redis pool: {}", e)))
}

/// Closes idle connections unused for longer than `idle_timeout`, then any
/// beyond the first `max_idle`. Checked-out connections are not touched.
/// Returns how many were closed.
pub fn trim_idle(pool: &RedisPool, max_idle: usize, idle_timeout: Duration) -> usize {
    let mut kept = 0usize;
    let result = pool.retain(|_, metrics| {
        if metrics.last_used() > idle_timeout || kept >= max_idle {
            return false;
        }
        kept += 1;
        true
    });
    result.removed.len()
}

/// Checks a connection out of the pool
///
/// Manager errors (dial, AUTH, SELECT) surface unchanged; pool-level
/// failures become CacheError::Connection.
pub async fn checkout(pool: &RedisPool) -> Result<PooledConnection, CacheError> {
    pool.get().await.map_err(|e| match e {
        managed::PoolError::Backend(err) => err,
        other => CacheError::Connection(format!("Redis pool unavailable: {}", other)),
    })
}
