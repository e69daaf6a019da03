// Constants module - centralized default values for configuration
//
// Defaults shared by the cache adapters, the facade and the YAML config layer.

// =============================================================================
// Adapter names
// =============================================================================

/// Registry name of the pooled Redis adapter
pub const REDIS_ADAPTER: &str = "redis";

/// Registry name of the in-process adapter
pub const MEMORY_ADAPTER: &str = "memory";

// =============================================================================
// Redis adapter defaults
// =============================================================================

/// Namespace prefix used when the adapter config carries no `key`
pub const DEFAULT_KEY_PREFIX: &str = "cacheRedis";

/// Database index selected on every new connection
pub const DEFAULT_DB_NUM: i64 = 0;

/// Maximum number of idle connections kept by the pool
pub const DEFAULT_MAX_IDLE: usize = 3;

/// Maximum number of connections open at once, idle or checked out
pub const DEFAULT_MAX_ACTIVE: usize = 64;

/// How long a caller waits for a free connection before failing (milliseconds)
pub const DEFAULT_WAIT_TIMEOUT_MS: u64 = 2000;

/// Dial + AUTH + SELECT budget for a new connection (milliseconds)
pub const CONNECT_TIMEOUT_MS: u64 = 5000;

/// Budget for the PING that validates a pooled connection on checkout (milliseconds)
pub const RECYCLE_TIMEOUT_MS: u64 = 1000;

/// Interval between idle-connection trims (seconds)
pub const POOL_REAP_INTERVAL_SECS: u64 = 30;

/// Idle connections older than this are discarded instead of reused (seconds)
pub const DEFAULT_IDLE_TIMEOUT_SECS: u64 = 180;

/// URI scheme stripped from the `conn` setting
pub const REDIS_SCHEME: &str = "redis://";

/// Keys fetched per SCAN round trip while clearing a namespace
pub const CLEAR_SCAN_COUNT: usize = 500;

// =============================================================================
// Memory adapter defaults
// =============================================================================

/// Interval between expired-entry sweeps in seconds
pub const DEFAULT_GC_INTERVAL_SECS: u64 = 60;

// =============================================================================
// Circuit breaker defaults
// =============================================================================

/// Default number of consecutive connectivity failures before circuit opens
pub const DEFAULT_FAILURE_THRESHOLD: u32 = 5;

/// Default number of successes in half-open state before circuit closes
pub const DEFAULT_SUCCESS_THRESHOLD: u32 = 2;

/// Default timeout before transitioning from open to half-open (seconds)
pub const DEFAULT_CB_TIMEOUT_SECS: u64 = 30;

/// Default maximum concurrent requests in half-open state
pub const DEFAULT_HALF_OPEN_MAX_REQUESTS: u32 = 3;
