// Redis cache adapter module
//
// Registered under the name "redis". Keys are namespaced as `{prefix}:{key}`
// and every connection is authenticated and pointed at the configured
// database before use.

pub mod cache;
pub mod config;
pub mod key;
pub mod pool;

pub use cache::RedisCache;
pub use config::RedisConfig;
pub use key::KeyNamespace;
pub use pool::{build_pool, trim_idle, RedisConnectionManager, RedisPool};
