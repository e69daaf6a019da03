// Cache module
//
// Pluggable cache adapters behind one `Cache` trait, a name-based registry,
// a versioned value codec and the panic-tolerant `CacheClient` facade.

pub mod codec;
pub mod error;
pub mod facade;
pub mod memory;
pub mod metrics;
pub mod redis;
pub mod registry;
pub mod traits;

pub use error::CacheError;
pub use facade::CacheClient;
pub use memory::MemoryCache;
pub use metrics::{CacheMetrics, Outcome};
pub use redis::RedisCache;
pub use registry::{new_cache, register, CacheFactory, Registry};
pub use traits::{Cache, SetCondition, SetOptions};
