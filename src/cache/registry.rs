//! Adapter registry
//!
//! Maps adapter names to factories that produce unconfigured adapters.
//! [`new_cache`] looks a name up, instantiates the adapter and starts it with
//! the caller's JSON config.
//!
//! A process-wide registry backs the free functions. It is seeded with the
//! built-in adapters on first use; further adapters are registered during
//! startup, before any traffic is served.

use parking_lot::RwLock;
use std::collections::HashMap;
use std::fmt;
use std::sync::{Arc, OnceLock};

use super::error::CacheError;
use super::memory::MemoryCache;
use super::redis::RedisCache;
use super::traits::Cache;
use crate::constants::{MEMORY_ADAPTER, REDIS_ADAPTER};

/// Produces a fresh, unconfigured adapter
pub type CacheFactory = Arc<dyn Fn() -> Box<dyn Cache> + Send + Sync>;

/// Name to factory table
#[derive(Clone, Default)]
pub struct Registry {
    factories: HashMap<String, CacheFactory>,
}

impl Registry {
    /// Empty registry
    pub fn new() -> Self {
        Self::default()
    }

    /// Registry seeded with the "redis" and "memory" adapters
    pub fn with_builtin() -> Self {
        let mut registry = Self::new();
        registry
            .factories
            .insert(REDIS_ADAPTER.to_string(), Arc::new(RedisCache::instance));
        registry
            .factories
            .insert(MEMORY_ADAPTER.to_string(), Arc::new(MemoryCache::instance));
        registry
    }

    /// # Errors
    /// Returns CacheError::DuplicateAdapter if `name` is already registered;
    /// the existing factory is kept.
    pub fn register<F>(&mut self, name: &str, factory: F) -> Result<(), CacheError>
    where
        F: Fn() -> Box<dyn Cache> + Send + Sync + 'static,
    {
        if self.factories.contains_key(name) {
            return Err(CacheError::DuplicateAdapter(name.to_string()));
        }
        self.factories.insert(name.to_string(), Arc::new(factory));
        tracing::debug!(adapter = name, "Registered cache adapter");
        Ok(())
    }

    /// # Errors
    /// Returns CacheError::UnknownAdapter if nothing is registered under `name`
    pub fn lookup(&self, name: &str) -> Result<CacheFactory, CacheError> {
        self.factories
            .get(name)
            .cloned()
            .ok_or_else(|| CacheError::UnknownAdapter(name.to_string()))
    }

    pub fn contains(&self, name: &str) -> bool {
        self.factories.contains_key(name)
    }

    /// Registered names, sorted
    pub fn names(&self) -> Vec<String> {
        let mut names: Vec<String> = self.factories.keys().cloned().collect();
        names.sort();
        names
    }

    /// Instantiates and starts the adapter registered under `name`.
    ///
    /// A failed start drops the half-built instance and returns the error.
    pub async fn new_cache(&self, name: &str, config: &str) -> Result<Box<dyn Cache>, CacheError> {
        let factory = self.lookup(name)?;
        start(name, factory, config).await
    }
}

impl fmt::Debug for Registry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Registry")
            .field("adapters", &self.names())
            .finish()
    }
}

async fn start(
    name: &str,
    factory: CacheFactory,
    config: &str,
) -> Result<Box<dyn Cache>, CacheError> {
    let mut adapter = factory();
    if let Err(e) = adapter.start_and_gc(config).await {
        tracing::error!(adapter = name, error = %e, "Cache adapter failed to start");
        return Err(e);
    }
    tracing::info!(adapter = name, "Cache adapter started");
    Ok(adapter)
}

static GLOBAL: OnceLock<RwLock<Registry>> = OnceLock::new();

fn global() -> &'static RwLock<Registry> {
    GLOBAL.get_or_init(|| RwLock::new(Registry::with_builtin()))
}

/// Registers an adapter in the process-wide registry.
///
/// # Errors
/// Returns CacheError::DuplicateAdapter if `name` is taken. Startup code
/// should treat this as fatal.
pub fn register<F>(name: &str, factory: F) -> Result<(), CacheError>
where
    F: Fn() -> Box<dyn Cache> + Send + Sync + 'static,
{
    global().write().register(name, factory)
}

/// Whether `name` is registered in the process-wide registry
pub fn is_registered(name: &str) -> bool {
    global().read().contains(name)
}

/// Creates and starts an adapter from the process-wide registry.
///
/// # Errors
/// Returns CacheError::UnknownAdapter for an unregistered name, or whatever
/// the adapter's `start_and_gc` returned.
pub async fn new_cache(name: &str, config: &str) -> Result<Box<dyn Cache>, CacheError> {
    // the lock guard must not live across the await below
    let factory = global().read().lookup(name)?;
    start(name, factory, config).await
}
