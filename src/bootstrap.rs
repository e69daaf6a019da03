// Startup sequence: logging first, then the cache client.

use std::sync::Arc;

use crate::cache::{CacheClient, CacheError};
use crate::config::AppConfig;
use crate::logging;

/// Builds the shared cache client from validated settings.
///
/// A startup failure is logged and the client comes up disabled, so the
/// application keeps serving without a cache. Use [`CacheClient::connect`]
/// directly to treat the failure as fatal.
pub async fn init_cache(config: &AppConfig) -> Arc<CacheClient> {
    let settings = &config.cache;
    match CacheClient::connect(settings).await {
        Ok(client) => {
            tracing::info!(
                adapter = %settings.adapter,
                prefix = %settings.redis_prefix,
                "Cache initialized"
            );
            Arc::new(client)
        }
        Err(e) => {
            tracing::error!(
                adapter = %settings.adapter,
                host = %settings.redis_host,
                error = %e,
                "Cache initialization failed, running without cache"
            );
            Arc::new(CacheClient::disabled())
        }
    }
}

/// Installs logging and then the cache.
///
/// # Errors
/// Returns the logging error, or the configuration error when `strict` and the
/// cache could not be started.
pub async fn init(config: &AppConfig, strict: bool) -> Result<Arc<CacheClient>, BootstrapError> {
    logging::init_subscriber(&config.logging)
        .map_err(|e| BootstrapError::Logging(e.to_string()))?;

    let client = if strict {
        Arc::new(CacheClient::connect(&config.cache).await?)
    } else {
        init_cache(config).await
    };

    tracing::info!(
        app = %config.app.name,
        run_mode = %config.app.run_mode,
        cache_configured = client.is_configured(),
        "initialized"
    );
    Ok(client)
}

#[derive(Debug, thiserror::Error)]
pub enum BootstrapError {
    #[error("logging setup failed: {0}")]
    Logging(String),

    #[error(transparent)]
    Cache(#[from] CacheError),
}
