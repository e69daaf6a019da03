// Logging module for structured logging using the tracing crate

use std::error::Error;
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

use crate::config::{LogFormat, LoggingConfig};

/// Build the level filter: `RUST_LOG` when set and valid, otherwise the
/// configured level.
pub fn build_filter(config: &LoggingConfig) -> EnvFilter {
    std::env::var("RUST_LOG")
        .ok()
        .and_then(|_| EnvFilter::try_from_default_env().ok())
        .unwrap_or_else(|| EnvFilter::new(&config.level))
}

/// Initialize the tracing subscriber for structured logging
///
/// The subscriber is configured with:
/// - Text or JSON formatting, per `logging.format`
/// - Level filtering from `logging.level`, overridden by `RUST_LOG`
/// - Output to stdout
///
/// # Errors
///
/// Returns an error if a global subscriber is already installed, for
/// example when called twice.
///
/// # Examples
///
/// ```
/// use bossbar::config::LoggingConfig;
/// use bossbar::logging::init_subscriber;
///
/// init_subscriber(&LoggingConfig::default()).expect("Failed to initialize logging");
/// tracing::info!("Application started");
/// ```
pub fn init_subscriber(config: &LoggingConfig) -> Result<(), Box<dyn Error + Send + Sync>> {
    let filter = build_filter(config);

    match config.format {
        LogFormat::Json => tracing_subscriber::registry()
            .with(filter)
            .with(fmt::layer().json().with_current_span(false))
            .try_init()?,
        LogFormat::Text => tracing_subscriber::registry()
            .with(filter)
            .with(fmt::layer().with_target(true))
            .try_init()?,
    }

    Ok(())
}
