//! Cache error types
//!
//! One taxonomy shared by every adapter, the registry and the facade.

use thiserror::Error;

/// Cache error types
#[derive(Error, Debug)]
pub enum CacheError {
    /// No adapter registered under this name
    #[error("cache: unknown adapter name {0:?} (forgot to register it?)")]
    UnknownAdapter(String),

    /// An adapter with this name is already registered
    #[error("cache: register called twice for adapter {0:?}")]
    DuplicateAdapter(String),

    /// Configuration error (bad adapter config, missing connection info)
    #[error("Configuration error: {0}")]
    Configuration(String),

    /// Could not obtain a connection (dial failure, pool exhausted, dropped link)
    #[error("Connection failed: {0}")]
    Connection(String),

    /// AUTH was rejected by the store
    #[error("Authentication failed: {0}")]
    Authentication(String),

    /// SELECT of the configured database failed
    #[error("Database selection failed: {0}")]
    DatabaseSelection(String),

    /// The store rejected the command (wrong type, not an integer, syntax)
    #[error("Command error: {0}")]
    Command(String),

    /// The reply did not have the shape the operation expects
    #[error("Unexpected reply: {0}")]
    UnexpectedReply(String),

    /// A conditional set did not write
    #[error("Set precondition not met")]
    ConditionNotMet,

    /// Key absent where a value was required
    #[error("Cache entry not found: {0}")]
    NotFound(String),

    /// Serialization/deserialization error
    #[error("Serialization error: {0}")]
    Serialization(String),

    /// No adapter installed in the facade
    #[error("cache is not configured")]
    NotConfigured,

    /// Facade circuit breaker is rejecting calls
    #[error("cache circuit is open")]
    CircuitOpen,

    /// The adapter panicked while serving a call
    #[error("adapter fault: {0}")]
    AdapterFault(String),

    /// ClearAll stopped part way; earlier deletions are not rolled back
    #[error("clear stopped after deleting {deleted} keys: {reason}")]
    ClearIncomplete {
        deleted: usize,
        reason: Box<CacheError>,
    },
}

impl CacheError {
    /// Whether the error means the store could not be reached at all.
    pub fn is_connectivity(&self) -> bool {
        matches!(
            self,
            CacheError::Connection(_)
                | CacheError::Authentication(_)
                | CacheError::DatabaseSelection(_)
        )
    }

    /// Whether the error is raised by startup/registration rather than by an operation.
    pub fn is_configuration(&self) -> bool {
        matches!(
            self,
            CacheError::UnknownAdapter(_)
                | CacheError::DuplicateAdapter(_)
                | CacheError::Configuration(_)
        )
    }
}

impl From<redis::RedisError> for CacheError {
    fn from(err: redis::RedisError) -> Self {
        use redis::ErrorKind;

        if err.is_io_error()
            || err.is_connection_dropped()
            || err.is_connection_refusal()
            || err.is_timeout()
        {
            return CacheError::Connection(err.to_string());
        }

        match err.kind() {
            ErrorKind::AuthenticationFailed => CacheError::Authentication(err.to_string()),
            ErrorKind::TypeError => CacheError::UnexpectedReply(err.to_string()),
            ErrorKind::InvalidClientConfig => CacheError::Configuration(err.to_string()),
            _ => CacheError::Command(err.to_string()),
        }
    }
}

impl From<rmp_serde::encode::Error> for CacheError {
    fn from(err: rmp_serde::encode::Error) -> Self {
        CacheError::Serialization(format!("MessagePack encoding failed: {}", err))
    }
}

impl From<rmp_serde::decode::Error> for CacheError {
    fn from(err: rmp_serde::decode::Error) -> Self {
        CacheError::Serialization(format!("MessagePack decoding failed: {}", err))
    }
}

impl From<serde_json::Error> for CacheError {
    fn from(err: serde_json::Error) -> Self {
        CacheError::Configuration(format!("invalid adapter config: {}", err))
    }
}
