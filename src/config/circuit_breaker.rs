//! Circuit breaker settings for the cache facade.
//!
//! Lives under `cache.circuit_breaker` in the YAML file. Defaults come from
//! `crate::constants`.

use serde::{Deserialize, Serialize};
use std::time::Duration;

use crate::circuit_breaker::CircuitBreakerConfig;
use crate::constants::{
    DEFAULT_CB_TIMEOUT_SECS, DEFAULT_FAILURE_THRESHOLD, DEFAULT_HALF_OPEN_MAX_REQUESTS,
    DEFAULT_SUCCESS_THRESHOLD,
};

fn default_failure_threshold() -> u32 {
    DEFAULT_FAILURE_THRESHOLD
}

fn default_success_threshold() -> u32 {
    DEFAULT_SUCCESS_THRESHOLD
}

fn default_timeout_seconds() -> u64 {
    DEFAULT_CB_TIMEOUT_SECS
}

fn default_half_open_max_requests() -> u32 {
    DEFAULT_HALF_OPEN_MAX_REQUESTS
}

/// Circuit breaker settings (YAML format)
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CircuitBreakerSettings {
    /// Consecutive connectivity failures before the circuit opens
    #[serde(default = "default_failure_threshold")]
    pub failure_threshold: u32,
    /// Successful trial calls in half-open before the circuit closes
    #[serde(default = "default_success_threshold")]
    pub success_threshold: u32,
    /// Seconds the circuit stays open before probing
    #[serde(default = "default_timeout_seconds")]
    pub timeout_seconds: u64,
    /// Max concurrent trial calls in half-open state
    #[serde(default = "default_half_open_max_requests")]
    pub half_open_max_requests: u32,
}

impl Default for CircuitBreakerSettings {
    fn default() -> Self {
        Self {
            failure_threshold: DEFAULT_FAILURE_THRESHOLD,
            success_threshold: DEFAULT_SUCCESS_THRESHOLD,
            timeout_seconds: DEFAULT_CB_TIMEOUT_SECS,
            half_open_max_requests: DEFAULT_HALF_OPEN_MAX_REQUESTS,
        }
    }
}

impl CircuitBreakerSettings {
    /// Runtime breaker configuration
    pub fn to_circuit_breaker_config(&self) -> CircuitBreakerConfig {
        CircuitBreakerConfig {
            failure_threshold: self.failure_threshold,
            success_threshold: self.success_threshold,
            timeout_duration: Duration::from_secs(self.timeout_seconds),
            half_open_max_requests: self.half_open_max_requests,
        }
    }

    pub fn validate(&self) -> Result<(), String> {
        if self.failure_threshold == 0 {
            return Err("circuit_breaker.failure_threshold must be at least 1".to_string());
        }
        if self.success_threshold == 0 {
            return Err("circuit_breaker.success_threshold must be at least 1".to_string());
        }
        if self.half_open_max_requests == 0 {
            return Err("circuit_breaker.half_open_max_requests must be at least 1".to_string());
        }
        Ok(())
    }
}
