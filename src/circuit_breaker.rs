//! Failure gate in front of the cache adapter
//!
//! Every facade call asks the breaker for a [`Permit`] before touching the
//! adapter and hands the outcome back through that permit.
//!
//! Phases:
//! - **Closed**: calls pass; consecutive connectivity failures are counted
//! - **Open**: calls are refused until `timeout_duration` has passed
//! - **Half-Open**: a bounded number of trial calls decide between
//!   closing (after `success_threshold` good trials) and reopening (first bad one)
//! - **Tripped**: the adapter panicked; nothing passes until `reset`
//!
//! A permit dropped without an outcome (a cancelled call) gives its trial
//! slot back and changes nothing else. Outcomes reported after the breaker
//! has moved to another phase are ignored.

use parking_lot::Mutex;
use std::sync::Arc;
use std::time::{Duration, Instant};

use crate::constants::{
    DEFAULT_CB_TIMEOUT_SECS, DEFAULT_FAILURE_THRESHOLD, DEFAULT_HALF_OPEN_MAX_REQUESTS,
    DEFAULT_SUCCESS_THRESHOLD,
};

/// Externally visible breaker phase
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CircuitState {
    Closed,
    Open,
    HalfOpen,
    Tripped,
}

impl CircuitState {
    pub fn as_str(&self) -> &'static str {
        match self {
            CircuitState::Closed => "closed",
            CircuitState::Open => "open",
            CircuitState::HalfOpen => "half-open",
            CircuitState::Tripped => "tripped",
        }
    }
}

impl std::fmt::Display for CircuitState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Circuit breaker configuration
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CircuitBreakerConfig {
    /// Consecutive connectivity failures that open the circuit
    pub failure_threshold: u32,
    /// Successful trial calls needed to close it again
    pub success_threshold: u32,
    /// Time spent open before trial calls are let through
    pub timeout_duration: Duration,
    /// Trial calls allowed in flight at once
    pub half_open_max_requests: u32,
}

impl Default for CircuitBreakerConfig {
    fn default() -> Self {
        Self {
            failure_threshold: DEFAULT_FAILURE_THRESHOLD,
            success_threshold: DEFAULT_SUCCESS_THRESHOLD,
            timeout_duration: Duration::from_secs(DEFAULT_CB_TIMEOUT_SECS),
            half_open_max_requests: DEFAULT_HALF_OPEN_MAX_REQUESTS,
        }
    }
}

#[derive(Debug)]
enum Phase {
    Closed { failures: u32 },
    /// `None` when the cool-down is too long to represent
    Open { until: Option<Instant> },
    HalfOpen { in_flight: u32, passed: u32 },
    Tripped,
}

#[derive(Debug)]
struct Gate {
    phase: Phase,
    /// Bumped on every phase change; permits from an older epoch are stale
    epoch: u64,
}

impl Gate {
    fn enter(&mut self, phase: Phase) {
        self.phase = phase;
        self.epoch = self.epoch.wrapping_add(1);
    }
}

/// Shared breaker handle; clones observe and drive the same gate.
#[derive(Debug, Clone)]
pub struct CircuitBreaker {
    gate: Arc<Mutex<Gate>>,
    config: Arc<CircuitBreakerConfig>,
}

/// Admission for one adapter call
///
/// Report the result with [`Permit::succeeded`] or [`Permit::failed`].
#[derive(Debug)]
#[must_use = "a permit reports the outcome of the call it admitted"]
pub struct Permit {
    breaker: CircuitBreaker,
    epoch: u64,
    trial: bool,
    settled: bool,
}

impl Permit {
    pub fn is_trial(&self) -> bool {
        self.trial
    }

    /// The call reached the store and got an answer.
    pub fn succeeded(mut self) {
        self.settled = true;
        self.breaker.settle(self.epoch, self.trial, true);
    }

    /// The call could not reach the store.
    pub fn failed(mut self) {
        self.settled = true;
        self.breaker.settle(self.epoch, self.trial, false);
    }
}

impl Drop for Permit {
    fn drop(&mut self) {
        if !self.settled && self.trial {
            self.breaker.abandon(self.epoch);
        }
    }
}

impl CircuitBreaker {
    pub fn new(config: CircuitBreakerConfig) -> Self {
        Self {
            gate: Arc::new(Mutex::new(Gate {
                phase: Phase::Closed { failures: 0 },
                epoch: 0,
            })),
            config: Arc::new(config),
        }
    }

    pub fn config(&self) -> &CircuitBreakerConfig {
        &self.config
    }

    pub fn state(&self) -> CircuitState {
        match self.gate.lock().phase {
            Phase::Closed { .. } => CircuitState::Closed,
            Phase::Open { .. } => CircuitState::Open,
            Phase::HalfOpen { .. } => CircuitState::HalfOpen,
            Phase::Tripped => CircuitState::Tripped,
        }
    }

    /// Consecutive failures counted while closed
    pub fn failures(&self) -> u32 {
        match self.gate.lock().phase {
            Phase::Closed { failures } => failures,
            _ => 0,
        }
    }

    /// Admits a call, or returns the phase that refused it.
    pub fn admit(&self) -> Result<Permit, CircuitState> {
        let mut gate = self.gate.lock();

        if let Phase::Open { until } = gate.phase {
            if until.map_or(true, |at| Instant::now() < at) {
                return Err(CircuitState::Open);
            }
            tracing::info!("Cache circuit cooled down, admitting trial calls");
            gate.enter(Phase::HalfOpen {
                in_flight: 0,
                passed: 0,
            });
        }

        let trial = match &mut gate.phase {
            Phase::Closed { .. } => false,
            Phase::HalfOpen { in_flight, .. } => {
                if *in_flight >= self.config.half_open_max_requests {
                    return Err(CircuitState::HalfOpen);
                }
                *in_flight += 1;
                true
            }
            Phase::Tripped => return Err(CircuitState::Tripped),
            Phase::Open { .. } => return Err(CircuitState::Open),
        };

        Ok(Permit {
            breaker: self.clone(),
            epoch: gate.epoch,
            trial,
            settled: false,
        })
    }

    /// Latches the circuit off until [`CircuitBreaker::reset`].
    pub fn trip(&self) {
        let mut gate = self.gate.lock();
        if !matches!(gate.phase, Phase::Tripped) {
            tracing::error!("Cache circuit tripped");
            gate.enter(Phase::Tripped);
        }
    }

    /// Closes the circuit and forgets all counts.
    pub fn reset(&self) {
        let mut gate = self.gate.lock();
        tracing::info!(previous = ?gate.phase, "Cache circuit reset");
        gate.enter(Phase::Closed { failures: 0 });
    }

    fn settle(&self, epoch: u64, trial: bool, ok: bool) {
        let mut gate = self.gate.lock();
        if gate.epoch != epoch {
            return;
        }

        let open_until = Instant::now().checked_add(self.config.timeout_duration);
        match (&mut gate.phase, ok) {
            (Phase::Closed { failures }, true) => *failures = 0,
            (Phase::Closed { failures }, false) => {
                *failures += 1;
                tracing::warn!(
                    failures = *failures,
                    threshold = self.config.failure_threshold,
                    "Cache store unreachable"
                );
                if *failures >= self.config.failure_threshold {
                    tracing::error!("Cache circuit opened");
                    gate.enter(Phase::Open { until: open_until });
                }
            }
            (Phase::HalfOpen { in_flight, passed }, true) if trial => {
                *in_flight = in_flight.saturating_sub(1);
                *passed += 1;
                if *passed >= self.config.success_threshold {
                    tracing::info!("Cache circuit closed, store recovered");
                    gate.enter(Phase::Closed { failures: 0 });
                }
            }
            (Phase::HalfOpen { .. }, false) if trial => {
                tracing::warn!("Trial call failed, cache circuit reopened");
                gate.enter(Phase::Open { until: open_until });
            }
            _ => {}
        }
    }

    fn abandon(&self, epoch: u64) {
        let mut gate = self.gate.lock();
        if gate.epoch != epoch {
            return;
        }
        if let Phase::HalfOpen { in_flight, .. } = &mut gate.phase {
            *in_flight = in_flight.saturating_sub(1);
        }
    }
}

impl Default for CircuitBreaker {
    fn default() -> Self {
        Self::new(CircuitBreakerConfig::default())
    }
}
