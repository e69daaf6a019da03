// Cache operation Prometheus metrics
//
// Recorded by the facade around every adapter call:
// - Operation counters by operation name and outcome
// - Operation latency histograms

use prometheus::{
    register_histogram_vec, register_int_counter_vec, Encoder, Histogram, HistogramVec,
    IntCounterVec, TextEncoder,
};
use std::sync::OnceLock;

/// How a facade call ended
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Outcome {
    /// Adapter returned a value (or a write succeeded)
    Ok,
    /// Read of an absent key
    Miss,
    /// Adapter returned an error
    Error,
    /// Rejected without calling the adapter (not configured, circuit open)
    Rejected,
    /// Adapter panicked
    Fault,
}

impl Outcome {
    pub fn as_str(&self) -> &'static str {
        match self {
            Outcome::Ok => "ok",
            Outcome::Miss => "miss",
            Outcome::Error => "error",
            Outcome::Rejected => "rejected",
            Outcome::Fault => "fault",
        }
    }
}

/// Process-wide cache metrics
pub struct CacheMetrics {
    /// Calls by `operation` and `outcome`
    pub operations: IntCounterVec,

    /// Adapter call latency by `operation` (in seconds)
    pub operation_duration: HistogramVec,
}

static METRICS: OnceLock<Option<CacheMetrics>> = OnceLock::new();

impl CacheMetrics {
    fn register() -> prometheus::Result<Self> {
        let operations = register_int_counter_vec!(
            "bossbar_cache_operations_total",
            "Total number of cache operations by operation and outcome",
            &["operation", "outcome"]
        )?;

        let operation_duration = register_histogram_vec!(
            "bossbar_cache_operation_duration_seconds",
            "Duration of cache adapter calls in seconds",
            &["operation"],
            vec![0.0001, 0.0005, 0.001, 0.005, 0.01, 0.05, 0.1, 0.5, 1.0, 5.0] // 0.1ms to 5s
        )?;

        Ok(CacheMetrics {
            operations,
            operation_duration,
        })
    }

    /// Global metrics, registered in the default registry on first use.
    ///
    /// Returns `None` if registration failed (a collector with the same name
    /// was registered elsewhere); metrics are then skipped, never fatal.
    pub fn global() -> Option<&'static Self> {
        METRICS
            .get_or_init(|| match Self::register() {
                Ok(metrics) => Some(metrics),
                Err(e) => {
                    tracing::warn!(error = %e, "Cache metrics disabled");
                    None
                }
            })
            .as_ref()
    }

    pub fn record(&self, operation: &str, outcome: Outcome) {
        self.operations
            .with_label_values(&[operation, outcome.as_str()])
            .inc();
    }

    /// Current count for one operation/outcome pair
    pub fn count(&self, operation: &str, outcome: Outcome) -> u64 {
        self.operations
            .with_label_values(&[operation, outcome.as_str()])
            .get()
    }

    /// Start timing an adapter call; the duration is observed on drop.
    pub fn start_timer(&self, operation: &str) -> OperationTimer {
        OperationTimer {
            histogram: self.operation_duration.with_label_values(&[operation]),
            start: std::time::Instant::now(),
        }
    }
}

/// RAII timer for the operation histogram
pub struct OperationTimer {
    histogram: Histogram,
    start: std::time::Instant,
}

impl Drop for OperationTimer {
    fn drop(&mut self) {
        self.histogram.observe(self.start.elapsed().as_secs_f64());
    }
}

/// Default registry in Prometheus text format
pub fn render_text() -> String {
    let mut buffer = Vec::new();
    if let Err(e) = TextEncoder::new().encode(&prometheus::gather(), &mut buffer) {
        tracing::warn!(error = %e, "Failed to encode metrics");
    }
    String::from_utf8_lossy(&buffer).into_owned()
}
