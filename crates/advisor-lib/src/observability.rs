//! Observability infrastructure for the advisory service
//!
//! Prometheus metrics: request outcomes per endpoint, inference latency per
//! model, generation retry/fallback counters, and history write failures.

use prometheus::{
    register_histogram_vec, register_int_counter, register_int_counter_vec,
    register_int_gauge_vec, HistogramVec, IntCounter, IntCounterVec, IntGaugeVec,
};
use std::sync::OnceLock;

/// Histogram buckets for inference latency in seconds. Image inference on
/// CPU sits in the tens-to-hundreds of milliseconds.
const LATENCY_BUCKETS: &[f64] = &[
    0.001, 0.0025, 0.005, 0.01, 0.025, 0.05, 0.1, 0.25, 0.5, 1.0, 2.5,
];

/// Global metrics instance (registered once)
static GLOBAL_METRICS: OnceLock<ServiceMetricsInner> = OnceLock::new();

struct ServiceMetricsInner {
    requests_total: IntCounterVec,
    inference_latency_seconds: HistogramVec,
    generation_attempts_total: IntCounter,
    generation_fallbacks_total: IntCounter,
    history_failures_total: IntCounter,
    model_loaded: IntGaugeVec,
}

impl ServiceMetricsInner {
    fn new() -> Self {
        Self {
            requests_total: register_int_counter_vec!(
                "agrimind_requests_total",
                "API requests by endpoint and outcome",
                &["endpoint", "outcome"]
            )
            .expect("Failed to register requests_total"),

            inference_latency_seconds: register_histogram_vec!(
                "agrimind_inference_latency_seconds",
                "Time spent running model inference",
                &["model"],
                LATENCY_BUCKETS.to_vec()
            )
            .expect("Failed to register inference_latency_seconds"),

            generation_attempts_total: register_int_counter!(
                "agrimind_generation_attempts_total",
                "Text-generation endpoint attempts, including retries"
            )
            .expect("Failed to register generation_attempts_total"),

            generation_fallbacks_total: register_int_counter!(
                "agrimind_generation_fallbacks_total",
                "Times the primary generation endpoint was exhausted"
            )
            .expect("Failed to register generation_fallbacks_total"),

            history_failures_total: register_int_counter!(
                "agrimind_history_failures_total",
                "Best-effort history writes that failed"
            )
            .expect("Failed to register history_failures_total"),

            model_loaded: register_int_gauge_vec!(
                "agrimind_model_loaded",
                "Whether a model artifact loaded at startup (1/0)",
                &["model"]
            )
            .expect("Failed to register model_loaded"),
        }
    }
}

/// Service metrics for Prometheus exposition.
///
/// This is a lightweight handle to the global metrics instance; multiple
/// clones share the same underlying metrics.
#[derive(Clone)]
pub struct ServiceMetrics {
    _private: (),
}

impl Default for ServiceMetrics {
    fn default() -> Self {
        Self::new()
    }
}

impl ServiceMetrics {
    pub fn new() -> Self {
        GLOBAL_METRICS.get_or_init(ServiceMetricsInner::new);
        Self { _private: () }
    }

    fn inner(&self) -> &ServiceMetricsInner {
        GLOBAL_METRICS.get().expect("Metrics not initialized")
    }

    /// Count one finished request.
    pub fn inc_request(&self, endpoint: &str, outcome: &str) {
        self.inner()
            .requests_total
            .with_label_values(&[endpoint, outcome])
            .inc();
    }

    /// Record one inference latency observation.
    pub fn observe_inference_latency(&self, model: &str, duration_secs: f64) {
        self.inner()
            .inference_latency_seconds
            .with_label_values(&[model])
            .observe(duration_secs);
    }

    pub fn inc_generation_attempts(&self) {
        self.inner().generation_attempts_total.inc();
    }

    pub fn inc_generation_fallbacks(&self) {
        self.inner().generation_fallbacks_total.inc();
    }

    pub fn inc_history_failures(&self) {
        self.inner().history_failures_total.inc();
    }

    /// Record a model slot's load outcome.
    pub fn set_model_loaded(&self, model: &str, loaded: bool) {
        self.inner()
            .model_loaded
            .with_label_values(&[model])
            .set(i64::from(loaded));
    }
}
