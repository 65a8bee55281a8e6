//! Observability infrastructure for the longevity predictor
//!
//! Provides:
//! - Prometheus metrics (prediction latency, source fetch latency, outcomes, model info)
//! - Structured JSON logging with tracing

use prometheus::{
    register_gauge_vec, register_histogram, register_histogram_vec, register_int_counter,
    register_int_counter_vec, register_int_gauge, GaugeVec, Histogram, HistogramVec, IntCounter,
    IntCounterVec, IntGauge,
};
use std::sync::OnceLock;
use tracing::{info, warn};

/// Histogram buckets for request latencies (in seconds). Store catalogs
/// are remote, so the range is much wider than for local inference.
const LATENCY_BUCKETS: &[f64] = &[
    0.001, 0.005, 0.01, 0.05, 0.1, 0.25, 0.5, 1.0, 2.5, 5.0, 10.0, 30.0,
];

/// Global metrics instance (registered once)
static GLOBAL_METRICS: OnceLock<ServiceMetricsInner> = OnceLock::new();

struct ServiceMetricsInner {
    prediction_latency_seconds: Histogram,
    source_latency_seconds: HistogramVec,
    predictions_generated: IntCounter,
    prediction_errors: IntCounterVec,
    source_failures: IntCounterVec,
    models_discovered: IntGauge,
    model_info: GaugeVec,
}

impl ServiceMetricsInner {
    fn new() -> Self {
        Self {
            prediction_latency_seconds: register_histogram!(
                "longevity_prediction_latency_seconds",
                "End-to-end time spent on one prediction request",
                LATENCY_BUCKETS.to_vec()
            )
            .expect("Failed to register prediction_latency_seconds"),

            source_latency_seconds: register_histogram_vec!(
                "longevity_source_latency_seconds",
                "Time spent fetching an app record from a store catalog",
                &["platform"],
                LATENCY_BUCKETS.to_vec()
            )
            .expect("Failed to register source_latency_seconds"),

            predictions_generated: register_int_counter!(
                "longevity_predictions_generated_total",
                "Total number of successful predictions"
            )
            .expect("Failed to register predictions_generated"),

            prediction_errors: register_int_counter_vec!(
                "longevity_prediction_errors_total",
                "Total number of failed predictions by error kind",
                &["kind"]
            )
            .expect("Failed to register prediction_errors"),

            source_failures: register_int_counter_vec!(
                "longevity_source_failures_total",
                "Store catalog fetches that errored or timed out",
                &["platform"]
            )
            .expect("Failed to register source_failures"),

            models_discovered: register_int_gauge!(
                "longevity_models_discovered",
                "Number of models in the artifact registry"
            )
            .expect("Failed to register models_discovered"),

            model_info: register_gauge_vec!(
                "longevity_model_info",
                "Information about the currently loaded model",
                &["name", "kind"]
            )
            .expect("Failed to register model_info"),
        }
    }
}

/// Service metrics for Prometheus exposition
///
/// This is a lightweight handle to the global metrics instance.
/// Multiple clones share the same underlying metrics.
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
    /// Create a new metrics handle (initializes global metrics if needed)
    pub fn new() -> Self {
        GLOBAL_METRICS.get_or_init(ServiceMetricsInner::new);
        Self { _private: () }
    }

    fn inner(&self) -> &ServiceMetricsInner {
        GLOBAL_METRICS.get().expect("Metrics not initialized")
    }

    pub fn observe_prediction_latency(&self, duration_secs: f64) {
        self.inner().prediction_latency_seconds.observe(duration_secs);
    }

    pub fn observe_source_latency(&self, platform: &str, duration_secs: f64) {
        self.inner()
            .source_latency_seconds
            .with_label_values(&[platform])
            .observe(duration_secs);
    }

    pub fn inc_predictions_generated(&self) {
        self.inner().predictions_generated.inc();
    }

    pub fn inc_prediction_errors(&self, kind: &str) {
        self.inner().prediction_errors.with_label_values(&[kind]).inc();
    }

    pub fn inc_source_failures(&self, platform: &str) {
        self.inner().source_failures.with_label_values(&[platform]).inc();
    }

    pub fn set_models_discovered(&self, count: i64) {
        self.inner().models_discovered.set(count);
    }

    /// Update loaded model info
    pub fn set_model_info(&self, name: &str, kind: &str) {
        // Only one model is loaded at a time
        self.inner().model_info.reset();
        self.inner()
            .model_info
            .with_label_values(&[name, kind])
            .set(1.0);
    }
}

/// Structured logger for service events
///
/// Provides consistent JSON-formatted logging for predictions, model
/// loads and lifecycle events.
#[derive(Clone)]
pub struct StructuredLogger {
    node_name: String,
}

impl StructuredLogger {
    pub fn new(node_name: impl Into<String>) -> Self {
        Self {
            node_name: node_name.into(),
        }
    }

    /// Log a successful prediction
    pub fn log_prediction(
        &self,
        app_name: &str,
        platform: &str,
        score: f64,
        category: &str,
        model_used: &str,
        duration_ms: u128,
    ) {
        info!(
            event = "prediction_generated",
            node = %self.node_name,
            app_name = %app_name,
            platform = %platform,
            score = score,
            category = %category,
            model_used = %model_used,
            duration_ms = duration_ms as u64,
            "Generated longevity prediction"
        );
    }

    /// Log a failed prediction
    pub fn log_prediction_failure(&self, app_name: &str, kind: &str, error: &str) {
        warn!(
            event = "prediction_failed",
            node = %self.node_name,
            app_name = %app_name,
            kind = %kind,
            error = %error,
            "Prediction failed"
        );
    }

    /// Log a model (re)load
    pub fn log_model_loaded(&self, name: &str, kind: &str, checksum: &str) {
        info!(
            event = "model_loaded",
            node = %self.node_name,
            model = %name,
            kind = %kind,
            checksum = %checksum,
            "Prediction model loaded"
        );
    }

    pub fn log_startup(&self, version: &str, model_count: usize) {
        info!(
            event = "service_started",
            node = %self.node_name,
            service_version = %version,
            model_count = model_count,
            "Longevity service started"
        );
    }

    pub fn log_shutdown(&self, reason: &str) {
        info!(
            event = "service_shutdown",
            node = %self.node_name,
            reason = %reason,
            "Longevity service shutting down"
        );
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_service_metrics_creation() {
        let metrics = ServiceMetrics::new();

        metrics.observe_prediction_latency(0.2);
        metrics.observe_source_latency("iOS", 0.1);
        metrics.inc_predictions_generated();
        metrics.inc_prediction_errors("no_source_data");
        metrics.inc_source_failures("Android");
        metrics.set_models_discovered(3);
        metrics.set_model_info("rf_model", "tree_ensemble");

        // A second handle shares the same registered metrics
        let again = ServiceMetrics::new();
        again.set_models_discovered(4);
    }

    #[test]
    fn test_structured_logger_creation() {
        let logger = StructuredLogger::new("test-node");
        assert_eq!(logger.node_name, "test-node");
    }
}
