//! Observability infrastructure for the prediction service
//!
//! Provides:
//! - Prometheus metrics (request counts and latency, prediction latency, loaded model)
//! - Structured JSON logging with tracing

use crate::models::FeatureRecord;
use prometheus::{
    register_gauge_vec, register_histogram, register_histogram_vec, register_int_counter,
    register_int_counter_vec, register_int_gauge, GaugeVec, Histogram, HistogramVec, IntCounter,
    IntCounterVec, IntGauge,
};
use std::sync::OnceLock;
use tracing::{error, info, warn};

/// Histogram buckets for latency measurements (in seconds)
const LATENCY_BUCKETS: &[f64] = &[
    0.0001, 0.0005, 0.001, 0.0025, 0.005, 0.01, 0.025, 0.05, 0.1, 0.25, 0.5, 1.0,
];

/// Global metrics instance (registered once)
static GLOBAL_METRICS: OnceLock<ServiceMetricsInner> = OnceLock::new();

struct ServiceMetricsInner {
    http_requests_total: IntCounterVec,
    http_request_duration_seconds: HistogramVec,
    prediction_latency_seconds: Histogram,
    predictions_total: IntCounter,
    prediction_errors_total: IntCounter,
    model_info: GaugeVec,
    model_loaded: IntGauge,
}

impl ServiceMetricsInner {
    fn new() -> Self {
        Self {
            http_requests_total: register_int_counter_vec!(
                "housing_api_http_requests_total",
                "HTTP requests handled, by route and status code",
                &["handler", "status"]
            )
            .expect("Failed to register http_requests_total"),

            http_request_duration_seconds: register_histogram_vec!(
                "housing_api_http_request_duration_seconds",
                "HTTP request latency by route",
                &["handler"],
                LATENCY_BUCKETS.to_vec()
            )
            .expect("Failed to register http_request_duration_seconds"),

            prediction_latency_seconds: register_histogram!(
                "housing_api_prediction_latency_seconds",
                "Time spent running model inference",
                LATENCY_BUCKETS.to_vec()
            )
            .expect("Failed to register prediction_latency_seconds"),

            predictions_total: register_int_counter!(
                "housing_api_predictions_total",
                "Total number of successful predictions"
            )
            .expect("Failed to register predictions_total"),

            prediction_errors_total: register_int_counter!(
                "housing_api_prediction_errors_total",
                "Total number of failed predictions"
            )
            .expect("Failed to register prediction_errors_total"),

            model_info: register_gauge_vec!(
                "housing_api_model_info",
                "Information about the currently served model",
                &["name", "version", "family"]
            )
            .expect("Failed to register model_info"),

            model_loaded: register_int_gauge!(
                "housing_api_model_loaded",
                "Whether a model was loaded at startup (1) or the service is degraded (0)"
            )
            .expect("Failed to register model_loaded"),
        }
    }
}

/// Lightweight handle to the global service metrics
///
/// Clones share the same underlying metrics.
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
    /// Create a handle, registering the metrics on first call
    pub fn new() -> Self {
        GLOBAL_METRICS.get_or_init(ServiceMetricsInner::new);
        Self { _private: () }
    }

    fn inner(&self) -> &ServiceMetricsInner {
        GLOBAL_METRICS.get_or_init(ServiceMetricsInner::new)
    }

    /// Record one handled HTTP request
    pub fn observe_request(&self, handler: &str, status: u16, duration_secs: f64) {
        let inner = self.inner();
        inner
            .http_requests_total
            .with_label_values(&[handler, &status.to_string()])
            .inc();
        inner
            .http_request_duration_seconds
            .with_label_values(&[handler])
            .observe(duration_secs);
    }

    pub fn observe_prediction_latency(&self, duration_secs: f64) {
        self.inner().prediction_latency_seconds.observe(duration_secs);
    }

    pub fn inc_predictions(&self) {
        self.inner().predictions_total.inc();
    }

    pub fn inc_prediction_errors(&self) {
        self.inner().prediction_errors_total.inc();
    }

    /// Mark a model as loaded
    pub fn set_model(&self, name: &str, version: u32, family: &str) {
        let inner = self.inner();
        inner.model_info.reset();
        inner
            .model_info
            .with_label_values(&[name, &version.to_string(), family])
            .set(1.0);
        inner.model_loaded.set(1);
    }

    /// Mark the service as degraded
    pub fn set_model_unavailable(&self) {
        self.inner().model_info.reset();
        self.inner().model_loaded.set(0);
    }
}

/// Structured logger for service events
#[derive(Clone)]
pub struct StructuredLogger {
    service: String,
}

impl StructuredLogger {
    pub fn new(service: impl Into<String>) -> Self {
        Self {
            service: service.into(),
        }
    }

    pub fn log_startup(&self, version: &str, port: u16, tracking_uri: &str) {
        info!(
            event = "service_started",
            service = %self.service,
            service_version = %version,
            port = port,
            tracking_uri = %tracking_uri,
            "Prediction service started"
        );
    }

    pub fn log_model_loaded(&self, name: &str, version: u32, family: &str) {
        info!(
            event = "model_loaded",
            service = %self.service,
            model_name = %name,
            model_version = version,
            family = %family,
            "Model loaded, service ready"
        );
    }

    pub fn log_model_load_failed(&self, name: &str, version: u32, reason: &str) {
        error!(
            event = "model_load_failed",
            service = %self.service,
            model_name = %name,
            model_version = version,
            reason = %reason,
            "Model could not be loaded, service degraded"
        );
    }

    pub fn log_prediction_request(&self, record: &FeatureRecord) {
        info!(
            event = "prediction_request",
            service = %self.service,
            med_inc = record.med_inc,
            house_age = record.house_age,
            ave_rooms = record.ave_rooms,
            ave_bedrms = record.ave_bedrms,
            population = record.population,
            ave_occup = record.ave_occup,
            latitude = record.latitude,
            longitude = record.longitude,
            "Received prediction request"
        );
    }

    pub fn log_prediction(&self, value: f64, latency_secs: f64) {
        info!(
            event = "prediction_generated",
            service = %self.service,
            predicted_median_house_value = value,
            latency_secs = latency_secs,
            "Prediction successful"
        );
    }

    /// Full error detail; callers only ever see a generic failure
    pub fn log_prediction_failed(&self, detail: &str) {
        error!(
            event = "prediction_failed",
            service = %self.service,
            detail = %detail,
            "Prediction failed"
        );
    }

    pub fn log_rejected_request(&self, status: u16, detail: &str) {
        warn!(
            event = "prediction_rejected",
            service = %self.service,
            status = status,
            detail = %detail,
            "Prediction request rejected"
        );
    }

    pub fn log_shutdown(&self, reason: &str) {
        info!(
            event = "service_shutdown",
            service = %self.service,
            reason = %reason,
            "Prediction service shutting down"
        );
    }
}
