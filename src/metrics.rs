// Copyright (c) 2025 Erick Bourgeois, firestoned
// SPDX-License-Identifier: MIT

//! Prometheus metrics for Azure service reconciliation.
//!
//! All metrics use the namespace prefix `capz_azure_`.
//!
//! # Metrics Categories
//!
//! - **Service Metrics** - Reconcile and delete outcomes per service, and their duration
//! - **Long-running Operation Metrics** - Operations persisted, resumed and completed
//! - **Azure API Metrics** - Failed Azure requests by error type
//!
//! # Example
//!
//! ```rust,no_run
//! use capz_core::metrics::{gather_metrics, record_service_operation};
//!
//! record_service_operation("group", "reconcile", "success", std::time::Duration::from_millis(120));
//! let text = gather_metrics().unwrap();
//! assert!(text.contains("capz_azure_service_operations_total"));
//! ```

use prometheus::{CounterVec, Encoder, HistogramOpts, HistogramVec, Opts, Registry, TextEncoder};
use std::sync::LazyLock;
use std::time::Duration;

// ============================================================================
// Metric Name Constants
// ============================================================================

/// Namespace prefix for all metrics (prometheus-safe)
const METRICS_NAMESPACE: &str = "capz_azure";

// ============================================================================
// Global Metrics Registry
// ============================================================================

/// Global Prometheus metrics registry
pub static METRICS_REGISTRY: LazyLock<Registry> = LazyLock::new(Registry::new);

// ============================================================================
// Service Metrics
// ============================================================================

/// Total number of service operations
///
/// Labels:
/// - `service`: Service name (e.g., `group`, `virtualmachine`)
/// - `operation`: `reconcile` or `delete`
/// - `result`: `success`, `not_done`, `transient` or `terminal`, ...
pub static SERVICE_OPERATIONS_TOTAL: LazyLock<CounterVec> = LazyLock::new(|| {
    let opts = Opts::new(
        format!("{METRICS_NAMESPACE}_service_operations_total"),
        "Total number of service reconciles and deletes by service, operation and result",
    );
    let counter = CounterVec::new(opts, &["service", "operation", "result"])
        .expect("service operations counter definition is valid");
    METRICS_REGISTRY
        .register(Box::new(counter.clone()))
        .expect("service operations counter registers once");
    counter
});

/// Duration of service operations in seconds
///
/// Labels:
/// - `service`: Service name
/// - `operation`: `reconcile` or `delete`
pub static SERVICE_OPERATION_DURATION_SECONDS: LazyLock<HistogramVec> = LazyLock::new(|| {
    let opts = HistogramOpts::new(
        format!("{METRICS_NAMESPACE}_service_operation_duration_seconds"),
        "Duration of service reconciles and deletes in seconds",
    )
    .buckets(vec![0.01, 0.1, 0.5, 1.0, 2.0, 5.0, 10.0, 15.0, 30.0, 60.0]);
    let histogram = HistogramVec::new(opts, &["service", "operation"])
        .expect("service duration histogram definition is valid");
    METRICS_REGISTRY
        .register(Box::new(histogram.clone()))
        .expect("service duration histogram registers once");
    histogram
});

// ============================================================================
// Long-running Operation Metrics
// ============================================================================

/// Long-running operation lifecycle events
///
/// Labels:
/// - `service`: Service name
/// - `operation_type`: `PUT`, `PATCH` or `DELETE`
/// - `event`: `persisted`, `resumed` or `completed`
pub static LONG_RUNNING_OPERATIONS_TOTAL: LazyLock<CounterVec> = LazyLock::new(|| {
    let opts = Opts::new(
        format!("{METRICS_NAMESPACE}_long_running_operations_total"),
        "Long-running operation events by service, operation type and event",
    );
    let counter = CounterVec::new(opts, &["service", "operation_type", "event"])
        .expect("long-running operations counter definition is valid");
    METRICS_REGISTRY
        .register(Box::new(counter.clone()))
        .expect("long-running operations counter registers once");
    counter
});

// ============================================================================
// Azure API Metrics
// ============================================================================

/// Failed Azure API requests
///
/// Labels:
/// - `method`: HTTP method
/// - `error_type`: Error category (`transient`, `terminal`, `not_found`, `conflict`)
pub static AZURE_API_ERRORS_TOTAL: LazyLock<CounterVec> = LazyLock::new(|| {
    let opts = Opts::new(
        format!("{METRICS_NAMESPACE}_api_errors_total"),
        "Failed Azure API requests by method and error type",
    );
    let counter = CounterVec::new(opts, &["method", "error_type"])
        .expect("api errors counter definition is valid");
    METRICS_REGISTRY
        .register(Box::new(counter.clone()))
        .expect("api errors counter registers once");
    counter
});

// ============================================================================
// Helper Functions
// ============================================================================

/// Record the outcome of one service reconcile or delete
///
/// # Arguments
/// * `service` - Service name
/// * `operation` - `reconcile` or `delete`
/// * `result` - `success` or an error type
/// * `duration` - Duration of the operation
pub fn record_service_operation(service: &str, operation: &str, result: &str, duration: Duration) {
    SERVICE_OPERATIONS_TOTAL
        .with_label_values(&[service, operation, result])
        .inc();
    SERVICE_OPERATION_DURATION_SECONDS
        .with_label_values(&[service, operation])
        .observe(duration.as_secs_f64());
}

/// Record a long-running operation event
pub fn record_long_running_operation(service: &str, operation_type: &str, event: &str) {
    LONG_RUNNING_OPERATIONS_TOTAL
        .with_label_values(&[service, operation_type, event])
        .inc();
}

/// Record a failed Azure API request
pub fn record_azure_api_error(method: &str, error_type: &str) {
    AZURE_API_ERRORS_TOTAL
        .with_label_values(&[method, error_type])
        .inc();
}

/// Gather and encode all metrics in Prometheus text format
///
/// # Errors
/// Returns error if encoding fails
pub fn gather_metrics() -> Result<String, prometheus::Error> {
    let encoder = TextEncoder::new();
    let metric_families = METRICS_REGISTRY.gather();
    let mut buffer = Vec::new();
    encoder.encode(&metric_families, &mut buffer)?;
    String::from_utf8(buffer).map_err(|e| prometheus::Error::Msg(format!("UTF-8 error: {e}")))
}
