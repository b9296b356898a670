//! Prometheus metrics for the dispatch core.
//!
//! Covers the outcome dimensions of a dispatch call:
//! - Request metrics (single vs. bulk, batch size)
//! - Persistence metrics (rows written, write failures)
//! - Delivery metrics (per-channel successes and failures, fallback activations)
//! - Gateway metrics (calls, latency, degradations, missing tokens)

use lazy_static::lazy_static;
use prometheus::{
    register_histogram, register_int_counter, register_int_counter_vec, Histogram, IntCounter,
    IntCounterVec, TextEncoder,
};

/// Prefix for all metrics
const METRIC_PREFIX: &str = "opsboard";

lazy_static! {
    // ============================================================================
    // Request Metrics
    // ============================================================================

    /// Dispatch requests by mode (single / bulk)
    pub static ref DISPATCH_REQUESTS_TOTAL: IntCounterVec = register_int_counter_vec!(
        format!("{}_dispatch_requests_total", METRIC_PREFIX),
        "Total dispatch requests",
        &["mode"]
    ).unwrap();

    /// Recipients per bulk request
    pub static ref BULK_RECIPIENTS: Histogram = register_histogram!(
        format!("{}_bulk_recipients", METRIC_PREFIX),
        "Number of resolved recipients per bulk request",
        vec![1.0, 5.0, 10.0, 25.0, 50.0, 100.0, 250.0]
    ).unwrap();

    // ============================================================================
    // Persistence Metrics
    // ============================================================================

    /// Notification rows written
    pub static ref ROWS_WRITTEN_TOTAL: IntCounter = register_int_counter!(
        format!("{}_rows_written_total", METRIC_PREFIX),
        "Total notification rows persisted"
    ).unwrap();

    /// Notification row write failures
    pub static ref WRITE_FAILURES_TOTAL: IntCounter = register_int_counter!(
        format!("{}_write_failures_total", METRIC_PREFIX),
        "Total notification row write failures"
    ).unwrap();

    // ============================================================================
    // Delivery Metrics
    // ============================================================================

    /// Successful deliveries by channel (primary / fallback)
    pub static ref DELIVERIES_TOTAL: IntCounterVec = register_int_counter_vec!(
        format!("{}_deliveries_total", METRIC_PREFIX),
        "Total successful delivery attempts",
        &["channel"]
    ).unwrap();

    /// Failed deliveries by channel
    pub static ref DELIVERY_FAILURES_TOTAL: IntCounterVec = register_int_counter_vec!(
        format!("{}_delivery_failures_total", METRIC_PREFIX),
        "Total failed delivery attempts",
        &["channel"]
    ).unwrap();

    /// Fallback channel activations
    pub static ref FALLBACK_TOTAL: IntCounter = register_int_counter!(
        format!("{}_fallback_total", METRIC_PREFIX),
        "Total times the fallback channel was engaged"
    ).unwrap();

    // ============================================================================
    // Gateway Metrics
    // ============================================================================

    /// Push gateway calls
    pub static ref GATEWAY_CALLS_TOTAL: IntCounter = register_int_counter!(
        format!("{}_gateway_calls_total", METRIC_PREFIX),
        "Total push gateway calls"
    ).unwrap();

    /// Push gateway call latency
    pub static ref GATEWAY_LATENCY: Histogram = register_histogram!(
        format!("{}_gateway_latency_seconds", METRIC_PREFIX),
        "Push gateway call latency in seconds",
        vec![0.01, 0.05, 0.1, 0.25, 0.5, 1.0, 2.5, 5.0, 10.0]
    ).unwrap();

    /// Push gateway hard failures (5xx or timeout)
    pub static ref GATEWAY_DEGRADED_TOTAL: IntCounter = register_int_counter!(
        format!("{}_gateway_degraded_total", METRIC_PREFIX),
        "Total push gateway hard failures"
    ).unwrap();

    /// Recipients skipped for lack of a delivery token
    pub static ref TOKENS_MISSING_TOTAL: IntCounter = register_int_counter!(
        format!("{}_tokens_missing_total", METRIC_PREFIX),
        "Total recipients with no registered delivery token"
    ).unwrap();
}

/// Encode all registered metrics in the Prometheus text format.
///
/// The host application exposes this from its scrape endpoint.
pub fn encode_metrics() -> Result<String, prometheus::Error> {
    let encoder = TextEncoder::new();
    let metric_families = prometheus::gather();
    encoder.encode_to_string(&metric_families)
}
