//! Prometheus metrics for the dispatch service.
//!
//! - Template metrics (table loads, fallbacks, resolutions)
//! - Queue metrics (enqueued, rejected, dead-lettered)
//! - Delivery metrics (attempts, successes, retries, terminal failures, latency)
//! - Webhook metrics (callbacks, rejected callbacks, statuses)

mod helpers;

pub use helpers::{encode_metrics, DeliveryMetrics, QueueMetrics, TemplateMetrics, WebhookMetrics};

use lazy_static::lazy_static;
use prometheus::{
    register_histogram, register_int_counter, register_int_counter_vec, register_int_gauge,
    Histogram, IntCounter, IntCounterVec, IntGauge,
};

/// Prefix for all metrics
const METRIC_PREFIX: &str = "dispatch";

lazy_static! {
    // ============================================================================
    // Template Metrics
    // ============================================================================

    /// Template table loads by result (hit, loaded, fallback, error)
    pub static ref TEMPLATE_LOADS_TOTAL: IntCounterVec = register_int_counter_vec!(
        format!("{}_template_loads_total", METRIC_PREFIX),
        "Template table lookups by result",
        &["result"]
    ).unwrap();

    /// Successful template resolutions
    pub static ref TEMPLATES_RESOLVED_TOTAL: IntCounter = register_int_counter!(
        format!("{}_templates_resolved_total", METRIC_PREFIX),
        "Total templates resolved into payloads"
    ).unwrap();

    /// Resolutions that used the default language's definition
    pub static ref TEMPLATE_LANGUAGE_FALLBACKS_TOTAL: IntCounter = register_int_counter!(
        format!("{}_template_language_fallbacks_total", METRIC_PREFIX),
        "Total resolutions served from the default language"
    ).unwrap();

    /// Resolutions that found no template
    pub static ref TEMPLATES_NOT_FOUND_TOTAL: IntCounter = register_int_counter!(
        format!("{}_templates_not_found_total", METRIC_PREFIX),
        "Total resolutions failing with template not found"
    ).unwrap();

    // ============================================================================
    // Queue Metrics
    // ============================================================================

    /// Jobs durably enqueued
    pub static ref JOBS_ENQUEUED_TOTAL: IntCounter = register_int_counter!(
        format!("{}_jobs_enqueued_total", METRIC_PREFIX),
        "Total dispatch jobs enqueued"
    ).unwrap();

    /// Enqueue attempts rejected by the backing store
    pub static ref JOBS_REJECTED_TOTAL: IntCounter = register_int_counter!(
        format!("{}_jobs_rejected_total", METRIC_PREFIX),
        "Total dispatch jobs rejected by the queue backend"
    ).unwrap();

    /// Tracking ids truncated to the provider limit
    pub static ref TRACKING_IDS_TRUNCATED_TOTAL: IntCounter = register_int_counter!(
        format!("{}_tracking_ids_truncated_total", METRIC_PREFIX),
        "Total tracking ids truncated before storage"
    ).unwrap();

    /// Jobs waiting in the backend (refreshed on scrape)
    pub static ref QUEUE_PENDING_JOBS: IntGauge = register_int_gauge!(
        format!("{}_queue_pending_jobs", METRIC_PREFIX),
        "Jobs currently waiting for delivery"
    ).unwrap();

    /// Retained dead letters (refreshed on scrape)
    pub static ref QUEUE_DEAD_LETTERS: IntGauge = register_int_gauge!(
        format!("{}_queue_dead_letters", METRIC_PREFIX),
        "Terminally failed jobs currently retained"
    ).unwrap();

    /// Queue store circuit breaker state (0=closed, 1=open, 2=half-open)
    pub static ref QUEUE_CIRCUIT_BREAKER_STATE: IntGauge = register_int_gauge!(
        format!("{}_queue_circuit_breaker_state", METRIC_PREFIX),
        "Redis queue store circuit breaker state"
    ).unwrap();

    // ============================================================================
    // Delivery Metrics
    // ============================================================================

    /// Delivery attempts by outcome (delivered, retry, failed)
    pub static ref DELIVERY_ATTEMPTS_TOTAL: IntCounterVec = register_int_counter_vec!(
        format!("{}_delivery_attempts_total", METRIC_PREFIX),
        "Delivery attempts by outcome",
        &["outcome"]
    ).unwrap();

    /// Jobs that exhausted their retry budget
    pub static ref DELIVERY_JOBS_FAILED_TOTAL: IntCounter = register_int_counter!(
        format!("{}_delivery_jobs_failed_total", METRIC_PREFIX),
        "Total jobs terminally failed after exhausting retries"
    ).unwrap();

    /// Provider call latency
    pub static ref DELIVERY_LATENCY: Histogram = register_histogram!(
        format!("{}_delivery_latency_seconds", METRIC_PREFIX),
        "Provider send latency in seconds",
        vec![0.01, 0.05, 0.1, 0.25, 0.5, 1.0, 2.5, 5.0, 10.0]
    ).unwrap();

    /// Queue backend errors seen by workers
    pub static ref WORKER_BACKEND_ERRORS_TOTAL: IntCounter = register_int_counter!(
        format!("{}_worker_backend_errors_total", METRIC_PREFIX),
        "Total queue backend errors seen by delivery workers"
    ).unwrap();

    // ============================================================================
    // Webhook Metrics
    // ============================================================================

    /// Callbacks by verification result (accepted, rejected)
    pub static ref WEBHOOK_CALLBACKS_TOTAL: IntCounterVec = register_int_counter_vec!(
        format!("{}_webhook_callbacks_total", METRIC_PREFIX),
        "Inbound webhook callbacks by verification result",
        &["result"]
    ).unwrap();

    /// Delivery statuses reported by the provider
    pub static ref WEBHOOK_STATUSES_TOTAL: IntCounterVec = register_int_counter_vec!(
        format!("{}_webhook_statuses_total", METRIC_PREFIX),
        "Delivery statuses received via webhook",
        &["status"]
    ).unwrap();
}
