//! Metrics helper structs for convenient metric recording

use std::time::Duration;

use prometheus::{Encoder, TextEncoder};

use super::{
    DELIVERY_ATTEMPTS_TOTAL, DELIVERY_JOBS_FAILED_TOTAL, DELIVERY_LATENCY, JOBS_ENQUEUED_TOTAL,
    JOBS_REJECTED_TOTAL, TEMPLATES_NOT_FOUND_TOTAL, TEMPLATES_RESOLVED_TOTAL,
    TEMPLATE_LANGUAGE_FALLBACKS_TOTAL, TEMPLATE_LOADS_TOTAL, TRACKING_IDS_TRUNCATED_TOTAL,
    WEBHOOK_CALLBACKS_TOTAL, WEBHOOK_STATUSES_TOTAL, WORKER_BACKEND_ERRORS_TOTAL,
};

/// Encode all metrics to Prometheus text format
pub fn encode_metrics() -> Result<String, prometheus::Error> {
    let encoder = TextEncoder::new();
    let metric_families = prometheus::gather();
    let mut buffer = Vec::new();
    encoder.encode(&metric_families, &mut buffer)?;
    Ok(String::from_utf8(buffer).unwrap_or_default())
}

/// Helper struct for recording template metrics
pub struct TemplateMetrics;

impl TemplateMetrics {
    /// Record a table lookup (`hit`, `loaded`, `fallback`, `error`)
    pub fn record_load(result: &str) {
        TEMPLATE_LOADS_TOTAL.with_label_values(&[result]).inc();
    }

    pub fn record_resolved() {
        TEMPLATES_RESOLVED_TOTAL.inc();
    }

    pub fn record_language_fallback() {
        TEMPLATE_LANGUAGE_FALLBACKS_TOTAL.inc();
    }

    pub fn record_not_found() {
        TEMPLATES_NOT_FOUND_TOTAL.inc();
    }
}

/// Helper struct for recording queue metrics
pub struct QueueMetrics;

impl QueueMetrics {
    pub fn record_enqueued() {
        JOBS_ENQUEUED_TOTAL.inc();
    }

    pub fn record_rejected() {
        JOBS_REJECTED_TOTAL.inc();
    }

    pub fn record_tracking_id_truncated() {
        TRACKING_IDS_TRUNCATED_TOTAL.inc();
    }
}

/// Helper struct for recording delivery metrics
pub struct DeliveryMetrics;

impl DeliveryMetrics {
    pub fn record_delivered(latency: Duration) {
        DELIVERY_ATTEMPTS_TOTAL.with_label_values(&["delivered"]).inc();
        DELIVERY_LATENCY.observe(latency.as_secs_f64());
    }

    pub fn record_retry(latency: Duration) {
        DELIVERY_ATTEMPTS_TOTAL.with_label_values(&["retry"]).inc();
        DELIVERY_LATENCY.observe(latency.as_secs_f64());
    }

    /// Record a final failed attempt; the job is dead-lettered
    pub fn record_terminal_failure(latency: Duration) {
        DELIVERY_ATTEMPTS_TOTAL.with_label_values(&["failed"]).inc();
        DELIVERY_LATENCY.observe(latency.as_secs_f64());
        DELIVERY_JOBS_FAILED_TOTAL.inc();
    }

    pub fn record_backend_error() {
        WORKER_BACKEND_ERRORS_TOTAL.inc();
    }
}

/// Helper struct for recording webhook metrics
pub struct WebhookMetrics;

impl WebhookMetrics {
    pub fn record_accepted() {
        WEBHOOK_CALLBACKS_TOTAL.with_label_values(&["accepted"]).inc();
    }

    pub fn record_rejected() {
        WEBHOOK_CALLBACKS_TOTAL.with_label_values(&["rejected"]).inc();
    }

    pub fn record_status(status: &str) {
        WEBHOOK_STATUSES_TOTAL.with_label_values(&[status]).inc();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_encode_includes_recorded_metrics() {
        TemplateMetrics::record_resolved();
        QueueMetrics::record_enqueued();
        WebhookMetrics::record_status("delivered");

        let output = encode_metrics().unwrap();
        assert!(output.contains("dispatch_templates_resolved_total"));
        assert!(output.contains("dispatch_jobs_enqueued_total"));
        assert!(output.contains("dispatch_webhook_statuses_total"));
    }
}
