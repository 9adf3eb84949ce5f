//! Prometheus metrics endpoint.

use axum::{
    extract::State,
    http::StatusCode,
    response::IntoResponse,
};

use crate::metrics;
use crate::server::AppState;

/// GET /metrics - Prometheus metrics endpoint
pub async fn prometheus_metrics(State(state): State<AppState>) -> impl IntoResponse {
    update_metrics_from_state(&state).await;

    match metrics::encode_metrics() {
        Ok(output) => (
            StatusCode::OK,
            [(axum::http::header::CONTENT_TYPE, "text/plain; version=0.0.4; charset=utf-8")],
            output,
        ),
        Err(e) => {
            tracing::error!(error = %e, "Failed to encode Prometheus metrics");
            (
                StatusCode::INTERNAL_SERVER_ERROR,
                [(axum::http::header::CONTENT_TYPE, "text/plain")],
                format!("Failed to encode metrics: {}", e),
            )
        }
    }
}

/// Refresh gauges that mirror backend state
async fn update_metrics_from_state(state: &AppState) {
    let queue_stats = state.dispatch_queue.backend().stats().await;
    metrics::QUEUE_PENDING_JOBS.set(queue_stats.pending as i64);
    metrics::QUEUE_DEAD_LETTERS.set(queue_stats.dead_letters as i64);

    if let Some(pool) = &state.redis_pool {
        metrics::QUEUE_CIRCUIT_BREAKER_STATE.set(pool.circuit_state() as u8 as i64);
    }
}
