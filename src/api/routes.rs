use axum::{
    routing::{get, post},
    Router,
};

use crate::server::AppState;

use super::health::{health, stats};
use super::messages::{list_dead_letters, send_template};
use super::metrics::prometheus_metrics;

/// Probes and scraping; never behind the API key
pub fn public_routes() -> Router<AppState> {
    Router::new()
        .route("/health", get(health))
        .route("/metrics", get(prometheus_metrics))
}

/// Routes guarded by `X-API-Key` when `api.key` is set
pub fn api_routes() -> Router<AppState> {
    Router::new()
        .route("/stats", get(stats))
        .nest(
            "/api/v1",
            Router::new()
                .route("/messages/template", post(send_template))
                .route("/dead-letters", get(list_dead_letters)),
        )
}
