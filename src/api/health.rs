//! Health check and statistics endpoints.

use axum::{extract::State, Json};
use serde::Serialize;

use crate::queue::QueueBackendStats;
use crate::redis::CircuitState;
use crate::server::AppState;

#[derive(Debug, Serialize)]
pub struct HealthResponse {
    pub status: String,
    pub version: String,
    pub uptime_seconds: u64,
    pub queue: QueueHealthResponse,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub redis: Option<RedisHealthResponse>,
}

#[derive(Debug, Serialize)]
pub struct QueueHealthResponse {
    pub backend: String,
    pub pending: usize,
    pub dead_letters: usize,
}

#[derive(Debug, Serialize)]
pub struct RedisHealthResponse {
    pub circuit_breaker_state: String,
    pub connected: bool,
}

#[derive(Debug, Serialize)]
pub struct StatsResponse {
    pub queue: QueueBackendStats,
    pub templates: TemplateStats,
    pub workers: WorkerStats,
}

#[derive(Debug, Serialize)]
pub struct TemplateStats {
    pub default_language: String,
    pub cached_languages: Vec<CachedLanguage>,
}

#[derive(Debug, Serialize)]
pub struct CachedLanguage {
    pub language: String,
    pub templates: usize,
}

#[derive(Debug, Serialize)]
pub struct WorkerStats {
    pub concurrency: usize,
    pub poll_interval_ms: u64,
}

pub async fn health(State(state): State<AppState>) -> Json<HealthResponse> {
    let queue_stats = state.dispatch_queue.backend().stats().await;

    let redis = state.redis_pool.as_ref().map(|pool| {
        let circuit = pool.circuit_state();
        RedisHealthResponse {
            circuit_breaker_state: circuit.as_str().to_string(),
            connected: circuit != CircuitState::Open,
        }
    });

    let degraded = redis.as_ref().is_some_and(|r| !r.connected);
    let status = if degraded { "degraded" } else { "healthy" };

    Json(HealthResponse {
        status: status.to_string(),
        version: env!("CARGO_PKG_VERSION").to_string(),
        uptime_seconds: state.start_time.elapsed().as_secs(),
        queue: QueueHealthResponse {
            backend: queue_stats.backend_type,
            pending: queue_stats.pending,
            dead_letters: queue_stats.dead_letters,
        },
        redis,
    })
}

pub async fn stats(State(state): State<AppState>) -> Json<StatsResponse> {
    let store = state.resolver.store();

    let cached_languages = store
        .cached_languages()
        .into_iter()
        .map(|language| CachedLanguage {
            templates: store.template_count(&language).unwrap_or(0),
            language,
        })
        .collect();

    Json(StatsResponse {
        queue: state.dispatch_queue.backend().stats().await,
        templates: TemplateStats {
            default_language: store.default_language().to_string(),
            cached_languages,
        },
        workers: WorkerStats {
            concurrency: state.settings.worker.concurrency,
            poll_interval_ms: state.settings.worker.poll_interval_ms,
        },
    })
}
