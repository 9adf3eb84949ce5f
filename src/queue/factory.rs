//! Queue backend factory

use std::sync::Arc;

use crate::config::QueueConfig;
use crate::redis::RedisPool;

use super::backend::DispatchQueueBackend;
use super::memory_backend::MemoryQueueBackend;
use super::redis_backend::RedisQueueBackend;

/// Create a queue backend based on configuration.
///
/// - `"redis"`: a `RedisQueueBackend` if a Redis pool is provided
/// - `"memory"` (default): a `MemoryQueueBackend`
pub fn create_queue_backend(
    settings: &QueueConfig,
    redis_pool: Option<Arc<RedisPool>>,
) -> Arc<dyn DispatchQueueBackend> {
    match settings.backend.as_str() {
        "redis" => {
            if let Some(pool) = redis_pool {
                tracing::info!(
                    backend = "redis",
                    prefix = %settings.redis_prefix,
                    "Creating Redis queue backend"
                );
                Arc::new(RedisQueueBackend::new(
                    pool,
                    settings.redis_prefix.clone(),
                    settings.dead_letter_retention,
                ))
            } else {
                tracing::warn!(
                    "Redis backend requested but no pool provided, falling back to memory"
                );
                Arc::new(MemoryQueueBackend::new(settings.dead_letter_retention))
            }
        }
        "memory" => {
            tracing::info!(backend = "memory", "Creating memory queue backend");
            Arc::new(MemoryQueueBackend::new(settings.dead_letter_retention))
        }
        other => {
            tracing::warn!(backend = %other, "Unknown queue backend, falling back to memory");
            Arc::new(MemoryQueueBackend::new(settings.dead_letter_retention))
        }
    }
}
