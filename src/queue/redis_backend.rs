//! Redis-backed dispatch queue.
//!
//! Pending jobs live in a sorted set `{prefix}:pending` scored by `ready_at`
//! in milliseconds; the member is the serialized job. Dead letters are kept in
//! a capped list `{prefix}:dead`, newest first. Jobs survive service restarts.

use std::sync::Arc;

use async_trait::async_trait;
use chrono::Utc;

use crate::redis::{PoolError, RedisPool};

use super::backend::{DeadLetter, DispatchQueueBackend, QueueBackendError, QueueBackendStats};
use super::job::DispatchJob;

pub struct RedisQueueBackend {
    pool: Arc<RedisPool>,
    prefix: String,
    dead_letter_retention: usize,
}

impl RedisQueueBackend {
    pub fn new(pool: Arc<RedisPool>, prefix: String, dead_letter_retention: usize) -> Self {
        Self {
            pool,
            prefix,
            dead_letter_retention: dead_letter_retention.max(1),
        }
    }

    fn pending_key(&self) -> String {
        format!("{}:pending", self.prefix)
    }

    fn dead_key(&self) -> String {
        format!("{}:dead", self.prefix)
    }

    fn map_error(err: PoolError) -> QueueBackendError {
        match err {
            PoolError::Redis(e) => QueueBackendError::Redis(e),
            PoolError::CircuitOpen => {
                QueueBackendError::Unavailable("Circuit breaker is open".to_string())
            }
        }
    }
}

#[async_trait]
impl DispatchQueueBackend for RedisQueueBackend {
    async fn push(&self, job: DispatchJob) -> Result<(), QueueBackendError> {
        let key = self.pending_key();
        let data = serde_json::to_string(&job)?;

        self.pool
            .zadd(&key, job.ready_at.timestamp_millis(), &data)
            .await
            .map_err(Self::map_error)?;

        tracing::debug!(
            job_id = %job.id,
            attempts = job.attempts,
            key = %key,
            "Job stored in Redis queue"
        );

        Ok(())
    }

    async fn claim(&self) -> Result<Option<DispatchJob>, QueueBackendError> {
        let key = self.pending_key();
        let now_ms = Utc::now().timestamp_millis();

        let candidates = self
            .pool
            .zrange_due(&key, now_ms, 1)
            .await
            .map_err(Self::map_error)?;

        let Some(data) = candidates.into_iter().next() else {
            return Ok(None);
        };

        // Only the worker whose ZREM removes the member owns the job
        let won = self.pool.zrem(&key, &data).await.map_err(Self::map_error)?;
        if !won {
            tracing::trace!(key = %key, "Job claimed by another worker");
            return Ok(None);
        }

        match serde_json::from_str::<DispatchJob>(&data) {
            Ok(job) => Ok(Some(job)),
            Err(e) => {
                tracing::error!(error = %e, key = %key, "Dropping undecodable job from Redis queue");
                Err(QueueBackendError::Serialization(e))
            }
        }
    }

    async fn mark_failed(&self, job: DispatchJob, error: &str) -> Result<(), QueueBackendError> {
        let data = serde_json::to_string(&DeadLetter::new(job, error))?;

        self.pool
            .lpush_capped(&self.dead_key(), &data, self.dead_letter_retention)
            .await
            .map_err(Self::map_error)
    }

    async fn dead_letters(&self, limit: usize) -> Result<Vec<DeadLetter>, QueueBackendError> {
        if limit == 0 {
            return Ok(Vec::new());
        }

        let entries = self
            .pool
            .lrange(&self.dead_key(), 0, limit as isize - 1)
            .await
            .map_err(Self::map_error)?;

        let letters = entries
            .iter()
            .filter_map(|data| match serde_json::from_str::<DeadLetter>(data) {
                Ok(letter) => Some(letter),
                Err(e) => {
                    tracing::warn!(error = %e, "Skipping undecodable dead letter");
                    None
                }
            })
            .collect();

        Ok(letters)
    }

    async fn stats(&self) -> QueueBackendStats {
        let pending_key = self.pending_key();
        let now_ms = Utc::now().timestamp_millis();

        let pending = self.pool.zcard(&pending_key).await;
        let due = self.pool.zcount_due(&pending_key, now_ms).await;
        let dead = self.pool.llen(&self.dead_key()).await;

        if let Err(e) = pending.as_ref().and(due.as_ref()).and(dead.as_ref()) {
            tracing::warn!(error = %e, "Failed to read Redis queue stats");
        }

        QueueBackendStats {
            backend_type: "redis".to_string(),
            pending: pending.unwrap_or(0),
            due: due.unwrap_or(0),
            dead_letters: dead.unwrap_or(0),
            dead_letter_retention: self.dead_letter_retention,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::RedisConfig;

    fn backend(prefix: &str) -> RedisQueueBackend {
        let pool = Arc::new(RedisPool::new(&RedisConfig::default()).unwrap());
        RedisQueueBackend::new(pool, prefix.to_string(), 0)
    }

    #[test]
    fn test_key_layout() {
        let backend = backend("dispatch:jobs");
        assert_eq!(backend.pending_key(), "dispatch:jobs:pending");
        assert_eq!(backend.dead_key(), "dispatch:jobs:dead");
        assert_eq!(backend.dead_letter_retention, 1);
    }

    #[test]
    fn test_circuit_open_maps_to_unavailable() {
        let err = RedisQueueBackend::map_error(PoolError::CircuitOpen);
        assert!(matches!(err, QueueBackendError::Unavailable(_)));
    }
}
