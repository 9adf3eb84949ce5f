//! Dispatch queue backend trait and shared types.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::Serialize;
use thiserror::Error;

use super::job::DispatchJob;

#[derive(Debug, Error)]
pub enum QueueBackendError {
    #[error("Redis error: {0}")]
    Redis(#[from] redis::RedisError),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("Queue store unavailable: {0}")]
    Unavailable(String),
}

/// A job that exhausted its retry budget, kept for inspection.
#[derive(Debug, Clone, PartialEq, Serialize, serde::Deserialize)]
pub struct DeadLetter {
    pub job: DispatchJob,
    pub error: String,
    pub failed_at: DateTime<Utc>,
}

impl DeadLetter {
    pub fn new(job: DispatchJob, error: impl Into<String>) -> Self {
        Self {
            job,
            error: error.into(),
            failed_at: Utc::now(),
        }
    }
}

#[derive(Debug, Clone, Default, Serialize)]
pub struct QueueBackendStats {
    pub backend_type: String,
    /// Jobs waiting, due or scheduled for retry
    pub pending: usize,
    /// Pending jobs whose `ready_at` has passed
    pub due: usize,
    pub dead_letters: usize,
    pub dead_letter_retention: usize,
}

/// Storage for dispatch jobs.
///
/// Implementations must hand each job to at most one `claim` caller.
#[async_trait]
pub trait DispatchQueueBackend: Send + Sync {
    /// Store a job; it becomes claimable once `ready_at` has passed.
    ///
    /// Also used to reschedule a claimed job for retry.
    async fn push(&self, job: DispatchJob) -> Result<(), QueueBackendError>;

    /// Remove and return the earliest due job, if any.
    async fn claim(&self) -> Result<Option<DispatchJob>, QueueBackendError>;

    /// Record a job as terminally failed.
    async fn mark_failed(&self, job: DispatchJob, error: &str) -> Result<(), QueueBackendError>;

    /// Most recent dead letters, newest first
    async fn dead_letters(&self, limit: usize) -> Result<Vec<DeadLetter>, QueueBackendError>;

    async fn stats(&self) -> QueueBackendStats;
}
