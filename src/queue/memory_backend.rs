//! In-memory dispatch queue backend.
//!
//! Jobs are lost on restart. Suitable for development and single-instance
//! deployments.

use std::collections::{BTreeMap, VecDeque};
use std::sync::atomic::{AtomicU64, Ordering};

use async_trait::async_trait;
use chrono::Utc;
use tokio::sync::Mutex;

use super::backend::{DeadLetter, DispatchQueueBackend, QueueBackendError, QueueBackendStats};
use super::job::DispatchJob;

/// Jobs ordered by `(ready_at millis, insertion sequence)`.
pub struct MemoryQueueBackend {
    pending: Mutex<BTreeMap<(i64, u64), DispatchJob>>,
    dead: Mutex<VecDeque<DeadLetter>>,
    seq: AtomicU64,
    dead_letter_retention: usize,
}

impl MemoryQueueBackend {
    pub fn new(dead_letter_retention: usize) -> Self {
        Self {
            pending: Mutex::new(BTreeMap::new()),
            dead: Mutex::new(VecDeque::new()),
            seq: AtomicU64::new(0),
            dead_letter_retention: dead_letter_retention.max(1),
        }
    }
}

impl Default for MemoryQueueBackend {
    fn default() -> Self {
        Self::new(1000)
    }
}

#[async_trait]
impl DispatchQueueBackend for MemoryQueueBackend {
    async fn push(&self, job: DispatchJob) -> Result<(), QueueBackendError> {
        let seq = self.seq.fetch_add(1, Ordering::Relaxed);
        let key = (job.ready_at.timestamp_millis(), seq);

        let mut pending = self.pending.lock().await;
        tracing::debug!(
            job_id = %job.id,
            attempts = job.attempts,
            queue_size = pending.len() + 1,
            "Job stored in memory queue"
        );
        pending.insert(key, job);

        Ok(())
    }

    async fn claim(&self) -> Result<Option<DispatchJob>, QueueBackendError> {
        let now_ms = Utc::now().timestamp_millis();
        let mut pending = self.pending.lock().await;

        match pending.first_key_value() {
            Some((&(ready_ms, _), _)) if ready_ms <= now_ms => {
                Ok(pending.pop_first().map(|(_, job)| job))
            }
            _ => Ok(None),
        }
    }

    async fn mark_failed(&self, job: DispatchJob, error: &str) -> Result<(), QueueBackendError> {
        let mut dead = self.dead.lock().await;
        dead.push_front(DeadLetter::new(job, error));

        while dead.len() > self.dead_letter_retention {
            dead.pop_back();
        }

        Ok(())
    }

    async fn dead_letters(&self, limit: usize) -> Result<Vec<DeadLetter>, QueueBackendError> {
        let dead = self.dead.lock().await;
        Ok(dead.iter().take(limit).cloned().collect())
    }

    async fn stats(&self) -> QueueBackendStats {
        let now_ms = Utc::now().timestamp_millis();
        let (pending, due) = {
            let pending = self.pending.lock().await;
            let due = pending.keys().take_while(|(ready_ms, _)| *ready_ms <= now_ms).count();
            (pending.len(), due)
        };

        QueueBackendStats {
            backend_type: "memory".to_string(),
            pending,
            due,
            dead_letters: self.dead.lock().await.len(),
            dead_letter_retention: self.dead_letter_retention,
        }
    }
}
