//! Producer side of the dispatch queue.

use std::sync::Arc;

use crate::metrics::QueueMetrics;
use crate::template::BuiltPayload;

use super::backend::DispatchQueueBackend;
use super::job::{DispatchJob, JobId, MAX_TRACKING_ID_CHARS};
use super::{DispatchError, DispatchResult, RetryPolicy};

/// Hands built payloads to the backing queue and returns a job id.
///
/// The only I/O on this path is the single durable write to the backend;
/// delivery happens later in a [`DeliveryWorker`](crate::delivery::DeliveryWorker).
#[derive(Clone)]
pub struct DispatchQueue {
    backend: Arc<dyn DispatchQueueBackend>,
    retry_policy: RetryPolicy,
}

impl DispatchQueue {
    pub fn new(backend: Arc<dyn DispatchQueueBackend>, retry_policy: RetryPolicy) -> Self {
        Self {
            backend,
            retry_policy,
        }
    }

    pub fn backend(&self) -> &Arc<dyn DispatchQueueBackend> {
        &self.backend
    }

    pub fn retry_policy(&self) -> &RetryPolicy {
        &self.retry_policy
    }

    /// Record a job for `recipient` and return its id.
    ///
    /// Fails with [`DispatchError::QueueUnavailable`] if the backend rejects
    /// the write; the message must then be treated as not sent.
    pub async fn enqueue(
        &self,
        recipient: &str,
        payload: BuiltPayload,
        tracking_id: Option<String>,
    ) -> DispatchResult<JobId> {
        if let Some(ref tracking_id) = tracking_id {
            let len = tracking_id.chars().count();
            if len > MAX_TRACKING_ID_CHARS {
                tracing::debug!(
                    length = len,
                    max = MAX_TRACKING_ID_CHARS,
                    "Truncating tracking id"
                );
                QueueMetrics::record_tracking_id_truncated();
            }
        }

        let job = DispatchJob::new(recipient, payload, tracking_id, self.retry_policy.clone());
        let job_id = job.id;
        let template = job.payload.name.clone();

        if let Err(e) = self.backend.push(job).await {
            QueueMetrics::record_rejected();
            tracing::error!(
                error = %e,
                job_id = %job_id,
                template = %template,
                "Queue rejected dispatch job"
            );
            return Err(DispatchError::QueueUnavailable(e));
        }

        QueueMetrics::record_enqueued();
        tracing::info!(
            job_id = %job_id,
            template = %template,
            "Dispatch job enqueued"
        );

        Ok(job_id)
    }
}
