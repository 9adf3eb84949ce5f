//! Consumer side of the dispatch queue.

use std::collections::VecDeque;
use std::sync::Arc;
use std::time::{Duration, Instant};

use tokio::sync::broadcast;
use tokio::sync::broadcast::error::TryRecvError;
use tokio::sync::Mutex;
use tokio::task::JoinHandle;

use crate::config::WorkerConfig;
use crate::metrics::DeliveryMetrics;
use crate::queue::{DispatchJob, DispatchQueueBackend, JobId, QueueBackendError};

use super::MessageSender;

/// What one `process_next` call did
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum JobOutcome {
    /// No job was due
    Idle,
    Delivered { job_id: JobId, message_id: String },
    /// Failed and rescheduled after `delay`
    Retrying {
        job_id: JobId,
        attempts: u32,
        delay: Duration,
    },
    /// Moved to dead letters
    Failed { job_id: JobId, attempts: u32 },
    /// The backend refused the follow-up write; the worker holds the job
    /// and writes it back before claiming anything else
    Held { job_id: JobId, attempts: u32 },
}

/// A write the backend refused after the job had already been claimed.
#[derive(Debug)]
enum HeldWrite {
    Requeue(DispatchJob),
    DeadLetter { job: DispatchJob, error: String },
}

impl HeldWrite {
    fn job(&self) -> &DispatchJob {
        match self {
            HeldWrite::Requeue(job) | HeldWrite::DeadLetter { job, .. } => job,
        }
    }
}

/// Claims due jobs and hands them to the provider, applying each job's
/// retry policy on failure.
///
/// A claimed job is no longer in the backend. If the write that puts it
/// back (retry or dead letter) fails, the worker keeps the job in memory
/// and stops claiming until that write succeeds.
pub struct DeliveryWorker {
    id: usize,
    backend: Arc<dyn DispatchQueueBackend>,
    sender: Arc<dyn MessageSender>,
    poll_interval: Duration,
    held: Mutex<VecDeque<HeldWrite>>,
}

impl DeliveryWorker {
    pub fn new(
        id: usize,
        backend: Arc<dyn DispatchQueueBackend>,
        sender: Arc<dyn MessageSender>,
        poll_interval: Duration,
    ) -> Self {
        Self {
            id,
            backend,
            sender,
            poll_interval,
            held: Mutex::new(VecDeque::new()),
        }
    }

    /// Number of claimed jobs waiting to be written back
    pub async fn held_jobs(&self) -> usize {
        self.held.lock().await.len()
    }

    /// Claim and attempt at most one job.
    ///
    /// Held jobs are written back first; while that fails, nothing new is
    /// claimed and the backend error is returned.
    #[tracing::instrument(name = "delivery.process", skip(self), fields(worker_id = self.id))]
    pub async fn process_next(&self) -> Result<JobOutcome, QueueBackendError> {
        self.flush_held().await?;

        let Some(mut job) = self.backend.claim().await? else {
            return Ok(JobOutcome::Idle);
        };

        job.attempts += 1;
        let job_id = job.id;
        let start = Instant::now();

        match self.sender.send(&job).await {
            Ok(receipt) => {
                DeliveryMetrics::record_delivered(start.elapsed());
                tracing::info!(
                    job_id = %job_id,
                    message_id = %receipt.message_id,
                    provider = self.sender.provider(),
                    attempts = job.attempts,
                    "Template message delivered"
                );
                Ok(JobOutcome::Delivered {
                    job_id,
                    message_id: receipt.message_id,
                })
            }
            Err(e) if job.can_retry() => {
                let attempts = job.attempts;
                let delay = job.schedule_retry(e.to_string());
                DeliveryMetrics::record_retry(start.elapsed());
                tracing::warn!(
                    job_id = %job_id,
                    error = %e,
                    attempts = attempts,
                    max_attempts = job.retry_policy.max_attempts,
                    retry_in_ms = delay.as_millis() as u64,
                    "Delivery failed, scheduling retry"
                );

                match self.backend.push(job.clone()).await {
                    Ok(()) => Ok(JobOutcome::Retrying {
                        job_id,
                        attempts,
                        delay,
                    }),
                    Err(push_error) => {
                        DeliveryMetrics::record_backend_error();
                        tracing::error!(
                            job_id = %job_id,
                            error = %push_error,
                            "Failed to reschedule job, moving it to dead letters"
                        );
                        let reason =
                            format!("reschedule failed: {}; last delivery error: {}", push_error, e);
                        Ok(self.dead_letter_or_hold(job, reason, true).await)
                    }
                }
            }
            Err(e) => {
                let error = e.to_string();
                job.last_error = Some(error.clone());
                DeliveryMetrics::record_terminal_failure(start.elapsed());
                tracing::error!(
                    job_id = %job_id,
                    error = %error,
                    attempts = job.attempts,
                    recipient = %job.recipient,
                    template = %job.payload.name,
                    "Delivery failed permanently, retry budget exhausted"
                );

                Ok(self.dead_letter_or_hold(job, error, false).await)
            }
        }
    }

    /// Dead-letter `job`, or keep it for a later write if the backend
    /// refuses. A held job that still has budget is requeued on recovery.
    async fn dead_letter_or_hold(
        &self,
        job: DispatchJob,
        error: String,
        requeue_on_recovery: bool,
    ) -> JobOutcome {
        let job_id = job.id;
        let attempts = job.attempts;

        match self.backend.mark_failed(job.clone(), &error).await {
            Ok(()) => JobOutcome::Failed { job_id, attempts },
            Err(backend_error) => {
                DeliveryMetrics::record_backend_error();
                tracing::error!(
                    job_id = %job_id,
                    recipient = %job.recipient,
                    template = %job.payload.name,
                    attempts = attempts,
                    last_error = %error,
                    error = %backend_error,
                    "Queue backend refused claimed job, holding it until the backend recovers"
                );

                let write = if requeue_on_recovery {
                    HeldWrite::Requeue(job)
                } else {
                    HeldWrite::DeadLetter { job, error }
                };
                self.held.lock().await.push_back(write);
                JobOutcome::Held { job_id, attempts }
            }
        }
    }

    /// Write held jobs back in order, stopping at the first failure.
    async fn flush_held(&self) -> Result<(), QueueBackendError> {
        let mut held = self.held.lock().await;

        while let Some(write) = held.pop_front() {
            let result = match &write {
                HeldWrite::Requeue(job) => self.backend.push(job.clone()).await,
                HeldWrite::DeadLetter { job, error } => {
                    self.backend.mark_failed(job.clone(), error).await
                }
            };

            if let Err(e) = result {
                held.push_front(write);
                return Err(e);
            }
            tracing::info!(job_id = %write.job().id, "Held job written back to queue backend");
        }

        Ok(())
    }

    /// Process jobs until shutdown is signalled. An in-flight send is
    /// always finished before the loop exits.
    pub async fn run(self, mut shutdown: broadcast::Receiver<()>) {
        tracing::info!(
            worker_id = self.id,
            provider = self.sender.provider(),
            poll_interval_ms = self.poll_interval.as_millis() as u64,
            "Delivery worker started"
        );

        loop {
            let idle = match self.process_next().await {
                Ok(JobOutcome::Idle) | Ok(JobOutcome::Held { .. }) => true,
                Ok(_) => false,
                Err(e) => {
                    DeliveryMetrics::record_backend_error();
                    let held_jobs = self.held_jobs().await;
                    tracing::warn!(
                        worker_id = self.id,
                        held_jobs = held_jobs,
                        error = %e,
                        "Queue backend error in delivery worker"
                    );
                    true
                }
            };

            if idle {
                tokio::select! {
                    _ = shutdown.recv() => break,
                    _ = tokio::time::sleep(self.poll_interval) => {}
                }
            } else if !matches!(shutdown.try_recv(), Err(TryRecvError::Empty)) {
                break;
            }
        }

        if let Err(e) = self.flush_held().await {
            for write in self.held.lock().await.iter() {
                let job = write.job();
                tracing::error!(
                    worker_id = self.id,
                    job_id = %job.id,
                    recipient = %job.recipient,
                    template = %job.payload.name,
                    attempts = job.attempts,
                    last_error = ?job.last_error,
                    error = %e,
                    "Held job could not be written back before shutdown"
                );
            }
        }

        tracing::info!(worker_id = self.id, "Delivery worker stopped");
    }
}

/// Spawn `[worker].concurrency` delivery loops sharing one backend.
pub fn spawn_workers(
    config: &WorkerConfig,
    backend: Arc<dyn DispatchQueueBackend>,
    sender: Arc<dyn MessageSender>,
    shutdown_tx: &broadcast::Sender<()>,
) -> Vec<JoinHandle<()>> {
    let poll_interval = Duration::from_millis(config.poll_interval_ms.max(1));

    (0..config.concurrency.max(1))
        .map(|id| {
            let worker = DeliveryWorker::new(id, backend.clone(), sender.clone(), poll_interval);
            tokio::spawn(worker.run(shutdown_tx.subscribe()))
        })
        .collect()
}
