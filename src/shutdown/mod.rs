//! Graceful shutdown of the delivery side.
//!
//! 1. Signals delivery workers to stop claiming jobs
//! 2. Waits for in-flight sends to finish
//! 3. Reports jobs left in the queue (lost if the backend is in-memory)

use std::sync::Arc;
use std::time::{Duration, Instant};

use futures::stream::{FuturesUnordered, StreamExt};
use tokio::sync::broadcast;
use tokio::task::JoinHandle;
use tokio::time::timeout;

use crate::queue::DispatchQueueBackend;

#[derive(Debug, Clone)]
pub struct ShutdownConfig {
    /// Time to wait for workers to finish in-flight sends
    pub drain_timeout: Duration,
}

impl Default for ShutdownConfig {
    fn default() -> Self {
        Self {
            drain_timeout: Duration::from_secs(15),
        }
    }
}

pub struct GracefulShutdown {
    backend: Arc<dyn DispatchQueueBackend>,
    shutdown_tx: broadcast::Sender<()>,
    workers: Vec<JoinHandle<()>>,
    config: ShutdownConfig,
}

impl GracefulShutdown {
    pub fn new(
        backend: Arc<dyn DispatchQueueBackend>,
        shutdown_tx: broadcast::Sender<()>,
        workers: Vec<JoinHandle<()>>,
    ) -> Self {
        Self::with_config(backend, shutdown_tx, workers, ShutdownConfig::default())
    }

    pub fn with_config(
        backend: Arc<dyn DispatchQueueBackend>,
        shutdown_tx: broadcast::Sender<()>,
        workers: Vec<JoinHandle<()>>,
        config: ShutdownConfig,
    ) -> Self {
        Self {
            backend,
            shutdown_tx,
            workers,
            config,
        }
    }

    #[tracing::instrument(name = "graceful_shutdown", skip(self), fields(workers = self.workers.len()))]
    pub async fn execute(self, reason: &str) -> ShutdownResult {
        let start = Instant::now();
        let workers_total = self.workers.len();

        tracing::info!(reason = %reason, "Stopping delivery workers");
        // Workers may already have exited; no receivers is fine
        let _ = self.shutdown_tx.send(());

        let mut pending: FuturesUnordered<_> = self.workers.into_iter().collect();
        let mut workers_stopped = 0;

        let drain = async {
            while let Some(joined) = pending.next().await {
                match joined {
                    Ok(()) => workers_stopped += 1,
                    Err(e) => tracing::warn!(error = %e, "Delivery worker ended abnormally"),
                }
            }
        };

        if timeout(self.config.drain_timeout, drain).await.is_err() {
            tracing::warn!(
                stopped = workers_stopped,
                total = workers_total,
                "Timed out waiting for delivery workers"
            );
        }

        let stats = self.backend.stats().await;
        if stats.pending > 0 {
            if stats.backend_type == "memory" {
                tracing::warn!(
                    pending_jobs = stats.pending,
                    "In-memory queue still holds jobs; they will be lost"
                );
            } else {
                tracing::info!(
                    pending_jobs = stats.pending,
                    backend = %stats.backend_type,
                    "Pending jobs remain in durable queue"
                );
            }
        }

        let result = ShutdownResult {
            success: workers_stopped == workers_total,
            workers_total,
            workers_stopped,
            pending_jobs: stats.pending,
            duration: start.elapsed(),
        };

        tracing::info!(
            workers_stopped = result.workers_stopped,
            pending_jobs = result.pending_jobs,
            duration_ms = result.duration.as_millis() as u64,
            "Graceful shutdown completed"
        );

        result
    }
}

#[derive(Debug, Default)]
pub struct ShutdownResult {
    /// Every worker stopped within the drain timeout
    pub success: bool,
    pub workers_total: usize,
    pub workers_stopped: usize,
    /// Jobs still queued after workers stopped
    pub pending_jobs: usize,
    pub duration: Duration,
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::queue::MemoryQueueBackend;

    #[tokio::test]
    async fn test_shutdown_without_workers() {
        let (tx, _) = broadcast::channel(1);
        let backend = Arc::new(MemoryQueueBackend::default());

        let result = GracefulShutdown::new(backend, tx, Vec::new())
            .execute("test shutdown")
            .await;

        assert!(result.success);
        assert_eq!(result.workers_total, 0);
        assert_eq!(result.pending_jobs, 0);
    }

    #[tokio::test]
    async fn test_waits_for_signalled_workers() {
        let (tx, _) = broadcast::channel(1);
        let backend = Arc::new(MemoryQueueBackend::default());

        let workers = (0..3)
            .map(|_| {
                let mut rx = tx.subscribe();
                tokio::spawn(async move {
                    let _ = rx.recv().await;
                })
            })
            .collect();

        let result = GracefulShutdown::new(backend, tx, workers)
            .execute("test shutdown")
            .await;

        assert!(result.success);
        assert_eq!(result.workers_stopped, 3);
    }

    #[tokio::test]
    async fn test_drain_timeout() {
        let (tx, _) = broadcast::channel(1);
        let backend = Arc::new(MemoryQueueBackend::default());
        let stuck = tokio::spawn(async {
            tokio::time::sleep(Duration::from_secs(60)).await;
        });

        let result = GracefulShutdown::with_config(
            backend,
            tx,
            vec![stuck],
            ShutdownConfig {
                drain_timeout: Duration::from_millis(50),
            },
        )
        .execute("test shutdown")
        .await;

        assert!(!result.success);
        assert_eq!(result.workers_stopped, 0);
    }
}
