//! Dispatch queue for templated messages.
//!
//! `DispatchQueue::enqueue` durably records a job and returns its id
//! immediately; delivery workers claim jobs from the same backend later.
//!
//! # Backends
//!
//! - **Memory** (default): jobs are lost on restart
//! - **Redis**: sorted set scored by `ready_at`, survives restarts
//!
//! ```toml
//! [queue]
//! backend = "redis"
//! redis_prefix = "dispatch:jobs"
//! ```

mod backend;
mod dispatch;
mod factory;
mod job;
mod memory_backend;
mod redis_backend;
mod retry;

use thiserror::Error;

pub use backend::{DeadLetter, DispatchQueueBackend, QueueBackendError, QueueBackendStats};
pub use dispatch::DispatchQueue;
pub use factory::create_queue_backend;
pub use job::{truncate_tracking_id, DispatchJob, JobId, MAX_TRACKING_ID_CHARS};
pub use memory_backend::MemoryQueueBackend;
pub use redis_backend::RedisQueueBackend;
pub use retry::RetryPolicy;

#[derive(Debug, Error)]
pub enum DispatchError {
    /// The backing store rejected the durable write
    #[error("Dispatch queue unavailable: {0}")]
    QueueUnavailable(#[source] QueueBackendError),
}

pub type DispatchResult<T> = Result<T, DispatchError>;
