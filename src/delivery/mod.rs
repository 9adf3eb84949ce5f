//! Asynchronous delivery of queued template messages.
//!
//! Delivery failures never reach the original caller; they are visible only
//! through logs, metrics and the queue's dead letters.

mod cloud_api;
mod sender;
mod worker;

use thiserror::Error;

pub use cloud_api::CloudApiSender;
pub use sender::{create_message_sender, LoggingSender, MessageSender, SendReceipt};
pub use worker::{spawn_workers, DeliveryWorker, JobOutcome};

#[derive(Debug, Error)]
pub enum DeliveryError {
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("Provider rejected message with status {status}: {body}")]
    Rejected { status: u16, body: String },

    #[error("Invalid provider response: {0}")]
    InvalidResponse(String),

    #[error("Provider setting not configured: {0}")]
    NotConfigured(&'static str),
}
