//! Provider sender abstraction.
//!
//! Workers only see `MessageSender`; the concrete provider client and the
//! log-only development sender both implement it.

use std::sync::Arc;

use async_trait::async_trait;

use crate::config::ProviderConfig;
use crate::queue::DispatchJob;

use super::{CloudApiSender, DeliveryError};

/// Provider acknowledgement of an accepted message
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SendReceipt {
    /// Provider message id, echoed in status callbacks
    pub message_id: String,
}

#[async_trait]
pub trait MessageSender: Send + Sync {
    /// Submit one job's payload to the provider.
    async fn send(&self, job: &DispatchJob) -> Result<SendReceipt, DeliveryError>;

    /// Short provider name for logs
    fn provider(&self) -> &'static str;
}

/// Development sender: logs the payload instead of calling a provider.
pub struct LoggingSender;

#[async_trait]
impl MessageSender for LoggingSender {
    async fn send(&self, job: &DispatchJob) -> Result<SendReceipt, DeliveryError> {
        let message_id = format!("log.{}", uuid::Uuid::new_v4().simple());

        tracing::info!(
            provider = self.provider(),
            job_id = %job.id,
            recipient = %job.recipient,
            template = %job.payload.name,
            language = %job.payload.language.code,
            message_id = %message_id,
            "Simulated template message delivery"
        );

        Ok(SendReceipt { message_id })
    }

    fn provider(&self) -> &'static str {
        "logging"
    }
}

/// Pick the provider client when credentials are configured, otherwise the
/// logging sender.
pub fn create_message_sender(config: &ProviderConfig) -> Result<Arc<dyn MessageSender>, DeliveryError> {
    match (&config.phone_number_id, &config.access_token) {
        (Some(phone_number_id), Some(access_token)) => {
            tracing::info!(
                provider = "cloud_api",
                base_url = %config.api_base_url,
                phone_number_id = %phone_number_id,
                "Creating provider message sender"
            );
            Ok(Arc::new(CloudApiSender::new(config)?))
        }
        _ => {
            tracing::warn!(
                "Provider credentials not configured, messages will only be logged"
            );
            Ok(Arc::new(LoggingSender))
        }
    }
}
