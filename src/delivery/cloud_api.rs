//! HTTP client for the provider's business messaging API.

use std::time::Duration;

use async_trait::async_trait;
use reqwest::Client;
use serde::{Deserialize, Serialize};

use crate::config::ProviderConfig;
use crate::queue::DispatchJob;
use crate::template::BuiltPayload;

use super::{DeliveryError, MessageSender, SendReceipt};

/// Longest provider error body kept in job errors
const MAX_ERROR_BODY_CHARS: usize = 512;

#[derive(Debug, Serialize)]
struct SendTemplateRequest<'a> {
    messaging_product: &'static str,
    recipient_type: &'static str,
    to: &'a str,
    #[serde(rename = "type")]
    kind: &'static str,
    template: &'a BuiltPayload,
    #[serde(skip_serializing_if = "Option::is_none")]
    biz_opaque_callback_data: Option<&'a str>,
}

#[derive(Debug, Deserialize)]
struct SendTemplateResponse {
    #[serde(default)]
    messages: Vec<SentMessage>,
}

#[derive(Debug, Deserialize)]
struct SentMessage {
    id: String,
}

pub struct CloudApiSender {
    http_client: Client,
    messages_url: String,
    access_token: String,
}

impl CloudApiSender {
    pub fn new(config: &ProviderConfig) -> Result<Self, DeliveryError> {
        let phone_number_id = config
            .phone_number_id
            .as_deref()
            .ok_or(DeliveryError::NotConfigured("phone_number_id"))?;
        let access_token = config
            .access_token
            .clone()
            .ok_or(DeliveryError::NotConfigured("access_token"))?;

        let http_client = Client::builder()
            .timeout(Duration::from_secs(config.timeout_seconds))
            .build()?;

        Ok(Self {
            http_client,
            messages_url: format!(
                "{}/{}/messages",
                config.api_base_url.trim_end_matches('/'),
                phone_number_id
            ),
            access_token,
        })
    }

    pub fn messages_url(&self) -> &str {
        &self.messages_url
    }
}

#[async_trait]
impl MessageSender for CloudApiSender {
    async fn send(&self, job: &DispatchJob) -> Result<SendReceipt, DeliveryError> {
        let request = SendTemplateRequest {
            messaging_product: "whatsapp",
            recipient_type: "individual",
            to: &job.recipient,
            kind: "template",
            template: &job.payload,
            biz_opaque_callback_data: job.tracking_id.as_deref(),
        };

        tracing::debug!(
            job_id = %job.id,
            template = %job.payload.name,
            attempt = job.attempts,
            "Sending template message to provider"
        );

        let response = self
            .http_client
            .post(&self.messages_url)
            .bearer_auth(&self.access_token)
            .json(&request)
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(DeliveryError::Rejected {
                status: status.as_u16(),
                body: body.chars().take(MAX_ERROR_BODY_CHARS).collect(),
            });
        }

        let parsed: SendTemplateResponse = response.json().await?;
        let message_id = parsed
            .messages
            .into_iter()
            .next()
            .map(|m| m.id)
            .ok_or_else(|| DeliveryError::InvalidResponse("missing messages[0].id".to_string()))?;

        Ok(SendReceipt { message_id })
    }

    fn provider(&self) -> &'static str {
        "cloud_api"
    }
}
