//! Inbound delivery-status callbacks and their authentication.

mod handler;
mod models;
mod verifier;

pub use handler::{receive_status_callback, verify_subscription, webhook_routes};
pub use models::{
    ChangeValue, MessageStatus, StatusError, VerifyQuery, WebhookChange, WebhookEntry,
    WebhookPayload,
};
pub use verifier::{constant_time_eq, verify};
