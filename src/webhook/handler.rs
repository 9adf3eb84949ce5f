//! Inbound delivery-status webhook endpoints.

use axum::{
    body::Bytes,
    extract::{Query, State},
    http::{header, HeaderMap, StatusCode},
    response::{IntoResponse, Response},
    routing::get,
    Router,
};

use crate::metrics::WebhookMetrics;
use crate::server::AppState;

use super::{verify, VerifyQuery, WebhookPayload};

pub fn webhook_routes() -> Router<AppState> {
    Router::new().route(
        "/webhooks/messages",
        get(verify_subscription).post(receive_status_callback),
    )
}

/// POST /webhooks/messages - provider delivery-status callback
///
/// The `Authorization` header is checked before the body is parsed.
#[tracing::instrument(name = "webhook.callback", skip(state, headers, body))]
pub async fn receive_status_callback(
    State(state): State<AppState>,
    headers: HeaderMap,
    body: Bytes,
) -> Response {
    let received = headers
        .get(header::AUTHORIZATION)
        .and_then(|v| v.to_str().ok());
    let expected = state.settings.webhook.token.as_deref().unwrap_or_default();

    if !verify(received, expected) {
        WebhookMetrics::record_rejected();
        tracing::warn!(
            has_authorization = received.is_some(),
            token_configured = !expected.is_empty(),
            "Rejected webhook callback with invalid token"
        );
        return StatusCode::UNAUTHORIZED.into_response();
    }

    WebhookMetrics::record_accepted();

    let payload: WebhookPayload = match serde_json::from_slice(&body) {
        Ok(payload) => payload,
        Err(e) => {
            tracing::warn!(error = %e, "Malformed webhook callback body");
            return StatusCode::BAD_REQUEST.into_response();
        }
    };

    let mut processed = 0usize;
    for status in payload.statuses() {
        WebhookMetrics::record_status(&status.status);
        processed += 1;

        if status.errors.is_empty() {
            tracing::info!(
                message_id = %status.id,
                status = %status.status,
                recipient_id = ?status.recipient_id,
                tracking_id = ?status.biz_opaque_callback_data,
                "Delivery status received"
            );
        } else {
            for error in &status.errors {
                tracing::warn!(
                    message_id = %status.id,
                    status = %status.status,
                    tracking_id = ?status.biz_opaque_callback_data,
                    error_code = ?error.code,
                    error_title = ?error.title,
                    error_message = ?error.message,
                    "Delivery status reported an error"
                );
            }
        }
    }

    tracing::debug!(statuses = processed, "Webhook callback processed");
    StatusCode::OK.into_response()
}

/// GET /webhooks/messages - subscription verification handshake
pub async fn verify_subscription(
    State(state): State<AppState>,
    Query(query): Query<VerifyQuery>,
) -> Response {
    let expected = state
        .settings
        .webhook
        .verify_token
        .as_deref()
        .unwrap_or_default();

    let mode_ok = query.mode.as_deref() == Some("subscribe");
    let token_ok = verify(query.verify_token.as_deref(), expected);

    match (mode_ok && token_ok, query.challenge) {
        (true, Some(challenge)) => {
            tracing::info!("Webhook subscription verified");
            (StatusCode::OK, challenge).into_response()
        }
        _ => {
            tracing::warn!(mode = ?query.mode, "Webhook subscription verification failed");
            StatusCode::FORBIDDEN.into_response()
        }
    }
}
