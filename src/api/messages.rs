//! Templated message submission and dead-letter inspection.

use axum::{
    extract::{Query, State},
    http::StatusCode,
    Json,
};
use serde::{Deserialize, Serialize};

use crate::error::{AppError, Result};
use crate::queue::{DeadLetter, DispatchError, JobId};
use crate::server::AppState;
use crate::template::Variables;

/// Upper bound on dead letters returned per request
const MAX_DEAD_LETTER_PAGE: usize = 500;

#[derive(Debug, Deserialize)]
pub struct SendTemplateRequest {
    pub recipient: String,
    pub template_id: String,
    /// Defaults to the configured default language
    #[serde(default)]
    pub language: Option<String>,
    #[serde(default)]
    pub variables: Variables,
    #[serde(default)]
    pub tracking_id: Option<String>,
}

#[derive(Debug, Serialize)]
pub struct SendTemplateResponse {
    pub job_id: JobId,
    pub status: &'static str,
    /// Provider template name that was queued
    pub template: String,
    /// Language actually used after any fallback
    pub language: String,
}

/// POST /api/v1/messages/template
#[tracing::instrument(name = "api.send_template", skip_all)]
pub async fn send_template(
    State(state): State<AppState>,
    Json(request): Json<SendTemplateRequest>,
) -> Result<(StatusCode, Json<SendTemplateResponse>)> {
    tracing::debug!(
        template_id = %request.template_id,
        language = ?request.language,
        "Template send requested"
    );

    if request.recipient.trim().is_empty() {
        return Err(AppError::Validation("recipient is required".to_string()));
    }
    if request.template_id.trim().is_empty() {
        return Err(AppError::Validation("template_id is required".to_string()));
    }

    let language = request
        .language
        .as_deref()
        .filter(|l| !l.is_empty())
        .unwrap_or_else(|| state.resolver.store().default_language());

    let payload = state
        .resolver
        .resolve(&request.template_id, language, &request.variables)
        .await?;

    let template = payload.name.clone();
    let resolved_language = payload.language.code.clone();

    let job_id = state
        .dispatch_queue
        .enqueue(&request.recipient, payload, request.tracking_id)
        .await?;

    Ok((
        StatusCode::ACCEPTED,
        Json(SendTemplateResponse {
            job_id,
            status: "queued",
            template,
            language: resolved_language,
        }),
    ))
}

#[derive(Debug, Deserialize)]
pub struct DeadLetterQuery {
    #[serde(default = "default_dead_letter_limit")]
    pub limit: usize,
}

fn default_dead_letter_limit() -> usize {
    50
}

#[derive(Debug, Serialize)]
pub struct DeadLetterResponse {
    pub count: usize,
    pub dead_letters: Vec<DeadLetter>,
}

/// GET /api/v1/dead-letters - most recent terminally failed jobs
pub async fn list_dead_letters(
    State(state): State<AppState>,
    Query(query): Query<DeadLetterQuery>,
) -> Result<Json<DeadLetterResponse>> {
    let limit = query.limit.min(MAX_DEAD_LETTER_PAGE);

    let dead_letters = state
        .dispatch_queue
        .backend()
        .dead_letters(limit)
        .await
        .map_err(DispatchError::QueueUnavailable)?;

    Ok(Json(DeadLetterResponse {
        count: dead_letters.len(),
        dead_letters,
    }))
}
