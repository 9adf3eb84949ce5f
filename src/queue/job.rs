//! Dispatch job model.

use std::fmt;
use std::str::FromStr;
use std::time::Duration;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::template::BuiltPayload;

use super::RetryPolicy;

/// Provider limit on opaque callback data
pub const MAX_TRACKING_ID_CHARS: usize = 512;

/// Opaque handle returned to the caller on enqueue.
///
/// Unique per enqueue; there is no deduplication of identical payloads.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct JobId(Uuid);

impl JobId {
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }
}

impl Default for JobId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for JobId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.0.fmt(f)
    }
}

impl FromStr for JobId {
    type Err = uuid::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Uuid::parse_str(s).map(Self)
    }
}

/// A templated message waiting for delivery.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DispatchJob {
    pub id: JobId,

    /// Provider recipient identifier (e.g. phone number)
    pub recipient: String,

    pub payload: BuiltPayload,

    /// Caller correlation token echoed back in status callbacks
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tracking_id: Option<String>,

    pub retry_policy: RetryPolicy,

    /// Delivery attempts made so far
    #[serde(default)]
    pub attempts: u32,

    pub enqueued_at: DateTime<Utc>,

    /// Earliest time a worker may claim the job
    pub ready_at: DateTime<Utc>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub last_error: Option<String>,
}

impl DispatchJob {
    /// Create a job that is immediately due. Tracking ids longer than
    /// [`MAX_TRACKING_ID_CHARS`] are truncated.
    pub fn new(
        recipient: impl Into<String>,
        payload: BuiltPayload,
        tracking_id: Option<String>,
        retry_policy: RetryPolicy,
    ) -> Self {
        let now = Utc::now();
        Self {
            id: JobId::new(),
            recipient: recipient.into(),
            payload,
            tracking_id: tracking_id.map(truncate_tracking_id),
            retry_policy,
            attempts: 0,
            enqueued_at: now,
            ready_at: now,
            last_error: None,
        }
    }

    pub fn is_due(&self, now: DateTime<Utc>) -> bool {
        self.ready_at <= now
    }

    /// Whether the retry budget allows another attempt
    pub fn can_retry(&self) -> bool {
        self.retry_policy.allows_retry(self.attempts)
    }

    /// Record a failed attempt and push `ready_at` out by the policy's backoff.
    pub fn schedule_retry(&mut self, error: impl Into<String>) -> Duration {
        let delay = self.retry_policy.delay_for_attempt(self.attempts);
        self.last_error = Some(error.into());
        self.ready_at = Utc::now()
            + chrono::Duration::from_std(delay).unwrap_or_else(|_| chrono::Duration::zero());
        delay
    }
}

/// Truncate to the provider limit, never splitting a character.
pub fn truncate_tracking_id(tracking_id: String) -> String {
    match tracking_id.char_indices().nth(MAX_TRACKING_ID_CHARS) {
        Some((cut, _)) => tracking_id[..cut].to_string(),
        None => tracking_id,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::template::LanguageDescriptor;

    fn payload() -> BuiltPayload {
        BuiltPayload {
            name: "otp".to_string(),
            language: LanguageDescriptor {
                code: "en".to_string(),
            },
            components: None,
        }
    }

    #[test]
    fn test_job_ids_are_unique() {
        let a = DispatchJob::new("+15550001", payload(), None, RetryPolicy::default());
        let b = DispatchJob::new("+15550001", payload(), None, RetryPolicy::default());
        assert_ne!(a.id, b.id);
    }

    #[test]
    fn test_job_id_round_trips_through_string() {
        let id = JobId::new();
        let parsed: JobId = id.to_string().parse().unwrap();
        assert_eq!(parsed, id);
    }

    #[test]
    fn test_tracking_id_truncated_to_limit() {
        let long = "x".repeat(600);
        let job = DispatchJob::new("+1", payload(), Some(long), RetryPolicy::default());
        assert_eq!(job.tracking_id.unwrap().chars().count(), MAX_TRACKING_ID_CHARS);

        let exact = "y".repeat(MAX_TRACKING_ID_CHARS);
        assert_eq!(truncate_tracking_id(exact.clone()), exact);
    }

    #[test]
    fn test_truncation_respects_char_boundaries() {
        let long = "é".repeat(600);
        let truncated = truncate_tracking_id(long);
        assert_eq!(truncated.chars().count(), MAX_TRACKING_ID_CHARS);
        assert_eq!(truncated.len(), MAX_TRACKING_ID_CHARS * 2);
    }

    #[test]
    fn test_new_job_is_due_immediately() {
        let job = DispatchJob::new("+1", payload(), None, RetryPolicy::default());
        assert!(job.is_due(Utc::now()));
        assert_eq!(job.attempts, 0);
    }

    #[test]
    fn test_schedule_retry_moves_ready_at() {
        let policy = RetryPolicy {
            max_attempts: 3,
            initial_delay_ms: 60_000,
            max_delay_ms: 60_000,
            multiplier: 2.0,
            jitter_factor: 0.0,
        };
        let mut job = DispatchJob::new("+1", payload(), None, policy);
        job.attempts = 1;

        let delay = job.schedule_retry("HTTP 503");
        assert_eq!(delay, Duration::from_secs(60));
        assert!(!job.is_due(Utc::now()));
        assert_eq!(job.last_error.as_deref(), Some("HTTP 503"));
        assert!(job.can_retry());
    }
}
