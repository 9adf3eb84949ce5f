//! HTTP surface tests driven through the router with `oneshot`.

use std::sync::Arc;

use axum::{
    body::{to_bytes, Body},
    http::{header, Request, StatusCode},
    Router,
};
use serde_json::{json, Value};
use tower::ServiceExt;

use template_dispatch_service::config::Settings;
use template_dispatch_service::queue::{
    DispatchJob, DispatchQueue, DispatchQueueBackend, JobId, MemoryQueueBackend, RetryPolicy,
};
use template_dispatch_service::server::{create_app, AppState};
use template_dispatch_service::template::{
    BuiltPayload, FileTemplateSource, LanguageDescriptor, TemplateResolver, TemplateStore,
};

const API_KEY: &str = "test-api-key";
const WEBHOOK_TOKEN: &str = "hook-secret";
const VERIFY_TOKEN: &str = "verify-me";

struct TestApp {
    _dir: tempfile::TempDir,
    app: Router,
    backend: Arc<MemoryQueueBackend>,
}

fn create_test_app(configure: impl FnOnce(&mut Settings)) -> TestApp {
    let dir = tempfile::tempdir().unwrap();
    std::fs::write(
        dir.path().join("en.json"),
        json!({
            "verification_code": {
                "metaTemplateName": "verification_code_v2",
                "languageCode": "en_US",
                "parameterOrder": ["code"]
            }
        })
        .to_string(),
    )
    .unwrap();

    let mut settings = Settings::default();
    settings.api.key = Some(API_KEY.to_string());
    settings.webhook.token = Some(WEBHOOK_TOKEN.to_string());
    settings.webhook.verify_token = Some(VERIFY_TOKEN.to_string());
    configure(&mut settings);

    let store = Arc::new(TemplateStore::new(
        Arc::new(FileTemplateSource::new(dir.path())),
        "en",
    ));
    let backend = Arc::new(MemoryQueueBackend::default());
    let queue = DispatchQueue::new(backend.clone(), RetryPolicy::default());

    let state = AppState::new(settings, TemplateResolver::new(store), queue, None);

    TestApp {
        _dir: dir,
        app: create_app(state),
        backend,
    }
}

fn send_request(body: Value, api_key: Option<&str>) -> Request<Body> {
    let mut builder = Request::builder()
        .method("POST")
        .uri("/api/v1/messages/template")
        .header(header::CONTENT_TYPE, "application/json");
    if let Some(key) = api_key {
        builder = builder.header("X-API-Key", key);
    }
    builder.body(Body::from(body.to_string())).unwrap()
}

fn webhook_request(authorization: Option<&str>, body: &str) -> Request<Body> {
    let mut builder = Request::builder()
        .method("POST")
        .uri("/webhooks/messages")
        .header(header::CONTENT_TYPE, "application/json");
    if let Some(auth) = authorization {
        builder = builder.header(header::AUTHORIZATION, auth);
    }
    builder.body(Body::from(body.to_string())).unwrap()
}

fn get_request(uri: &str, api_key: Option<&str>) -> Request<Body> {
    let mut builder = Request::builder().uri(uri);
    if let Some(key) = api_key {
        builder = builder.header("X-API-Key", key);
    }
    builder.body(Body::empty()).unwrap()
}

/// Record `count` terminally failed jobs, returning their ids oldest first
async fn seed_dead_letters(backend: &MemoryQueueBackend, count: usize) -> Vec<JobId> {
    let mut ids = Vec::with_capacity(count);
    for i in 0..count {
        let payload = BuiltPayload {
            name: "verification_code_v2".to_string(),
            language: LanguageDescriptor {
                code: "en_US".to_string(),
            },
            components: None,
        };
        let mut job = DispatchJob::new(
            format!("+1555000{}", i),
            payload,
            Some(format!("signup-{}", i)),
            RetryPolicy::default(),
        );
        job.attempts = 3;
        ids.push(job.id);
        backend
            .mark_failed(job, "provider rejected message: HTTP 400")
            .await
            .unwrap();
    }
    ids
}

async fn json_body(response: axum::response::Response) -> Value {
    let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
    serde_json::from_slice(&bytes).unwrap()
}

#[tokio::test]
async fn test_send_template_accepted() {
    let test = create_test_app(|_| {});

    let response = test
        .app
        .oneshot(send_request(
            json!({
                "recipient": "+15550001",
                "template_id": "verification_code",
                "language": "pt_BR",
                "variables": {"code": 482913},
                "tracking_id": "signup-77"
            }),
            Some(API_KEY),
        ))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::ACCEPTED);
    let body = json_body(response).await;
    assert_eq!(body["status"], "queued");
    assert_eq!(body["template"], "verification_code_v2");
    assert_eq!(body["language"], "en_US");
    assert!(body["job_id"].as_str().unwrap().parse::<uuid::Uuid>().is_ok());

    let queued = test.backend.claim().await.unwrap().unwrap();
    assert_eq!(queued.tracking_id.as_deref(), Some("signup-77"));
}

#[tokio::test]
async fn test_send_template_requires_api_key() {
    let test = create_test_app(|_| {});
    let body = json!({"recipient": "+1", "template_id": "verification_code"});

    let missing = test
        .app
        .clone()
        .oneshot(send_request(body.clone(), None))
        .await
        .unwrap();
    assert_eq!(missing.status(), StatusCode::UNAUTHORIZED);

    let wrong = test
        .app
        .oneshot(send_request(body, Some("nope")))
        .await
        .unwrap();
    assert_eq!(wrong.status(), StatusCode::UNAUTHORIZED);
    let body = json_body(wrong).await;
    assert_eq!(body["error"]["code"], "UNAUTHORIZED");
}

#[tokio::test]
async fn test_dead_letters_lists_failed_jobs() {
    let test = create_test_app(|_| {});
    let ids = seed_dead_letters(&test.backend, 2).await;

    let response = test
        .app
        .oneshot(get_request("/api/v1/dead-letters", Some(API_KEY)))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    let body = json_body(response).await;
    assert_eq!(body["count"], 2);

    // Newest first
    let newest = &body["dead_letters"][0];
    assert_eq!(newest["job"]["id"], ids[1].to_string());
    assert_eq!(newest["job"]["tracking_id"], "signup-1");
    assert_eq!(newest["job"]["attempts"], 3);
    assert_eq!(newest["error"], "provider rejected message: HTTP 400");
}

#[tokio::test]
async fn test_dead_letters_limit_defaults_and_cap() {
    let test = create_test_app(|_| {});
    seed_dead_letters(&test.backend, 510).await;

    let default_page = test
        .app
        .clone()
        .oneshot(get_request("/api/v1/dead-letters", Some(API_KEY)))
        .await
        .unwrap();
    assert_eq!(json_body(default_page).await["count"], 50);

    let small_page = test
        .app
        .clone()
        .oneshot(get_request("/api/v1/dead-letters?limit=3", Some(API_KEY)))
        .await
        .unwrap();
    assert_eq!(json_body(small_page).await["count"], 3);

    let capped = test
        .app
        .oneshot(get_request("/api/v1/dead-letters?limit=100000", Some(API_KEY)))
        .await
        .unwrap();
    let body = json_body(capped).await;
    assert_eq!(body["count"], 500);
    assert_eq!(body["dead_letters"].as_array().unwrap().len(), 500);
}

#[tokio::test]
async fn test_dead_letters_and_stats_require_api_key() {
    let test = create_test_app(|_| {});

    for uri in ["/api/v1/dead-letters", "/stats"] {
        let missing = test.app.clone().oneshot(get_request(uri, None)).await.unwrap();
        assert_eq!(missing.status(), StatusCode::UNAUTHORIZED, "{}", uri);

        let wrong = test
            .app
            .clone()
            .oneshot(get_request(uri, Some("nope")))
            .await
            .unwrap();
        assert_eq!(wrong.status(), StatusCode::UNAUTHORIZED, "{}", uri);
    }
}

#[tokio::test]
async fn test_stats_reports_queue_and_templates() {
    let test = create_test_app(|_| {});
    seed_dead_letters(&test.backend, 1).await;

    // Resolve once so the default language is cached
    let accepted = test
        .app
        .clone()
        .oneshot(send_request(
            json!({"recipient": "+15550001", "template_id": "verification_code"}),
            Some(API_KEY),
        ))
        .await
        .unwrap();
    assert_eq!(accepted.status(), StatusCode::ACCEPTED);

    let response = test
        .app
        .oneshot(get_request("/stats", Some(API_KEY)))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);

    let body = json_body(response).await;
    assert_eq!(body["queue"]["backend_type"], "memory");
    assert_eq!(body["queue"]["pending"], 1);
    assert_eq!(body["queue"]["dead_letters"], 1);
    assert_eq!(body["templates"]["default_language"], "en");
    assert_eq!(body["templates"]["cached_languages"][0]["language"], "en");
    assert_eq!(body["templates"]["cached_languages"][0]["templates"], 1);
}

#[tokio::test]
async fn test_metrics_exposes_dispatch_series() {
    let test = create_test_app(|_| {});

    let response = test
        .app
        .oneshot(get_request("/metrics", None))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    let content_type = response.headers()[header::CONTENT_TYPE].to_str().unwrap().to_string();
    assert!(content_type.starts_with("text/plain"));

    let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
    let text = String::from_utf8(bytes.to_vec()).unwrap();
    assert!(text.contains("dispatch_queue_pending_jobs"));
    assert!(text.contains("dispatch_queue_dead_letters"));
}

#[tokio::test]
async fn test_unknown_template_is_404() {
    let test = create_test_app(|_| {});

    let response = test
        .app
        .oneshot(send_request(
            json!({"recipient": "+1", "template_id": "nope"}),
            Some(API_KEY),
        ))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::NOT_FOUND);
    let body = json_body(response).await;
    assert_eq!(body["error"]["code"], "TEMPLATE_NOT_FOUND");
}

#[tokio::test]
async fn test_blank_recipient_is_400() {
    let test = create_test_app(|_| {});

    let response = test
        .app
        .oneshot(send_request(
            json!({"recipient": " ", "template_id": "verification_code"}),
            Some(API_KEY),
        ))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn test_health_is_public() {
    let test = create_test_app(|_| {});

    let response = test
        .app
        .oneshot(Request::builder().uri("/health").body(Body::empty()).unwrap())
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    let body = json_body(response).await;
    assert_eq!(body["status"], "healthy");
    assert_eq!(body["queue"]["backend"], "memory");
}

#[tokio::test]
async fn test_webhook_rejects_bad_token_before_parsing() {
    let test = create_test_app(|_| {});

    let unauthenticated = test
        .app
        .clone()
        .oneshot(webhook_request(None, "not even json"))
        .await
        .unwrap();
    assert_eq!(unauthenticated.status(), StatusCode::UNAUTHORIZED);

    let wrong = test
        .app
        .oneshot(webhook_request(Some("Bearer hook-secreT"), "not even json"))
        .await
        .unwrap();
    assert_eq!(wrong.status(), StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn test_webhook_accepts_status_callback() {
    let test = create_test_app(|_| {});
    let body = json!({
        "object": "whatsapp_business_account",
        "entry": [{"changes": [{"field": "messages", "value": {"statuses": [
            {"id": "wamid.1", "status": "delivered", "recipient_id": "15550001",
             "biz_opaque_callback_data": "signup-77"}
        ]}}]}]
    });

    let response = test
        .app
        .oneshot(webhook_request(Some("Bearer hook-secret"), &body.to_string()))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::OK);
}

#[tokio::test]
async fn test_webhook_without_configured_token_rejects_everything() {
    let test = create_test_app(|settings| settings.webhook.token = None);

    let response = test
        .app
        .oneshot(webhook_request(Some("Bearer "), "{}"))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn test_subscription_handshake() {
    let test = create_test_app(|_| {});

    let ok = test
        .app
        .clone()
        .oneshot(
            Request::builder()
                .uri("/webhooks/messages?hub.mode=subscribe&hub.verify_token=verify-me&hub.challenge=1158201444")
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();
    assert_eq!(ok.status(), StatusCode::OK);
    let bytes = to_bytes(ok.into_body(), usize::MAX).await.unwrap();
    assert_eq!(&bytes[..], b"1158201444");

    let bad = test
        .app
        .oneshot(
            Request::builder()
                .uri("/webhooks/messages?hub.mode=subscribe&hub.verify_token=wrong&hub.challenge=1")
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();
    assert_eq!(bad.status(), StatusCode::FORBIDDEN);
}
