//! End-to-end dispatch flow tests
//!
//! Templates are read from a temporary directory, resolved, enqueued on the
//! in-memory backend and delivered by a worker with a recording sender.
//! No Redis or provider is required.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use serde_json::json;
use tokio::sync::Mutex;

use template_dispatch_service::config::QueueConfig;
use template_dispatch_service::delivery::{
    DeliveryError, DeliveryWorker, JobOutcome, MessageSender, SendReceipt,
};
use template_dispatch_service::queue::{
    create_queue_backend, DispatchJob, DispatchQueue, RetryPolicy, MAX_TRACKING_ID_CHARS,
};
use template_dispatch_service::template::{
    Component, FileTemplateSource, TemplateError, TemplateResolver, TemplateStore, VariableValue,
    Variables,
};

/// Records every job it is asked to send
#[derive(Default)]
struct RecordingSender {
    sent: Mutex<Vec<DispatchJob>>,
}

#[async_trait]
impl MessageSender for RecordingSender {
    async fn send(&self, job: &DispatchJob) -> Result<SendReceipt, DeliveryError> {
        let mut sent = self.sent.lock().await;
        sent.push(job.clone());
        Ok(SendReceipt {
            message_id: format!("wamid.{}", sent.len()),
        })
    }

    fn provider(&self) -> &'static str {
        "recording"
    }
}

struct TestEnvironment {
    _dir: tempfile::TempDir,
    resolver: TemplateResolver,
    queue: DispatchQueue,
    worker: DeliveryWorker,
    sender: Arc<RecordingSender>,
}

fn write_templates(dir: &std::path::Path) {
    let en = json!({
        "order_shipped": {
            "metaTemplateName": "order_shipped",
            "languageCode": "en_US",
            "headerParameters": ["order_number"],
            "parameterOrder": ["customer_name", "order_number"],
            "buttonParameters": [
                {"index": 1, "type": "quick_reply", "parameters": ["stop_payload"]},
                {"index": 0, "type": "url", "parameters": ["tracking_path"]}
            ]
        },
        "welcome": {
            "metaTemplateName": "welcome_message",
            "languageCode": "en_US"
        }
    });
    let es = json!({
        "welcome": {
            "metaTemplateName": "bienvenida",
            "languageCode": "es"
        }
    });

    std::fs::write(dir.join("en.json"), en.to_string()).unwrap();
    std::fs::write(dir.join("es.json"), es.to_string()).unwrap();
    // Present but unparseable
    std::fs::write(dir.join("fr.json"), "{ not json").unwrap();
}

fn create_test_environment() -> TestEnvironment {
    let dir = tempfile::tempdir().unwrap();
    write_templates(dir.path());

    let source = Arc::new(FileTemplateSource::new(dir.path()));
    let store = Arc::new(TemplateStore::new(source, "en"));
    let resolver = TemplateResolver::new(store);

    let backend = create_queue_backend(&QueueConfig::default(), None);
    let policy = RetryPolicy {
        max_attempts: 3,
        initial_delay_ms: 0,
        max_delay_ms: 0,
        multiplier: 2.0,
        jitter_factor: 0.0,
    };
    let queue = DispatchQueue::new(backend.clone(), policy);

    let sender = Arc::new(RecordingSender::default());
    let worker = DeliveryWorker::new(0, backend, sender.clone(), Duration::from_millis(10));

    TestEnvironment {
        _dir: dir,
        resolver,
        queue,
        worker,
        sender,
    }
}

fn variables(pairs: &[(&str, VariableValue)]) -> Variables {
    pairs
        .iter()
        .map(|(k, v)| (k.to_string(), v.clone()))
        .collect()
}

#[tokio::test]
async fn test_resolve_enqueue_deliver() {
    let env = create_test_environment();

    let vars = variables(&[
        ("customer_name", VariableValue::from("Ana")),
        ("order_number", VariableValue::from(1042u64)),
        ("tracking_path", VariableValue::from("t/1042")),
    ]);
    let payload = env
        .resolver
        .resolve("order_shipped", "en", &vars)
        .await
        .unwrap();

    let job_id = env
        .queue
        .enqueue("+15550001", payload, Some("order-1042".to_string()))
        .await
        .unwrap();

    let outcome = env.worker.process_next().await.unwrap();
    assert!(matches!(outcome, JobOutcome::Delivered { job_id: id, .. } if id == job_id));

    let sent = env.sender.sent.lock().await;
    assert_eq!(sent.len(), 1);
    let job = &sent[0];
    assert_eq!(job.tracking_id.as_deref(), Some("order-1042"));

    let components = job.payload.components.as_ref().unwrap();
    assert_eq!(components.len(), 4);
    assert!(matches!(&components[0], Component::Header { .. }));
    assert_eq!(components[0].parameters()[0].as_text(), "1042");
    assert_eq!(components[1].parameters()[0].as_text(), "Ana");
    // Buttons ordered by index; missing variable binds as empty text
    assert!(matches!(&components[2], Component::Button { index: 0, .. }));
    assert_eq!(components[2].parameters()[0].as_text(), "t/1042");
    assert!(matches!(&components[3], Component::Button { index: 1, .. }));
    assert_eq!(components[3].parameters()[0].as_text(), "");
}

#[tokio::test]
async fn test_missing_language_file_falls_back_to_default() {
    let env = create_test_environment();

    let payload = env
        .resolver
        .resolve("welcome", "de", &Variables::new())
        .await
        .unwrap();

    assert_eq!(payload.name, "welcome_message");
    assert_eq!(payload.language.code, "en_US");
    assert!(payload.components.is_none());
}

#[tokio::test]
async fn test_unparseable_language_file_falls_back_and_is_not_cached() {
    let env = create_test_environment();

    for _ in 0..2 {
        let payload = env
            .resolver
            .resolve("welcome", "fr", &Variables::new())
            .await
            .unwrap();
        assert_eq!(payload.language.code, "en_US");
    }

    let cached = env.resolver.store().cached_languages();
    assert_eq!(cached, vec!["en".to_string()]);
}

#[tokio::test]
async fn test_template_missing_in_language_uses_default_definition() {
    let env = create_test_environment();

    let payload = env
        .resolver
        .resolve("order_shipped", "es", &Variables::new())
        .await
        .unwrap();
    assert_eq!(payload.name, "order_shipped");

    let payload = env
        .resolver
        .resolve("welcome", "es", &Variables::new())
        .await
        .unwrap();
    assert_eq!(payload.name, "bienvenida");
}

#[tokio::test]
async fn test_unknown_template_not_found() {
    let env = create_test_environment();

    let err = env
        .resolver
        .resolve("does_not_exist", "es", &Variables::new())
        .await
        .unwrap_err();

    assert!(matches!(err, TemplateError::NotFound { .. }));
}

#[tokio::test]
async fn test_missing_default_language_is_load_error() {
    let dir = tempfile::tempdir().unwrap();
    let store = Arc::new(TemplateStore::new(
        Arc::new(FileTemplateSource::new(dir.path())),
        "en",
    ));
    let resolver = TemplateResolver::new(store);

    let err = resolver
        .resolve("welcome", "es", &Variables::new())
        .await
        .unwrap_err();

    assert!(matches!(err, TemplateError::LoadFailed { .. }));
}

#[tokio::test]
async fn test_variable_values_change_text_only() {
    let env = create_test_environment();

    let first = env
        .resolver
        .resolve(
            "order_shipped",
            "en",
            &variables(&[("customer_name", VariableValue::from("Ana"))]),
        )
        .await
        .unwrap();
    let second = env
        .resolver
        .resolve(
            "order_shipped",
            "en",
            &variables(&[
                ("customer_name", VariableValue::from("Bo")),
                ("order_number", VariableValue::from(7i64)),
            ]),
        )
        .await
        .unwrap();

    let a = first.components.unwrap();
    let b = second.components.unwrap();
    assert_eq!(a.len(), b.len());
    for (x, y) in a.iter().zip(b.iter()) {
        assert_eq!(std::mem::discriminant(x), std::mem::discriminant(y));
        assert_eq!(x.parameters().len(), y.parameters().len());
    }
}

#[tokio::test]
async fn test_long_tracking_id_truncated_end_to_end() {
    let env = create_test_environment();
    let payload = env
        .resolver
        .resolve("welcome", "en", &Variables::new())
        .await
        .unwrap();

    env.queue
        .enqueue("+15550001", payload, Some("z".repeat(2048)))
        .await
        .unwrap();
    env.worker.process_next().await.unwrap();

    let sent = env.sender.sent.lock().await;
    let tracking_id = sent[0].tracking_id.as_ref().unwrap();
    assert_eq!(tracking_id.chars().count(), MAX_TRACKING_ID_CHARS);
}

#[tokio::test]
async fn test_identical_requests_get_distinct_job_ids() {
    let env = create_test_environment();
    let payload = env
        .resolver
        .resolve("welcome", "en", &Variables::new())
        .await
        .unwrap();

    let a = env.queue.enqueue("+15550001", payload.clone(), None).await.unwrap();
    let b = env.queue.enqueue("+15550001", payload, None).await.unwrap();

    assert_ne!(a, b);
}
