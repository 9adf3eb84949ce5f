use std::sync::Arc;

use anyhow::{Context, Result};
use tokio::net::TcpListener;
use tokio::signal;
use tokio::sync::broadcast;

use template_dispatch_service::config::Settings;
use template_dispatch_service::delivery::{create_message_sender, spawn_workers};
use template_dispatch_service::queue::{create_queue_backend, DispatchQueue, RetryPolicy};
use template_dispatch_service::redis::RedisPool;
use template_dispatch_service::server::{create_app, AppState};
use template_dispatch_service::shutdown::GracefulShutdown;
use template_dispatch_service::telemetry::init_telemetry;
use template_dispatch_service::template::{FileTemplateSource, TemplateResolver, TemplateStore};

#[tokio::main]
async fn main() -> Result<()> {
    // Load configuration
    let settings = Settings::new().context("Failed to load configuration")?;

    // Initialize tracing (and OTLP export if enabled)
    let _telemetry = init_telemetry(&settings.otel)?;
    tracing::info!(run_mode = ?std::env::var("RUN_MODE").ok(), "Configuration loaded");

    // Templates: the default language must load or the service cannot resolve anything
    let source = Arc::new(FileTemplateSource::new(&settings.templates.dir));
    let store = Arc::new(TemplateStore::new(
        source,
        settings.templates.default_language.clone(),
    ));
    store
        .warm()
        .await
        .context("Failed to load default language templates")?;
    let resolver = TemplateResolver::new(store);

    // Queue backend
    let redis_pool = if settings.queue.backend == "redis" {
        Some(Arc::new(RedisPool::new(&settings.redis)?))
    } else {
        None
    };
    let backend = create_queue_backend(&settings.queue, redis_pool.clone());
    let dispatch_queue = DispatchQueue::new(backend.clone(), RetryPolicy::from(&settings.retry));

    if let Some(pool) = &redis_pool {
        if let Err(e) = pool.ping().await {
            tracing::warn!(error = %e, url = %pool.url(), "Redis not reachable at startup");
        }
    }

    // Delivery workers
    let (shutdown_tx, _) = broadcast::channel::<()>(1);
    let sender = create_message_sender(&settings.provider)?;
    let workers = spawn_workers(&settings.worker, backend.clone(), sender, &shutdown_tx);
    tracing::info!(workers = workers.len(), "Delivery workers started");

    if settings.webhook.token.is_none() {
        tracing::warn!("webhook.token not set, all status callbacks will be rejected");
    }

    let addr = settings.server_addr();
    let state = AppState::new(settings, resolver, dispatch_queue, redis_pool);
    let app = create_app(state);

    let listener = TcpListener::bind(&addr).await?;
    tracing::info!("Server listening on {}", addr);

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    GracefulShutdown::new(backend, shutdown_tx, workers)
        .execute("server stopped")
        .await;

    tracing::info!("Server shutdown complete");
    Ok(())
}

async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = signal::ctrl_c().await {
            tracing::error!(error = %e, "Failed to install Ctrl+C handler");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut sig) => {
                sig.recv().await;
            }
            Err(e) => {
                tracing::error!(error = %e, "Failed to install SIGTERM handler");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {
            tracing::info!("Received Ctrl+C, initiating graceful shutdown");
        }
        _ = terminate => {
            tracing::info!("Received terminate signal, initiating graceful shutdown");
        }
    }
}
