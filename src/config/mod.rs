mod settings;

pub use settings::{
    ApiConfig, OtelConfig, ProviderConfig, QueueConfig, RedisConfig, RetryConfig, ServerConfig,
    Settings, TemplatesConfig, WebhookConfig, WorkerConfig,
};
