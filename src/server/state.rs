use std::sync::Arc;
use std::time::Instant;

use crate::config::Settings;
use crate::queue::DispatchQueue;
use crate::redis::RedisPool;
use crate::template::TemplateResolver;

#[derive(Clone)]
pub struct AppState {
    pub settings: Arc<Settings>,
    pub resolver: TemplateResolver,
    pub dispatch_queue: DispatchQueue,
    /// Present only when the Redis queue backend is configured
    pub redis_pool: Option<Arc<RedisPool>>,
    pub start_time: Instant,
}

impl AppState {
    pub fn new(
        settings: Settings,
        resolver: TemplateResolver,
        dispatch_queue: DispatchQueue,
        redis_pool: Option<Arc<RedisPool>>,
    ) -> Self {
        Self {
            settings: Arc::new(settings),
            resolver,
            dispatch_queue,
            redis_pool,
            start_time: Instant::now(),
        }
    }
}
