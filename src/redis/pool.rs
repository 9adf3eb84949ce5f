//! Redis connection pool for the durable dispatch queue.
//!
//! Holds one lazily established multiplexed connection and routes every
//! command through the circuit breaker.

use std::future::Future;
use std::sync::Arc;

use redis::aio::MultiplexedConnection;
use redis::{AsyncCommands, Client, RedisError, RedisResult};
use tokio::sync::RwLock;

use crate::config::RedisConfig;

use super::{CircuitBreaker, CircuitBreakerConfig, CircuitState};

/// Error type for Redis pool operations.
#[derive(Debug, thiserror::Error)]
pub enum PoolError {
    #[error("Redis error: {0}")]
    Redis(#[from] RedisError),

    #[error("Circuit breaker is open")]
    CircuitOpen,
}

pub struct RedisPool {
    client: Client,
    connection: RwLock<Option<MultiplexedConnection>>,
    circuit_breaker: Arc<CircuitBreaker>,
    url: String,
}

impl RedisPool {
    /// Create a pool; no connection is made until the first command.
    pub fn new(config: &RedisConfig) -> Result<Self, PoolError> {
        let client = Client::open(config.url.as_str())?;

        Ok(Self {
            client,
            connection: RwLock::new(None),
            circuit_breaker: Arc::new(CircuitBreaker::new(CircuitBreakerConfig::from(config))),
            url: config.url.clone(),
        })
    }

    pub fn url(&self) -> &str {
        &self.url
    }

    pub fn circuit_state(&self) -> CircuitState {
        self.circuit_breaker.state()
    }

    async fn get_connection(&self) -> Result<MultiplexedConnection, PoolError> {
        if !self.circuit_breaker.allow_request() {
            return Err(PoolError::CircuitOpen);
        }

        {
            let conn = self.connection.read().await;
            if let Some(ref c) = *conn {
                return Ok(c.clone());
            }
        }

        let mut guard = self.connection.write().await;

        // Another task may have connected while we waited
        if let Some(ref c) = *guard {
            return Ok(c.clone());
        }

        match self.client.get_multiplexed_tokio_connection().await {
            Ok(conn) => {
                *guard = Some(conn.clone());
                tracing::info!(url = %self.url, "Redis queue connection established");
                Ok(conn)
            }
            Err(e) => {
                self.circuit_breaker.record_failure();
                tracing::error!(error = %e, "Failed to connect to Redis");
                Err(PoolError::Redis(e))
            }
        }
    }

    /// Run a command with circuit breaker accounting.
    ///
    /// A dropped connection is discarded so the next command reconnects.
    pub async fn execute<F, Fut, T>(&self, f: F) -> Result<T, PoolError>
    where
        F: FnOnce(MultiplexedConnection) -> Fut,
        Fut: Future<Output = RedisResult<T>>,
    {
        let conn = self.get_connection().await?;

        match f(conn).await {
            Ok(result) => {
                self.circuit_breaker.record_success();
                Ok(result)
            }
            Err(e) => {
                if e.is_connection_dropped() || e.is_io_error() {
                    *self.connection.write().await = None;
                }
                self.circuit_breaker.record_failure();
                Err(PoolError::Redis(e))
            }
        }
    }

    pub async fn ping(&self) -> Result<(), PoolError> {
        self.execute(|mut conn| async move {
            let pong: RedisResult<String> = redis::cmd("PING").query_async(&mut conn).await;
            pong.map(|_| ())
        })
        .await
    }

    pub async fn zadd(&self, key: &str, score: i64, member: &str) -> Result<(), PoolError> {
        self.execute(|mut conn| async move { conn.zadd::<_, _, _, ()>(key, member, score).await })
            .await
    }

    /// Members with score <= `max_score`, lowest score first
    pub async fn zrange_due(
        &self,
        key: &str,
        max_score: i64,
        count: isize,
    ) -> Result<Vec<String>, PoolError> {
        self.execute(|mut conn| async move {
            conn.zrangebyscore_limit::<_, _, _, Vec<String>>(key, "-inf", max_score, 0, count)
                .await
        })
        .await
    }

    /// Remove a member; true if this call removed it
    pub async fn zrem(&self, key: &str, member: &str) -> Result<bool, PoolError> {
        self.execute(|mut conn| async move { conn.zrem::<_, _, i64>(key, member).await })
            .await
            .map(|removed| removed > 0)
    }

    pub async fn zcard(&self, key: &str) -> Result<usize, PoolError> {
        self.execute(|mut conn| async move { conn.zcard::<_, usize>(key).await })
            .await
    }

    pub async fn zcount_due(&self, key: &str, max_score: i64) -> Result<usize, PoolError> {
        self.execute(|mut conn| async move { conn.zcount::<_, _, _, usize>(key, "-inf", max_score).await })
            .await
    }

    /// Prepend to a list and trim it to `max_len` entries atomically
    pub async fn lpush_capped(&self, key: &str, value: &str, max_len: usize) -> Result<(), PoolError> {
        let stop = max_len.max(1) as isize - 1;
        self.execute(|mut conn| async move {
            let result: RedisResult<()> = redis::pipe()
                .atomic()
                .lpush(key, value)
                .ignore()
                .ltrim(key, 0, stop)
                .ignore()
                .query_async(&mut conn)
                .await;
            result
        })
        .await
    }

    pub async fn lrange(&self, key: &str, start: isize, stop: isize) -> Result<Vec<String>, PoolError> {
        self.execute(|mut conn| async move { conn.lrange::<_, Vec<String>>(key, start, stop).await })
            .await
    }

    pub async fn llen(&self, key: &str) -> Result<usize, PoolError> {
        self.execute(|mut conn| async move { conn.llen::<_, usize>(key).await })
            .await
    }
}
