//! Redis support for the durable dispatch queue.
//!
//! - `CircuitBreaker`: fails fast while Redis is unreachable
//! - `RedisPool`: lazily connected multiplexed connection with typed helpers

mod circuit_breaker;
pub mod pool;

pub use circuit_breaker::{CircuitBreaker, CircuitBreakerConfig, CircuitState};
pub use pool::{PoolError, RedisPool};
