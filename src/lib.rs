// Shared infrastructure
pub mod config;
pub mod error;
pub mod metrics;
pub mod redis;
pub mod telemetry;

// Domain
pub mod delivery;
pub mod queue;
pub mod template;
pub mod webhook;

// Application layer
pub mod api;
pub mod server;

// Supporting modules
pub mod shutdown;
