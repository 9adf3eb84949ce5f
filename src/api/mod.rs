//! API layer - HTTP endpoint handlers organized by domain.

mod health;
mod messages;
mod metrics;
mod routes;

pub use health::{health, stats};
pub use messages::{list_dead_letters, send_template, SendTemplateRequest, SendTemplateResponse};
pub use metrics::prometheus_metrics;
pub use routes::{api_routes, public_routes};
