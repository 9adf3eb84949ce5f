//! HTTP server assembly: shared state, router and middleware.

mod app;
mod middleware;
mod state;

pub use app::create_app;
pub use middleware::api_key_auth;
pub use state::AppState;
