mod admin;
mod form;
mod health;
mod metrics;
mod submit;

pub use admin::{admin_guard, clear_rate_limit_handler, rate_limits_handler};
pub use health::health_handler;
pub use metrics::metrics_handler;
pub use form::SubmissionForm;
pub use submit::{preflight_handler, submit_handler};

use crate::state::AppState;
use axum::{
    Router, middleware,
    routing::{delete, get, post},
};
use std::sync::Arc;

// Build the HTTP surface: public intake routes plus the guarded admin routes
pub fn router(state: Arc<AppState>) -> Router {
    let admin = Router::new()
        .route("/api/rate-limits", get(rate_limits_handler))
        .route("/api/rate-limits/{ip}", delete(clear_rate_limit_handler))
        .route_layer(middleware::from_fn_with_state(Arc::clone(&state), admin_guard));

    Router::new()
        .route("/health", get(health_handler))
        .route("/metrics", get(metrics_handler))
        .route("/api/forms", post(submit_handler).options(preflight_handler))
        .merge(admin)
        .with_state(state)
}
