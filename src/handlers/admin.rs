use crate::error::ApiError;
use crate::state::AppState;
use crate::visitor::Timestamp;
use axum::{
    Json,
    extract::{Path, Request, State},
    http::{StatusCode, header},
    middleware::Next,
    response::Response,
};
use std::collections::BTreeMap;
use std::sync::Arc;

/// Requires `Authorization: Bearer <admin token>`.
///
/// With no token configured the admin surface stays closed.
pub async fn admin_guard(
    State(state): State<Arc<AppState>>,
    request: Request,
    next: Next,
) -> Result<Response, ApiError> {
    let Some(expected) = state.admin_token.as_deref() else {
        tracing::warn!("Admin request refused: no admin token configured");
        return Err(ApiError::Unauthorized);
    };

    let provided = request
        .headers()
        .get(header::AUTHORIZATION)
        .and_then(|value| value.to_str().ok())
        .and_then(|value| value.strip_prefix("Bearer "));

    if !provided.is_some_and(|provided| token_matches(provided, expected)) {
        tracing::warn!(path = %request.uri().path(), "Unauthorized access attempt");
        return Err(ApiError::Unauthorized);
    }

    Ok(next.run(request).await)
}

// Compared in constant time over the token bytes
fn token_matches(provided: &str, expected: &str) -> bool {
    use subtle::ConstantTimeEq;
    provided.as_bytes().ct_eq(expected.as_bytes()).into()
}

// GET /api/rate-limits
pub async fn rate_limits_handler(
    State(state): State<Arc<AppState>>,
) -> Json<BTreeMap<String, Vec<Timestamp>>> {
    Json(state.introspection.list_all())
}

// DELETE /api/rate-limits/{ip}
pub async fn clear_rate_limit_handler(
    State(state): State<Arc<AppState>>,
    Path(ip): Path<String>,
) -> StatusCode {
    state.introspection.reset_identity(&ip);
    StatusCode::NO_CONTENT
}
