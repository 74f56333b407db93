use super::form::SubmissionForm;
use crate::access::apply_cors_headers;
use crate::admission::Decision;
use crate::error::ApiError;
use crate::identity::extract_client_identity;
use crate::metrics::{
    ADMISSION_LATENCY, ADMITTED_TOTAL, CONFIG_ERRORS_TOTAL, REJECTED_TOTAL, REQUEST_TOTAL, VISITORS,
};
use crate::state::AppState;
use crate::submission::Submission;
use axum::{
    Extension, Json,
    extract::{ConnectInfo, Query, State},
    http::{HeaderMap, HeaderName, HeaderValue, StatusCode},
    response::{IntoResponse, Response},
};
use chrono::Utc;
use std::collections::HashMap;
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Instant;

// POST /api/forms - origin gate, then admission, then the submission sink
pub async fn submit_handler(
    State(state): State<Arc<AppState>>,
    peer: Option<Extension<ConnectInfo<SocketAddr>>>,
    headers: HeaderMap,
    SubmissionForm(mut fields): SubmissionForm,
) -> Result<Response, ApiError> {
    REQUEST_TOTAL.inc();

    let form_id = fields
        .remove("formid")
        .filter(|id| !id.is_empty())
        .ok_or(ApiError::MissingFormId)?;

    // Refused origins never reach the quota
    let origin = state.policies.access(&form_id)?.check(&headers)?;

    let peer = peer.map(|Extension(ConnectInfo(addr))| addr);
    let mut response = admit_submission(&state, peer, form_id, fields)
        .unwrap_or_else(IntoResponse::into_response);
    apply_cors_headers(response.headers_mut(), origin);
    Ok(response)
}

// OPTIONS /api/forms?formid=..
pub async fn preflight_handler(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
    Query(query): Query<HashMap<String, String>>,
) -> Result<Response, ApiError> {
    let form_id = query
        .get("formid")
        .filter(|id| !id.is_empty())
        .ok_or(ApiError::MissingFormId)?;
    let origin = state.policies.access(form_id)?.check_origin(&headers)?;

    let mut response = StatusCode::OK.into_response();
    apply_cors_headers(response.headers_mut(), origin);
    Ok(response)
}

fn admit_submission(
    state: &AppState,
    peer: Option<SocketAddr>,
    form_id: String,
    fields: HashMap<String, String>,
) -> Result<Response, ApiError> {
    let policy = state.policies.resolve(&form_id).inspect_err(|e| {
        if e.is_misconfiguration() {
            CONFIG_ERRORS_TOTAL.inc();
        }
    })?;

    let identity = extract_client_identity(peer)?;

    let start_time = Instant::now();
    let decision = state.admission.admit(identity.as_str(), &policy, Utc::now());
    ADMISSION_LATENCY.observe(start_time.elapsed().as_secs_f64());
    VISITORS.set(state.admission.store().len() as f64);

    let remaining = match decision.inspect_err(|_| CONFIG_ERRORS_TOTAL.inc())? {
        Decision::Reject { count } => {
            REJECTED_TOTAL.inc();
            tracing::warn!(client = %identity, form_id = %form_id, count, "Rate limit exceeded");
            return Err(ApiError::QuotaExceeded);
        }
        Decision::Admit { count, remaining } => {
            ADMITTED_TOTAL.inc();
            tracing::info!(client = %identity, form_id = %form_id, count, "Submission admitted");
            remaining
        }
    };

    state.sink.accept(&Submission {
        form_id,
        client: identity.to_string(),
        fields,
    })?;

    let headers = [
        (
            HeaderName::from_static("x-ratelimit-limit"),
            HeaderValue::from(policy.max_requests),
        ),
        (
            HeaderName::from_static("x-ratelimit-remaining"),
            HeaderValue::from(remaining),
        ),
    ];
    let body = Json(serde_json::json!({ "success": "Form submitted successfully" }));
    Ok((StatusCode::OK, headers, body).into_response())
}
