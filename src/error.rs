use crate::access::AccessError;
use crate::admission::AdmissionError;
use crate::identity::IdentityError;
use crate::policy::PolicyError;
use crate::submission::SubmissionError;
use axum::Json;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use thiserror::Error;

// Request-path failures, each mapped to one HTTP status
#[derive(Debug, Error)]
pub enum ApiError {
    #[error("Form ID is required")]
    MissingFormId,

    #[error("Could not parse form body")]
    MalformedBody(String),

    #[error("Unsupported form encoding")]
    UnsupportedBody(String),

    #[error("{0}")]
    Forbidden(#[from] AccessError),

    #[error("Form configuration not found")]
    UnknownForm(String),

    #[error("Invalid rate limit configuration")]
    Configuration(String),

    #[error("Invalid IP address")]
    Identity(#[from] IdentityError),

    #[error("Rate limit exceeded")]
    QuotaExceeded,

    #[error("Unauthorized")]
    Unauthorized,

    #[error("Could not process submission")]
    Submission(#[from] SubmissionError),
}

impl From<PolicyError> for ApiError {
    fn from(err: PolicyError) -> Self {
        match err {
            PolicyError::NotFound(form_id) => ApiError::UnknownForm(form_id),
            other => ApiError::Configuration(other.to_string()),
        }
    }
}

impl From<AdmissionError> for ApiError {
    fn from(err: AdmissionError) -> Self {
        ApiError::Configuration(err.to_string())
    }
}

impl ApiError {
    pub fn status(&self) -> StatusCode {
        match self {
            ApiError::MissingFormId | ApiError::MalformedBody(_) | ApiError::UnknownForm(_) => {
                StatusCode::BAD_REQUEST
            }
            ApiError::UnsupportedBody(_) => StatusCode::UNSUPPORTED_MEDIA_TYPE,
            ApiError::Forbidden(_) => StatusCode::FORBIDDEN,
            ApiError::QuotaExceeded => StatusCode::TOO_MANY_REQUESTS,
            ApiError::Unauthorized => StatusCode::UNAUTHORIZED,
            ApiError::Configuration(_) | ApiError::Identity(_) | ApiError::Submission(_) => {
                StatusCode::INTERNAL_SERVER_ERROR
            }
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        // Quota rejections are expected traffic; only server-side faults log at error
        match &self {
            ApiError::MissingFormId => tracing::warn!("Form ID is required"),
            ApiError::MalformedBody(detail) => tracing::warn!(detail = %detail, "Could not parse form body"),
            ApiError::UnsupportedBody(content_type) => {
                tracing::warn!(content_type = %content_type, "Unsupported form encoding")
            }
            ApiError::Forbidden(e) => tracing::warn!(reason = ?e, "Submission refused by origin gate"),
            ApiError::UnknownForm(form_id) => {
                tracing::warn!(form_id = %form_id, "Form configuration not found")
            }
            ApiError::QuotaExceeded | ApiError::Unauthorized => {}
            ApiError::Configuration(detail) => tracing::error!(detail = %detail, "Form policy misconfigured"),
            ApiError::Identity(e) => tracing::error!(error = %e, "Could not identify client"),
            ApiError::Submission(e) => tracing::error!(error = %e, "Submission sink failed"),
        }

        let body = Json(serde_json::json!({ "error": self.to_string() }));
        (self.status(), body).into_response()
    }
}
