//! Per-form origin gate applied before any quota is spent.
//!
//! A submission must carry a `Referer` under the form's `referral_url` and an
//! `Origin` listed in its `allowed_origins` (case-insensitive).

use axum::http::{HeaderMap, HeaderValue, header};
use thiserror::Error;

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct FormAccess {
    pub referral_url: String,
    pub allowed_origins: Vec<String>,
}

#[derive(Debug, Error, PartialEq, Eq)]
pub enum AccessError {
    #[error("Invalid referral URL")]
    InvalidReferer(Option<String>),

    #[error("Origin header is required")]
    MissingOrigin,

    #[error("CORS not allowed for this origin")]
    OriginNotAllowed(String),
}

impl FormAccess {
    /// Returns the accepted `Origin` value, to be echoed back in CORS headers.
    pub fn check(&self, headers: &HeaderMap) -> Result<HeaderValue, AccessError> {
        self.check_referer(headers)?;
        self.check_origin(headers)
    }

    // Preflights are judged on Origin alone
    pub fn check_origin(&self, headers: &HeaderMap) -> Result<HeaderValue, AccessError> {
        let origin = headers
            .get(header::ORIGIN)
            .filter(|value| !value.is_empty())
            .ok_or(AccessError::MissingOrigin)?;
        let origin_str = origin
            .to_str()
            .map_err(|_| AccessError::OriginNotAllowed(String::from_utf8_lossy(origin.as_bytes()).into_owned()))?;

        if self
            .allowed_origins
            .iter()
            .any(|allowed| allowed.eq_ignore_ascii_case(origin_str))
        {
            Ok(origin.clone())
        } else {
            Err(AccessError::OriginNotAllowed(origin_str.to_string()))
        }
    }

    fn check_referer(&self, headers: &HeaderMap) -> Result<(), AccessError> {
        let referer = headers.get(header::REFERER).and_then(|value| value.to_str().ok());
        match referer {
            Some(referer) if !referer.is_empty() && referer.starts_with(&self.referral_url) => Ok(()),
            other => Err(AccessError::InvalidReferer(other.map(str::to_string))),
        }
    }
}

// CORS headers for a request whose origin passed the gate
pub fn apply_cors_headers(headers: &mut HeaderMap, origin: HeaderValue) {
    headers.insert(header::ACCESS_CONTROL_ALLOW_ORIGIN, origin);
    headers.insert(
        header::ACCESS_CONTROL_ALLOW_METHODS,
        HeaderValue::from_static("GET, POST, PUT, DELETE, OPTIONS"),
    );
    headers.insert(
        header::ACCESS_CONTROL_ALLOW_HEADERS,
        HeaderValue::from_static("X-Requested-With, Content-Type, Authorization"),
    );
    headers.insert(header::VARY, HeaderValue::from_static("Origin"));
}
