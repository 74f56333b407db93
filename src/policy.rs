use crate::access::FormAccess;
use crate::config::{FormConfig, FormsConfig};
use std::collections::HashMap;
use std::time::Duration;
use thiserror::Error;

/// Quota for one tenant (form): at most `max_requests` admissions per window.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TenantPolicy {
    pub max_requests: u32,
    pub window: Duration,
}

impl TenantPolicy {
    pub fn new(max_requests: u32, window: Duration) -> Self {
        Self {
            max_requests,
            window,
        }
    }
}

#[derive(Debug, Error, PartialEq, Eq)]
pub enum PolicyError {
    #[error("form configuration not found: {0}")]
    NotFound(String),

    #[error("invalid rate limit duration {value:?} for form {form}: {reason}")]
    InvalidDuration {
        form: String,
        value: String,
        reason: String,
    },

    #[error("invalid rate limit request count {value} for form {form}")]
    InvalidRequests { form: String, value: i64 },
}

impl PolicyError {
    /// Whether this is a configuration problem rather than an unknown tenant.
    pub fn is_misconfiguration(&self) -> bool {
        !matches!(self, PolicyError::NotFound(_))
    }
}

pub trait TenantPolicyProvider: Send + Sync {
    fn resolve(&self, tenant_id: &str) -> Result<TenantPolicy, PolicyError>;

    // Origin and referral rules checked before the quota
    fn access(&self, tenant_id: &str) -> Result<FormAccess, PolicyError>;
}

// Policy lookup backed by the forms configuration file
pub struct FormPolicies {
    forms: HashMap<String, FormConfig>,
}

impl FormPolicies {
    pub fn new(config: FormsConfig) -> Self {
        let policies = Self {
            forms: config.forms,
        };

        // Bad entries are kept; they fail closed per request instead
        for form_id in policies.forms.keys() {
            if let Err(e) = policies.resolve(form_id) {
                tracing::warn!(form_id = %form_id, error = %e, "Form has an unusable rate limit");
            }
        }
        policies
    }
}

impl TenantPolicyProvider for FormPolicies {
    fn resolve(&self, tenant_id: &str) -> Result<TenantPolicy, PolicyError> {
        let form = self
            .forms
            .get(tenant_id)
            .ok_or_else(|| PolicyError::NotFound(tenant_id.to_string()))?;

        let limit = &form.rate_limit;
        let window = parse_duration(&limit.duration).map_err(|reason| PolicyError::InvalidDuration {
            form: tenant_id.to_string(),
            value: limit.duration.clone(),
            reason,
        })?;

        // Zero passes through; the admission controller rejects it as a config error
        let max_requests = u32::try_from(limit.requests).map_err(|_| PolicyError::InvalidRequests {
            form: tenant_id.to_string(),
            value: limit.requests,
        })?;

        Ok(TenantPolicy::new(max_requests, window))
    }

    fn access(&self, tenant_id: &str) -> Result<FormAccess, PolicyError> {
        let form = self
            .forms
            .get(tenant_id)
            .ok_or_else(|| PolicyError::NotFound(tenant_id.to_string()))?;

        Ok(FormAccess {
            referral_url: form.referral_url.clone(),
            allowed_origins: form.allowed_origins.clone(),
        })
    }
}

/// Parses compound duration strings such as `300ms`, `10s`, `1m30s` or `1.5h`.
///
/// Units: `ns`, `us` (or `µs`), `ms`, `s`, `m`, `h`. A bare `0` is accepted.
/// Negative durations are refused.
pub fn parse_duration(input: &str) -> Result<Duration, String> {
    let s = input.trim();
    if s.is_empty() {
        return Err("empty duration".to_string());
    }
    if s == "0" {
        return Ok(Duration::ZERO);
    }
    if s.starts_with('-') {
        return Err("negative duration".to_string());
    }
    let mut rest = s.strip_prefix('+').unwrap_or(s);
    if rest.is_empty() {
        return Err(format!("invalid duration {input:?}"));
    }

    let mut total_nanos: f64 = 0.0;
    while !rest.is_empty() {
        let number_len = rest
            .find(|c: char| !(c.is_ascii_digit() || c == '.'))
            .ok_or_else(|| format!("missing unit in duration {input:?}"))?;
        if number_len == 0 {
            return Err(format!("invalid duration {input:?}"));
        }
        let value: f64 = rest[..number_len]
            .parse()
            .map_err(|_| format!("invalid number in duration {input:?}"))?;
        rest = &rest[number_len..];

        let unit_len = rest
            .find(|c: char| c.is_ascii_digit() || c == '.')
            .unwrap_or(rest.len());
        let scale = match &rest[..unit_len] {
            "ns" => 1.0,
            "us" | "µs" => 1e3,
            "ms" => 1e6,
            "s" => 1e9,
            "m" => 60.0 * 1e9,
            "h" => 3600.0 * 1e9,
            unit => return Err(format!("unknown unit {unit:?} in duration {input:?}")),
        };
        rest = &rest[unit_len..];
        total_nanos += value * scale;
    }

    if !total_nanos.is_finite() || total_nanos > u64::MAX as f64 {
        return Err(format!("duration {input:?} out of range"));
    }
    Ok(Duration::from_nanos(total_nanos.round() as u64))
}
