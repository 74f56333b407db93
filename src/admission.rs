//! Per-identity admission decisions over a renewing fixed window.
//!
//! The window for an identity is anchored to inactivity: the counter only
//! resets when the gap since `last_seen` exceeds the tenant's window, so a
//! steady stream of requests spaced closer than the window never renews it.
//! `last_seen` advances on admitted calls only.

use crate::policy::TenantPolicy;
use crate::visitor::{Timestamp, VisitorStore, lock_record};
use chrono::TimeDelta;
use std::sync::Arc;
use thiserror::Error;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Decision {
    // count = admissions in the current window, including this one
    Admit { count: u32, remaining: u32 },
    Reject { count: u32 },
}

impl Decision {
    pub fn is_admitted(&self) -> bool {
        matches!(self, Decision::Admit { .. })
    }
}

/// Configuration problems detected while deciding. Distinct from a quota
/// rejection so callers can report them as server errors.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum AdmissionError {
    #[error("invalid tenant policy: {0}")]
    InvalidPolicy(&'static str),
}

#[derive(Clone)]
pub struct AdmissionController {
    store: Arc<VisitorStore>,
}

impl AdmissionController {
    pub fn new(store: Arc<VisitorStore>) -> Self {
        Self { store }
    }

    pub fn store(&self) -> &Arc<VisitorStore> {
        &self.store
    }

    pub fn admit(
        &self,
        identity: &str,
        policy: &TenantPolicy,
        now: Timestamp,
    ) -> Result<Decision, AdmissionError> {
        // Fail closed before any state is created
        if policy.max_requests == 0 {
            return Err(AdmissionError::InvalidPolicy("max requests must be positive"));
        }
        if policy.window.is_zero() {
            return Err(AdmissionError::InvalidPolicy("window must be positive"));
        }
        let window = TimeDelta::from_std(policy.window)
            .map_err(|_| AdmissionError::InvalidPolicy("window out of range"))?;

        loop {
            let handle = self.store.get_or_create(identity, now);
            let mut record = lock_record(&handle);

            // Evicted between lookup and lock; the next lookup sees a fresh record
            if record.is_evicted() {
                continue;
            }

            if now - record.last_seen() > window {
                record.reset();
            }

            if record.request_count() >= policy.max_requests {
                return Ok(Decision::Reject {
                    count: record.request_count(),
                });
            }

            record.record_admission(now);
            let count = record.request_count();
            return Ok(Decision::Admit {
                count,
                remaining: policy.max_requests - count,
            });
        }
    }
}
