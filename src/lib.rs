//! Form intake gateway.
//!
//! The core is the admission controller: every form submission is checked
//! against its form's quota for the submitting client before it reaches the
//! downstream [`submission::SubmissionSink`]. Admission state lives in memory
//! in a [`visitor::VisitorStore`] and is bounded by the [`reclaimer::Reclaimer`].

pub mod access;
pub mod admission;
pub mod config;
pub mod error;
pub mod handlers;
pub mod identity;
pub mod introspection;
pub mod metrics;
pub mod policy;
pub mod reclaimer;
pub mod state;
pub mod submission;
pub mod visitor;
