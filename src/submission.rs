use std::collections::HashMap;
use thiserror::Error;

// An admitted form submission handed to the downstream sink
#[derive(Debug, Clone)]
pub struct Submission {
    pub form_id: String,
    pub client: String,
    pub fields: HashMap<String, String>,
}

#[derive(Debug, Error)]
pub enum SubmissionError {
    #[error("submission rejected: {0}")]
    Rejected(String),

    #[error("submission could not be stored: {0}")]
    Storage(String),
}

/// Called once per admitted submission. Validation and storage live behind
/// this seam, outside the admission core.
pub trait SubmissionSink: Send + Sync {
    fn accept(&self, submission: &Submission) -> Result<(), SubmissionError>;
}

// Default sink: records the submission in the structured log
pub struct TracingSink;

impl SubmissionSink for TracingSink {
    fn accept(&self, submission: &Submission) -> Result<(), SubmissionError> {
        let mut fields: Vec<&str> = submission.fields.keys().map(String::as_str).collect();
        fields.sort_unstable();

        tracing::info!(
            form_id = %submission.form_id,
            client = %submission.client,
            fields = ?fields,
            "Form submission accepted"
        );
        Ok(())
    }
}
