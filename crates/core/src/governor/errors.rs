use chrono::{DateTime, Utc};
use thiserror::Error;

/// Errors raised by the request governor.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum GovernorError {
    /// The daily ceiling was reached. Fatal for the current run.
    #[error("Daily request quota of {limit} exhausted; resets at {resets_at}")]
    QuotaExhausted {
        limit: u32,
        resets_at: DateTime<Utc>,
    },

    /// The audit record for an attempt could not be persisted.
    #[error("Failed to append request audit record: {0}")]
    Audit(String),

    /// The run was stopped while waiting for admission.
    #[error("Admission cancelled by stop signal")]
    Cancelled,

    #[error("Invalid governor configuration: {0}")]
    InvalidConfig(String),
}
