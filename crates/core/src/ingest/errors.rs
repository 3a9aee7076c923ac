//! Ingest error taxonomy and recovery classification.

use chrono::{DateTime, Utc};
use thiserror::Error;

/// How the pipeline reacts to an ingest error.
///
/// | Class | Retried? | Run continues? |
/// |-------|----------|----------------|
/// | `RetryWithBackoff` | Yes, after fresh admission | Yes |
/// | `SkipAndLog` | No | Yes |
/// | `RetryOnce` | Once | Yes, but the run is not fully successful |
/// | `Fatal` | No | No |
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum RecoveryClass {
    /// Transient failure; retry with exponential backoff, bounded attempts.
    RetryWithBackoff,

    /// The unit is skipped and counted; the run carries on.
    SkipAndLog,

    /// Retry the write once, then surface it.
    RetryOnce,

    /// Stop the run.
    Fatal,
}

/// Errors raised while ingesting filings.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum IngestError {
    /// Network failure or server-side error while fetching.
    #[error("Transient fetch failure for {filing_id}: {message}")]
    TransientFetch { filing_id: String, message: String },

    /// The filing cannot be fetched (not found, forbidden, bad request).
    #[error("Permanent fetch failure for {filing_id}: {message}")]
    PermanentFetch { filing_id: String, message: String },

    /// The filing could not be parsed into ownership rows.
    #[error("Failed to parse {filing_id}: {message}")]
    Parse { filing_id: String, message: String },

    /// The daily request quota is spent.
    #[error("Daily request quota exhausted, resets at {resets_at}")]
    QuotaExhausted { resets_at: DateTime<Utc> },

    /// A holder name was close to, but not merged with, an existing holder.
    #[error("Ambiguous holder '{raw_name}' near '{similar_name}' ({score:.3})")]
    AmbiguousEntity {
        raw_name: String,
        similar_name: String,
        score: f64,
    },

    /// A concurrent writer got in the way of a fact commit.
    #[error("Store conflict for {company_id}: {message}")]
    StoreConflict { company_id: String, message: String },

    /// The run was stopped before this unit committed.
    #[error("Cancelled")]
    Cancelled,
}

impl IngestError {
    pub fn recovery_class(&self) -> RecoveryClass {
        match self {
            Self::TransientFetch { .. } => RecoveryClass::RetryWithBackoff,
            Self::PermanentFetch { .. } | Self::Parse { .. } | Self::AmbiguousEntity { .. } => {
                RecoveryClass::SkipAndLog
            }
            Self::StoreConflict { .. } => RecoveryClass::RetryOnce,
            Self::QuotaExhausted { .. } | Self::Cancelled => RecoveryClass::Fatal,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_recovery_classes() {
        let transient = IngestError::TransientFetch {
            filing_id: "f1".to_string(),
            message: "503".to_string(),
        };
        assert_eq!(transient.recovery_class(), RecoveryClass::RetryWithBackoff);

        let parse = IngestError::Parse {
            filing_id: "f1".to_string(),
            message: "no table".to_string(),
        };
        assert_eq!(parse.recovery_class(), RecoveryClass::SkipAndLog);

        let conflict = IngestError::StoreConflict {
            company_id: "AAPL".to_string(),
            message: "locked".to_string(),
        };
        assert_eq!(conflict.recovery_class(), RecoveryClass::RetryOnce);

        assert_eq!(IngestError::Cancelled.recovery_class(), RecoveryClass::Fatal);
        assert_eq!(
            IngestError::QuotaExhausted {
                resets_at: Utc::now()
            }
            .recovery_class(),
            RecoveryClass::Fatal
        );
    }
}
