//! End-of-run reporting.

use chrono::{DateTime, Utc};
use serde::Serialize;

use super::errors::RecoveryClass;
use crate::ownership::{CompanyId, FilingId};
use crate::resolver::CurationCandidate;

/// Why a run ended.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum RunTermination {
    Completed,
    Cancelled,
    QuotaExhausted { resets_at: DateTime<Utc> },
    /// A fatal non-quota error stopped the run.
    Failed { reason: String },
}

/// A filing that did not commit.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct FilingFailure {
    pub company_id: CompanyId,
    pub filing_id: FilingId,
    pub error: String,
    #[serde(skip)]
    pub class: RecoveryClass,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RunSummary {
    pub started_at: DateTime<Utc>,
    pub finished_at: DateTime<Utc>,
    pub filings_requested: usize,
    pub filings_attempted: usize,
    pub filings_committed: usize,
    pub facts_inserted: usize,
    pub facts_updated: usize,
    pub facts_unchanged: usize,
    pub rows_dropped: usize,
    pub percents_nulled: usize,
    pub parse_skips: usize,
    pub fetch_failures: usize,
    pub fetch_retries: usize,
    pub conflicts_retried: usize,
    pub unresolved_conflicts: usize,
    pub store_failures: usize,
    pub cancelled: usize,
    pub curation_candidates: Vec<CurationCandidate>,
    pub failures: Vec<FilingFailure>,
    pub termination: RunTermination,
}

impl RunSummary {
    pub fn new(started_at: DateTime<Utc>, filings_requested: usize) -> Self {
        Self {
            started_at,
            finished_at: started_at,
            filings_requested,
            filings_attempted: 0,
            filings_committed: 0,
            facts_inserted: 0,
            facts_updated: 0,
            facts_unchanged: 0,
            rows_dropped: 0,
            percents_nulled: 0,
            parse_skips: 0,
            fetch_failures: 0,
            fetch_retries: 0,
            conflicts_retried: 0,
            unresolved_conflicts: 0,
            store_failures: 0,
            cancelled: 0,
            curation_candidates: Vec::new(),
            failures: Vec::new(),
            termination: RunTermination::Completed,
        }
    }

    /// Skipped filings: parse failures plus fetches that never succeeded.
    pub fn skipped(&self) -> usize {
        self.parse_skips + self.fetch_failures
    }

    /// Filings never started because the run stopped early.
    pub fn not_started(&self) -> usize {
        self.filings_requested.saturating_sub(self.filings_attempted)
    }

    /// False on any unresolved conflict, storage failure, early stop or
    /// quota exhaustion. Skipped filings alone do not fail a run.
    pub fn is_fully_successful(&self) -> bool {
        self.termination == RunTermination::Completed
            && self.unresolved_conflicts == 0
            && self.store_failures == 0
            && self.cancelled == 0
    }

    /// Fold a worker's counters into this summary.
    pub(crate) fn absorb(&mut self, other: RunSummary) {
        self.filings_attempted += other.filings_attempted;
        self.filings_committed += other.filings_committed;
        self.facts_inserted += other.facts_inserted;
        self.facts_updated += other.facts_updated;
        self.facts_unchanged += other.facts_unchanged;
        self.rows_dropped += other.rows_dropped;
        self.percents_nulled += other.percents_nulled;
        self.parse_skips += other.parse_skips;
        self.fetch_failures += other.fetch_failures;
        self.fetch_retries += other.fetch_retries;
        self.conflicts_retried += other.conflicts_retried;
        self.unresolved_conflicts += other.unresolved_conflicts;
        self.store_failures += other.store_failures;
        self.cancelled += other.cancelled;
        self.failures.extend(other.failures);
    }
}
