//! Ownership commit service.

use std::sync::Arc;

use async_trait::async_trait;
use log::{debug, warn};
use serde::Serialize;

use super::locks::CompanyLocks;
use super::model::{CompanyId, FilingId, OwnershipFact, UpsertOutcome};
use super::store::OwnershipStore;
use crate::constants::MAX_PERCENT;
use crate::errors::{Error, Result};
use crate::events::{DomainEvent, DomainEventSink};

/// Work that must see a company's committed facts before anyone else writes.
///
/// Hooks run after a commit that changed something, while the company lock
/// is still held.
#[async_trait]
pub trait CommitHook: Send + Sync {
    async fn after_commit(&self, company_id: &CompanyId) -> Result<()>;
}

/// Counts for one committed filing.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CommitReport {
    pub inserted: usize,
    pub updated: usize,
    pub unchanged: usize,
    /// Conflicts absorbed by the single retry.
    pub conflicts_retried: usize,
}

impl CommitReport {
    pub fn changed(&self) -> bool {
        self.inserted + self.updated > 0
    }

    fn record(&mut self, outcome: UpsertOutcome) {
        match outcome {
            UpsertOutcome::Inserted => self.inserted += 1,
            UpsertOutcome::Updated => self.updated += 1,
            UpsertOutcome::Unchanged => self.unchanged += 1,
        }
    }
}

/// Commits a filing's facts under the company lock.
pub struct OwnershipService {
    store: Arc<dyn OwnershipStore>,
    locks: Arc<CompanyLocks>,
    hooks: Vec<Arc<dyn CommitHook>>,
    event_sink: Arc<dyn DomainEventSink>,
}

impl OwnershipService {
    pub fn new(
        store: Arc<dyn OwnershipStore>,
        locks: Arc<CompanyLocks>,
        event_sink: Arc<dyn DomainEventSink>,
    ) -> Self {
        Self {
            store,
            locks,
            hooks: Vec::new(),
            event_sink,
        }
    }

    pub fn with_hook(mut self, hook: Arc<dyn CommitHook>) -> Self {
        self.hooks.push(hook);
        self
    }

    pub fn store(&self) -> &Arc<dyn OwnershipStore> {
        &self.store
    }

    /// Upsert every fact of one filing for one company.
    ///
    /// A write conflict is retried once for the fact that hit it; a second
    /// conflict is returned. Facts written before a failure stay written,
    /// and replaying the filing is safe.
    pub async fn commit_filing(
        &self,
        company_id: &CompanyId,
        filing_id: &FilingId,
        facts: &[OwnershipFact],
    ) -> Result<CommitReport> {
        for fact in facts {
            validate_fact(company_id, filing_id, fact)?;
        }

        let _guard = self.locks.lock(company_id).await;
        let mut report = CommitReport::default();

        for fact in facts {
            let outcome = match self.store.upsert_fact(fact).await {
                Err(e) if e.is_conflict() => {
                    warn!(
                        "Write conflict on {} / {} / {}, retrying once: {}",
                        fact.company_id, fact.holder_id, fact.filing_id, e
                    );
                    report.conflicts_retried += 1;
                    self.store.upsert_fact(fact).await?
                }
                other => other?,
            };
            report.record(outcome);
        }

        debug!(
            "Committed filing {} for {}: {} inserted, {} updated, {} unchanged",
            filing_id, company_id, report.inserted, report.updated, report.unchanged
        );

        if report.changed() {
            for hook in &self.hooks {
                hook.after_commit(company_id).await?;
            }
        }

        self.event_sink.emit(DomainEvent::facts_committed(
            company_id.clone(),
            filing_id.clone(),
            report.inserted,
            report.updated,
            report.unchanged,
        ));

        Ok(report)
    }

    pub fn current_facts(&self, company_id: &CompanyId) -> Result<Vec<OwnershipFact>> {
        self.store.current_facts(company_id)
    }
}

fn validate_fact(company_id: &CompanyId, filing_id: &FilingId, fact: &OwnershipFact) -> Result<()> {
    if &fact.company_id != company_id || &fact.filing_id != filing_id {
        return Err(Error::Validation(format!(
            "Fact for {} / {} does not belong to filing {} of {}",
            fact.company_id, fact.filing_id, filing_id, company_id
        )));
    }
    if let Some(percent) = fact.percent {
        if !percent.is_finite() || !(0.0..=MAX_PERCENT).contains(&percent) {
            return Err(Error::Validation(format!(
                "Percent {} for {} is outside [0, 100]",
                percent, fact.holder_id
            )));
        }
    }
    Ok(())
}
