//! Concentration engine.

use std::collections::{BTreeMap, BTreeSet};
use std::sync::Arc;

use async_trait::async_trait;
use log::debug;

use super::calculator::ConcentrationCalculator;
use super::model::{ConcentrationConfig, ConcentrationSnapshot};
use super::presence::PresenceReport;
use super::reference::SharesOutstandingReference;
use super::store::SnapshotStore;
use crate::clock::Clock;
use crate::errors::Result;
use crate::events::{DomainEvent, DomainEventSink};
use crate::holders::{HolderId, HolderStore};
use crate::ownership::{CommitHook, CompanyId, CompanyLocks, OwnershipStore};

/// Recomputes and stores concentration snapshots.
pub struct ConcentrationEngine {
    facts: Arc<dyn OwnershipStore>,
    holders: Arc<dyn HolderStore>,
    snapshots: Arc<dyn SnapshotStore>,
    outstanding: Arc<dyn SharesOutstandingReference>,
    locks: Arc<CompanyLocks>,
    clock: Arc<dyn Clock>,
    event_sink: Arc<dyn DomainEventSink>,
    tracked: BTreeSet<HolderId>,
}

impl ConcentrationEngine {
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        config: &ConcentrationConfig,
        facts: Arc<dyn OwnershipStore>,
        holders: Arc<dyn HolderStore>,
        snapshots: Arc<dyn SnapshotStore>,
        outstanding: Arc<dyn SharesOutstandingReference>,
        locks: Arc<CompanyLocks>,
        clock: Arc<dyn Clock>,
        event_sink: Arc<dyn DomainEventSink>,
    ) -> Self {
        Self {
            facts,
            holders,
            snapshots,
            outstanding,
            locks,
            clock,
            event_sink,
            tracked: config.tracked_holder_ids(),
        }
    }

    /// Recompute a company's snapshot from its current facts and store it.
    pub async fn recompute(&self, company_id: &CompanyId) -> Result<ConcentrationSnapshot> {
        let _guard = self.locks.lock(company_id).await;
        self.recompute_locked(company_id).await
    }

    /// Recompute every company with facts, in company order.
    pub async fn recompute_all(&self) -> Result<Vec<ConcentrationSnapshot>> {
        let mut snapshots = Vec::new();
        for company_id in self.facts.companies()? {
            snapshots.push(self.recompute(&company_id).await?);
        }
        Ok(snapshots)
    }

    pub fn latest(&self, company_id: &CompanyId) -> Result<Option<ConcentrationSnapshot>> {
        self.snapshots.latest_snapshot(company_id)
    }

    pub fn history(&self, company_id: &CompanyId) -> Result<Vec<ConcentrationSnapshot>> {
        self.snapshots.snapshot_history(company_id)
    }

    pub fn presence_report(&self) -> Result<PresenceReport> {
        let mut current = BTreeMap::new();
        for company_id in self.facts.companies()? {
            let facts = self.facts.current_facts(&company_id)?;
            current.insert(company_id, facts);
        }
        let holders = self.holders.list_holders()?;
        Ok(PresenceReport::build(&current, &holders, &self.tracked))
    }

    /// Caller must hold the company lock.
    async fn recompute_locked(&self, company_id: &CompanyId) -> Result<ConcentrationSnapshot> {
        let facts = self.facts.current_facts(company_id)?;
        let snapshot = ConcentrationCalculator::snapshot(
            company_id,
            &facts,
            self.outstanding.as_ref(),
            &self.tracked,
            self.clock.now(),
        );
        self.snapshots.save_snapshot(&snapshot).await?;

        debug!(
            "Recomputed {}: hhi={:.2} cr1={:.2} holders={} measured={}",
            company_id,
            snapshot.metrics.hhi,
            snapshot.metrics.cr1,
            snapshot.metrics.holder_count,
            snapshot.metrics.measured_holder_count
        );
        self.event_sink.emit(DomainEvent::snapshot_recomputed(
            company_id.clone(),
            snapshot.metrics.hhi,
            snapshot.metrics.holder_count,
        ));
        Ok(snapshot)
    }
}

#[async_trait]
impl CommitHook for ConcentrationEngine {
    async fn after_commit(&self, company_id: &CompanyId) -> Result<()> {
        self.recompute_locked(company_id).await.map(|_| ())
    }
}
