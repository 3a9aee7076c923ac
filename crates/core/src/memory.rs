//! In-memory store.
//!
//! Implements every storage trait over process memory. Used by tests and
//! by dry runs that do not need to persist anything.

use std::collections::{BTreeMap, BTreeSet};
use std::sync::{RwLock, RwLockReadGuard, RwLockWriteGuard};

use async_trait::async_trait;
use log::warn;

use crate::concentration::{ConcentrationSnapshot, SnapshotStore};
use crate::errors::{Error, Result};
use crate::governor::{AuditLog, RequestRecord};
use crate::holders::{CanonicalHolder, HolderId, HolderStore};
use crate::ownership::{
    select_current_facts, CompanyId, FactKey, OwnershipFact, OwnershipStore, UpsertOutcome,
};

#[derive(Default)]
struct State {
    holders: BTreeMap<HolderId, CanonicalHolder>,
    facts: BTreeMap<FactKey, OwnershipFact>,
    snapshots: BTreeMap<CompanyId, Vec<ConcentrationSnapshot>>,
    requests: Vec<RequestRecord>,
}

#[derive(Default)]
pub struct InMemoryStore {
    state: RwLock<State>,
}

impl InMemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    fn read(&self) -> RwLockReadGuard<'_, State> {
        self.state.read().unwrap_or_else(|poisoned| {
            warn!("In-memory store lock was poisoned, recovering");
            poisoned.into_inner()
        })
    }

    fn write(&self) -> RwLockWriteGuard<'_, State> {
        self.state.write().unwrap_or_else(|poisoned| {
            warn!("In-memory store lock was poisoned, recovering");
            poisoned.into_inner()
        })
    }

    fn company_facts(state: &State, company_id: &CompanyId) -> Vec<OwnershipFact> {
        state
            .facts
            .values()
            .filter(|f| &f.company_id == company_id)
            .cloned()
            .collect()
    }
}

#[async_trait]
impl HolderStore for InMemoryStore {
    async fn upsert_holder(&self, holder: &CanonicalHolder) -> Result<()> {
        let mut state = self.write();
        match state.holders.get_mut(&holder.holder_id) {
            Some(existing) => {
                if existing.canonical_name != holder.canonical_name {
                    return Err(Error::ConstraintViolation(format!(
                        "Holder {} is named '{}', refusing rename to '{}'",
                        holder.holder_id, existing.canonical_name, holder.canonical_name
                    )));
                }
                existing
                    .known_aliases
                    .extend(holder.known_aliases.iter().cloned());
            }
            None => {
                state.holders.insert(holder.holder_id.clone(), holder.clone());
            }
        }
        Ok(())
    }

    fn get_holder(&self, holder_id: &HolderId) -> Result<Option<CanonicalHolder>> {
        Ok(self.read().holders.get(holder_id).cloned())
    }

    fn list_holders(&self) -> Result<Vec<CanonicalHolder>> {
        Ok(self.read().holders.values().cloned().collect())
    }
}

#[async_trait]
impl OwnershipStore for InMemoryStore {
    async fn upsert_fact(&self, fact: &OwnershipFact) -> Result<UpsertOutcome> {
        let mut state = self.write();
        if !state.holders.contains_key(&fact.holder_id) {
            return Err(Error::ConstraintViolation(format!(
                "Fact references unknown holder {}",
                fact.holder_id
            )));
        }
        let key = fact.key();
        let outcome = match state.facts.get(&key) {
            Some(existing) if existing.same_payload(fact) => UpsertOutcome::Unchanged,
            Some(_) => UpsertOutcome::Updated,
            None => UpsertOutcome::Inserted,
        };
        if outcome.is_write() {
            state.facts.insert(key, fact.clone());
        }
        Ok(outcome)
    }

    fn current_facts(&self, company_id: &CompanyId) -> Result<Vec<OwnershipFact>> {
        let state = self.read();
        Ok(select_current_facts(Self::company_facts(&state, company_id)))
    }

    fn all_facts(&self, company_id: &CompanyId) -> Result<Vec<OwnershipFact>> {
        let state = self.read();
        let mut facts = Self::company_facts(&state, company_id);
        facts.sort_by(|a, b| {
            (&a.holder_id, a.as_of_date, &a.filing_id).cmp(&(&b.holder_id, b.as_of_date, &b.filing_id))
        });
        Ok(facts)
    }

    fn companies(&self) -> Result<Vec<CompanyId>> {
        let state = self.read();
        let companies: BTreeSet<&CompanyId> = state.facts.keys().map(|k| &k.company_id).collect();
        Ok(companies.into_iter().cloned().collect())
    }
}

#[async_trait]
impl SnapshotStore for InMemoryStore {
    async fn save_snapshot(&self, snapshot: &ConcentrationSnapshot) -> Result<()> {
        self.write()
            .snapshots
            .entry(snapshot.company_id.clone())
            .or_default()
            .push(snapshot.clone());
        Ok(())
    }

    fn latest_snapshot(&self, company_id: &CompanyId) -> Result<Option<ConcentrationSnapshot>> {
        Ok(self
            .read()
            .snapshots
            .get(company_id)
            .and_then(|history| history.last().cloned()))
    }

    fn snapshot_history(&self, company_id: &CompanyId) -> Result<Vec<ConcentrationSnapshot>> {
        Ok(self
            .read()
            .snapshots
            .get(company_id)
            .cloned()
            .unwrap_or_default())
    }
}

impl AuditLog for InMemoryStore {
    fn append(&self, record: &RequestRecord) -> Result<()> {
        self.write().requests.push(record.clone());
        Ok(())
    }

    fn records(&self) -> Result<Vec<RequestRecord>> {
        Ok(self.read().requests.clone())
    }
}

#[cfg(test)]
mod tests {
    use chrono::NaiveDate;

    use super::*;
    use crate::ownership::{FilingId, FilingType};

    fn fact(holder: &CanonicalHolder, filing: &str, date: (i32, u32, u32), percent: f64) -> OwnershipFact {
        OwnershipFact {
            company_id: CompanyId::new("CVX"),
            holder_id: holder.holder_id.clone(),
            filing_id: FilingId::new(filing),
            shares: 1_000,
            percent: Some(percent),
            as_of_date: NaiveDate::from_ymd_opt(date.0, date.1, date.2).unwrap(),
            source_filing_type: FilingType::Def14a,
        }
    }

    #[tokio::test]
    async fn test_rejects_dangling_holder() {
        let store = InMemoryStore::new();
        let ghost = CanonicalHolder::new("Nobody Capital");
        let err = store
            .upsert_fact(&fact(&ghost, "f1", (2024, 1, 1), 1.0))
            .await
            .unwrap_err();
        assert!(matches!(err, Error::ConstraintViolation(_)));
    }

    #[tokio::test]
    async fn test_upsert_outcomes() {
        let store = InMemoryStore::new();
        let holder = CanonicalHolder::new("Vanguard Group");
        store.upsert_holder(&holder).await.unwrap();

        let original = fact(&holder, "f1", (2024, 1, 1), 40.0);
        assert_eq!(store.upsert_fact(&original).await.unwrap(), UpsertOutcome::Inserted);
        assert_eq!(store.upsert_fact(&original).await.unwrap(), UpsertOutcome::Unchanged);

        let corrected = fact(&holder, "f1", (2024, 1, 1), 41.0);
        assert_eq!(store.upsert_fact(&corrected).await.unwrap(), UpsertOutcome::Updated);
        assert_eq!(store.all_facts(&CompanyId::new("CVX")).unwrap().len(), 1);
    }

    #[tokio::test]
    async fn test_newer_filing_supersedes() {
        let store = InMemoryStore::new();
        let holder = CanonicalHolder::new("Vanguard Group");
        store.upsert_holder(&holder).await.unwrap();

        store.upsert_fact(&fact(&holder, "f1", (2024, 1, 1), 40.0)).await.unwrap();
        store.upsert_fact(&fact(&holder, "f2", (2024, 6, 1), 45.0)).await.unwrap();

        let company = CompanyId::new("CVX");
        let current = store.current_facts(&company).unwrap();
        assert_eq!(current.len(), 1);
        assert_eq!(current[0].filing_id, FilingId::new("f2"));
        assert_eq!(current[0].percent, Some(45.0));

        let all = store.all_facts(&company).unwrap();
        assert_eq!(all.len(), 2);
        assert_eq!(all[0].filing_id, FilingId::new("f1"));
        assert_eq!(store.companies().unwrap(), vec![company]);
    }

    #[tokio::test]
    async fn test_holder_aliases_only_grow() {
        let store = InMemoryStore::new();
        let mut holder = CanonicalHolder::new("BlackRock");
        holder.known_aliases.insert("BlackRock, Inc.".to_string());
        store.upsert_holder(&holder).await.unwrap();

        store.upsert_holder(&CanonicalHolder::new("BlackRock")).await.unwrap();
        let stored = store.get_holder(&holder.holder_id).unwrap().unwrap();
        assert!(stored.known_aliases.contains("BlackRock, Inc."));
    }

    #[tokio::test]
    async fn test_holder_rename_rejected() {
        let store = InMemoryStore::new();
        let holder = CanonicalHolder::new("BlackRock");
        store.upsert_holder(&holder).await.unwrap();

        let mut renamed = holder.clone();
        renamed.canonical_name = "Blackrock".to_string();
        let err = store.upsert_holder(&renamed).await.unwrap_err();
        assert!(matches!(err, Error::ConstraintViolation(_)));
    }
}
