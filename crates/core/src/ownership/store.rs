//! Ownership fact storage interface.

use std::collections::BTreeMap;

use async_trait::async_trait;

use super::model::{CompanyId, OwnershipFact, UpsertOutcome};
use crate::errors::Result;
use crate::holders::HolderId;

/// Storage interface for ownership facts.
///
/// Mutations are async (they go through the storage writer); queries are
/// synchronous reads.
#[async_trait]
pub trait OwnershipStore: Send + Sync {
    /// Insert or replace the fact with this identity.
    ///
    /// Replaying an identical fact is `Unchanged` and writes nothing. The
    /// fact's holder must already exist.
    async fn upsert_fact(&self, fact: &OwnershipFact) -> Result<UpsertOutcome>;

    /// Current facts for a company: per holder, the fact with the latest
    /// `as_of_date`, ties going to the greatest `filing_id`. Ordered by
    /// `holder_id`.
    fn current_facts(&self, company_id: &CompanyId) -> Result<Vec<OwnershipFact>>;

    /// Every stored fact for a company, ordered by holder, date and filing.
    fn all_facts(&self, company_id: &CompanyId) -> Result<Vec<OwnershipFact>>;

    /// Companies with at least one fact, ordered.
    fn companies(&self) -> Result<Vec<CompanyId>>;
}

/// Pick each holder's current fact from a company's full history.
///
/// Output is ordered by `holder_id` and does not depend on input order.
pub fn select_current_facts<I>(facts: I) -> Vec<OwnershipFact>
where
    I: IntoIterator<Item = OwnershipFact>,
{
    let mut current: BTreeMap<HolderId, OwnershipFact> = BTreeMap::new();
    for fact in facts {
        match current.get(&fact.holder_id) {
            Some(existing)
                if (&existing.as_of_date, &existing.filing_id)
                    >= (&fact.as_of_date, &fact.filing_id) => {}
            _ => {
                current.insert(fact.holder_id.clone(), fact);
            }
        }
    }
    current.into_values().collect()
}
