//! Cross-company holder presence.

use std::collections::{BTreeMap, BTreeSet};

use serde::Serialize;

use crate::holders::{CanonicalHolder, HolderId};
use crate::ownership::{CompanyId, OwnershipFact};

/// How widely one holder appears across the covered companies.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct HolderPresence {
    pub holder_id: HolderId,
    pub canonical_name: String,
    pub company_count: usize,
    /// Share of covered companies where the holder has a current fact.
    pub coverage_percent: f64,
}

/// Holder presence across every company with current facts.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PresenceReport {
    pub company_count: usize,
    /// Ordered by company count descending, then `holder_id`.
    pub holders: Vec<HolderPresence>,
    /// Companies where every tracked major holds a current position. Empty
    /// when nothing is tracked.
    pub companies_with_all_tracked: Vec<CompanyId>,
}

impl PresenceReport {
    pub fn build(
        current: &BTreeMap<CompanyId, Vec<OwnershipFact>>,
        holders: &[CanonicalHolder],
        tracked: &BTreeSet<HolderId>,
    ) -> Self {
        let names: BTreeMap<&HolderId, &str> = holders
            .iter()
            .map(|h| (&h.holder_id, h.canonical_name.as_str()))
            .collect();

        let mut counts: BTreeMap<&HolderId, usize> = BTreeMap::new();
        let mut companies_with_all_tracked = Vec::new();

        for (company_id, facts) in current {
            let present: BTreeSet<&HolderId> = facts.iter().map(|f| &f.holder_id).collect();
            for holder_id in &present {
                *counts.entry(*holder_id).or_default() += 1;
            }
            if !tracked.is_empty() && tracked.iter().all(|id| present.contains(id)) {
                companies_with_all_tracked.push(company_id.clone());
            }
        }

        let company_count = current.len();
        let mut presence: Vec<HolderPresence> = counts
            .into_iter()
            .map(|(holder_id, company_count_for_holder)| HolderPresence {
                holder_id: holder_id.clone(),
                canonical_name: names
                    .get(holder_id)
                    .map(|n| n.to_string())
                    .unwrap_or_else(|| holder_id.to_string()),
                company_count: company_count_for_holder,
                coverage_percent: company_count_for_holder as f64 / company_count as f64 * 100.0,
            })
            .collect();
        presence.sort_by(|a, b| {
            b.company_count
                .cmp(&a.company_count)
                .then_with(|| a.holder_id.cmp(&b.holder_id))
        });

        Self {
            company_count,
            holders: presence,
            companies_with_all_tracked,
        }
    }

    /// The `limit` most widespread holders.
    pub fn top(&self, limit: usize) -> &[HolderPresence] {
        &self.holders[..limit.min(self.holders.len())]
    }
}
