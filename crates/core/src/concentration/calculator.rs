//! Concentration metric computation.

use std::collections::BTreeSet;

use chrono::{DateTime, Utc};
use log::warn;

use super::model::{ConcentrationMetrics, ConcentrationSnapshot};
use super::reference::SharesOutstandingReference;
use crate::constants::{CONCENTRATION_DEPTHS, MAX_PERCENT};
use crate::holders::HolderId;
use crate::ownership::{CompanyId, OwnershipFact};

/// Pure computation of concentration metrics from current facts.
pub struct ConcentrationCalculator;

impl ConcentrationCalculator {
    /// Compute metrics for one company's current facts.
    ///
    /// Facts without a percent are measured against shares outstanding when
    /// the reference knows a non-zero count; otherwise they only count
    /// towards `holder_count`.
    pub fn compute(
        facts: &[OwnershipFact],
        outstanding: &dyn SharesOutstandingReference,
        tracked: &BTreeSet<HolderId>,
    ) -> ConcentrationMetrics {
        let mut measured: Vec<(&HolderId, f64)> = facts
            .iter()
            .filter_map(|fact| effective_percent(fact, outstanding).map(|p| (&fact.holder_id, p)))
            .collect();

        measured.sort_by(|(a_id, a), (b_id, b)| b.total_cmp(a).then_with(|| a_id.cmp(b_id)));

        let hhi: f64 = measured.iter().map(|(_, p)| p * p).sum();
        let top = |n: usize| measured.iter().take(n).map(|(_, p)| *p).sum::<f64>();
        let big_k_percent: f64 = measured
            .iter()
            .filter(|(id, _)| tracked.contains(*id))
            .map(|(_, p)| *p)
            .sum();

        let [d1, d3, d5, d10] = CONCENTRATION_DEPTHS;

        ConcentrationMetrics {
            hhi,
            cr1: top(d1),
            cr3: top(d3),
            cr5: top(d5),
            cr10: top(d10),
            big_k_percent,
            holder_count: facts.len(),
            measured_holder_count: measured.len(),
        }
    }

    pub fn snapshot(
        company_id: &CompanyId,
        facts: &[OwnershipFact],
        outstanding: &dyn SharesOutstandingReference,
        tracked: &BTreeSet<HolderId>,
        computed_at: DateTime<Utc>,
    ) -> ConcentrationSnapshot {
        ConcentrationSnapshot {
            company_id: company_id.clone(),
            computed_at,
            metrics: Self::compute(facts, outstanding, tracked),
        }
    }
}

fn effective_percent(
    fact: &OwnershipFact,
    outstanding: &dyn SharesOutstandingReference,
) -> Option<f64> {
    if let Some(percent) = fact.percent {
        return Some(percent);
    }
    let total = outstanding.shares_outstanding(&fact.company_id, fact.as_of_date)?;
    if total == 0 {
        return None;
    }
    let derived = fact.shares as f64 / total as f64 * 100.0;
    if !derived.is_finite() || derived > MAX_PERCENT {
        warn!(
            "Discarding derived percent {:.4} for {} in {} ({} of {} shares)",
            derived, fact.holder_id, fact.company_id, fact.shares, total
        );
        return None;
    }
    Some(derived)
}

#[cfg(test)]
mod tests {
    use chrono::NaiveDate;

    use super::*;
    use crate::concentration::{NoSharesOutstanding, StaticSharesOutstanding};
    use crate::ownership::{FilingId, FilingType};

    fn fact(holder: &str, percent: Option<f64>, shares: u64) -> OwnershipFact {
        OwnershipFact {
            company_id: CompanyId::new("PG"),
            holder_id: HolderId::new(holder),
            filing_id: FilingId::new("f1"),
            shares,
            percent,
            as_of_date: NaiveDate::from_ymd_opt(2024, 6, 30).unwrap(),
            source_filing_type: FilingType::Def14a,
        }
    }

    fn compute(facts: &[OwnershipFact]) -> ConcentrationMetrics {
        ConcentrationCalculator::compute(facts, &NoSharesOutstanding, &BTreeSet::new())
    }

    #[test]
    fn test_four_holder_scenario() {
        let metrics = compute(&[
            fact("h_a", Some(40.0), 0),
            fact("h_b", Some(30.0), 0),
            fact("h_c", Some(20.0), 0),
            fact("h_d", Some(10.0), 0),
        ]);
        assert_eq!(metrics.cr1, 40.0);
        assert_eq!(metrics.cr3, 90.0);
        assert_eq!(metrics.cr5, 100.0);
        assert_eq!(metrics.cr10, 100.0);
        assert_eq!(metrics.hhi, 3000.0);
        assert_eq!(metrics.holder_count, 4);
        assert_eq!(metrics.measured_holder_count, 4);
    }

    #[test]
    fn test_single_full_owner() {
        let metrics = compute(&[fact("h_a", Some(100.0), 0)]);
        assert_eq!(metrics.hhi, 10000.0);
        assert_eq!(metrics.cr1, 100.0);
    }

    #[test]
    fn test_empty_company_is_all_zero() {
        let metrics = compute(&[]);
        assert_eq!(metrics, ConcentrationMetrics::default());
    }

    #[test]
    fn test_input_order_does_not_matter() {
        let forward = compute(&[
            fact("h_a", Some(12.5), 0),
            fact("h_b", Some(12.5), 0),
            fact("h_c", Some(3.25), 0),
        ]);
        let reverse = compute(&[
            fact("h_c", Some(3.25), 0),
            fact("h_b", Some(12.5), 0),
            fact("h_a", Some(12.5), 0),
        ]);
        assert_eq!(forward, reverse);
    }

    #[test]
    fn test_missing_percent_without_reference_is_unmeasured() {
        let metrics = compute(&[fact("h_a", Some(5.0), 0), fact("h_b", None, 1_000)]);
        assert_eq!(metrics.holder_count, 2);
        assert_eq!(metrics.measured_holder_count, 1);
        assert_eq!(metrics.hhi, 25.0);
    }

    #[test]
    fn test_missing_percent_derived_from_outstanding() {
        let mut reference = StaticSharesOutstanding::new();
        reference.insert(
            CompanyId::new("PG"),
            NaiveDate::from_ymd_opt(2024, 1, 1).unwrap(),
            2_000,
        );
        let metrics = ConcentrationCalculator::compute(
            &[fact("h_a", None, 500)],
            &reference,
            &BTreeSet::new(),
        );
        assert_eq!(metrics.cr1, 25.0);
        assert_eq!(metrics.measured_holder_count, 1);
    }

    #[test]
    fn test_derived_percent_above_hundred_is_discarded() {
        let mut reference = StaticSharesOutstanding::new();
        reference.insert(
            CompanyId::new("PG"),
            NaiveDate::from_ymd_opt(2024, 1, 1).unwrap(),
            100,
        );
        let metrics = ConcentrationCalculator::compute(
            &[fact("h_a", None, 500)],
            &reference,
            &BTreeSet::new(),
        );
        assert_eq!(metrics.measured_holder_count, 0);
        assert_eq!(metrics.holder_count, 1);
    }

    #[test]
    fn test_big_k_sums_tracked_holders() {
        let tracked: BTreeSet<HolderId> = [HolderId::new("h_a"), HolderId::new("h_c")].into();
        let metrics = ConcentrationCalculator::compute(
            &[
                fact("h_a", Some(8.0), 0),
                fact("h_b", Some(7.0), 0),
                fact("h_c", Some(4.5), 0),
            ],
            &NoSharesOutstanding,
            &tracked,
        );
        assert_eq!(metrics.big_k_percent, 12.5);
    }
}
