//! Row cleaning and per-holder aggregation.

use std::collections::BTreeMap;

use chrono::NaiveDate;
use log::warn;

use super::adapter::RawOwnershipTuple;
use crate::constants::MAX_PERCENT;
use crate::holders::HolderId;
use crate::ownership::{CompanyId, FilingId, FilingType, OwnershipFact};
use crate::resolver::normalize_name;

/// What cleaning removed or changed.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct RowReport {
    pub dropped_blank: usize,
    pub dropped_total: usize,
    pub nulled_percent: usize,
}

/// Drop blank and summary rows; null percents outside `[0, 100]`.
pub fn clean_rows(
    filing_id: &FilingId,
    rows: Vec<RawOwnershipTuple>,
) -> (Vec<RawOwnershipTuple>, RowReport) {
    let mut report = RowReport::default();
    let mut kept = Vec::with_capacity(rows.len());

    for mut row in rows {
        let key = normalize_name(&row.holder_name);
        if key.is_empty() {
            report.dropped_blank += 1;
            continue;
        }
        if key.split(' ').any(|token| token == "total") {
            report.dropped_total += 1;
            continue;
        }
        if let Some(percent) = row.percent {
            if !percent.is_finite() || !(0.0..=MAX_PERCENT).contains(&percent) {
                warn!(
                    "Nulling out-of-range percent {} for '{}' in {}",
                    percent, row.holder_name, filing_id
                );
                row.percent = None;
                report.nulled_percent += 1;
            }
        }
        kept.push(row);
    }

    (kept, report)
}

#[derive(Debug)]
struct Position {
    shares: u64,
    percent: Option<f64>,
    all_have_percent: bool,
    as_of_date: NaiveDate,
}

/// Merge rows that resolved to the same holder into one fact each.
///
/// Shares are summed. Percents are summed only when every row carried one,
/// and dropped if the sum leaves `[0, 100]`. The fact takes the latest row
/// date. Output is ordered by `holder_id`.
pub fn aggregate_positions(
    company_id: &CompanyId,
    filing_id: &FilingId,
    filing_type: &FilingType,
    rows: Vec<(HolderId, RawOwnershipTuple)>,
) -> Vec<OwnershipFact> {
    let mut positions: BTreeMap<HolderId, Position> = BTreeMap::new();

    for (holder_id, row) in rows {
        match positions.get_mut(&holder_id) {
            Some(position) => {
                position.shares = position.shares.saturating_add(row.shares);
                position.all_have_percent &= row.percent.is_some();
                position.percent = match (position.percent, row.percent) {
                    (Some(a), Some(b)) if position.all_have_percent => Some(a + b),
                    _ => None,
                };
                position.as_of_date = position.as_of_date.max(row.as_of_date);
            }
            None => {
                positions.insert(
                    holder_id,
                    Position {
                        shares: row.shares,
                        percent: row.percent,
                        all_have_percent: row.percent.is_some(),
                        as_of_date: row.as_of_date,
                    },
                );
            }
        }
    }

    positions
        .into_iter()
        .map(|(holder_id, position)| {
            let percent = position.percent.filter(|p| *p <= MAX_PERCENT);
            if position.percent.is_some() && percent.is_none() {
                warn!(
                    "Dropping aggregated percent {:?} for {} in {}",
                    position.percent, holder_id, filing_id
                );
            }
            OwnershipFact {
                company_id: company_id.clone(),
                holder_id,
                filing_id: filing_id.clone(),
                shares: position.shares,
                percent,
                as_of_date: position.as_of_date,
                source_filing_type: filing_type.clone(),
            }
        })
        .collect()
}
