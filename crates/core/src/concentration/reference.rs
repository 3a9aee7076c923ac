//! Shares-outstanding reference data.

use std::collections::{BTreeMap, HashMap};
use std::fs;
use std::path::Path;

use chrono::NaiveDate;
use serde::Deserialize;

use crate::errors::{Error, Result};
use crate::ownership::CompanyId;

/// Source of shares-outstanding counts used to derive missing percents.
pub trait SharesOutstandingReference: Send + Sync {
    fn shares_outstanding(&self, company_id: &CompanyId, as_of: NaiveDate) -> Option<u64>;
}

/// Reference that never knows anything.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoSharesOutstanding;

impl SharesOutstandingReference for NoSharesOutstanding {
    fn shares_outstanding(&self, _company_id: &CompanyId, _as_of: NaiveDate) -> Option<u64> {
        None
    }
}

/// Fixed table of dated counts per company.
///
/// A lookup returns the latest count dated on or before `as_of`.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(transparent)]
pub struct StaticSharesOutstanding {
    entries: HashMap<CompanyId, BTreeMap<NaiveDate, u64>>,
}

impl StaticSharesOutstanding {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, company_id: CompanyId, as_of: NaiveDate, shares: u64) {
        self.entries.entry(company_id).or_default().insert(as_of, shares);
    }

    /// Parse `{ "AAPL": { "2024-01-01": 15400000000 } }`.
    pub fn from_json_str(json: &str) -> Result<Self> {
        Ok(serde_json::from_str(json)?)
    }

    pub fn from_json_file(path: &Path) -> Result<Self> {
        let contents = fs::read_to_string(path).map_err(|e| {
            Error::ConfigIO(format!(
                "Failed to read shares outstanding file {}: {}",
                path.display(),
                e
            ))
        })?;
        Self::from_json_str(&contents)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

impl SharesOutstandingReference for StaticSharesOutstanding {
    fn shares_outstanding(&self, company_id: &CompanyId, as_of: NaiveDate) -> Option<u64> {
        self.entries
            .get(company_id)?
            .range(..=as_of)
            .next_back()
            .map(|(_, shares)| *shares)
    }
}
