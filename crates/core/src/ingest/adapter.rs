//! Filing adapters.
//!
//! An adapter turns one filing's raw contents into ownership rows. Layout
//! parsing lives entirely in adapters; the pipeline only sees the rows.

use std::sync::Arc;

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use super::fetcher::FilingBlob;
use crate::ownership::FilingType;

/// One ownership row as printed in a filing, before resolution.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RawOwnershipTuple {
    pub holder_name: String,
    pub shares: u64,
    #[serde(default)]
    pub percent: Option<f64>,
    pub as_of_date: NaiveDate,
}

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ParseError {
    #[error("Malformed filing: {0}")]
    Malformed(String),

    #[error("No adapter handles form {0}")]
    UnsupportedForm(String),
}

pub trait FilingAdapter: Send + Sync {
    fn name(&self) -> &'static str;

    fn supports(&self, filing_type: &FilingType) -> bool;

    fn parse(
        &self,
        blob: &FilingBlob,
        filing_type: &FilingType,
    ) -> Result<Vec<RawOwnershipTuple>, ParseError>;
}

/// Picks the first registered adapter that supports a filing type.
#[derive(Default, Clone)]
pub struct AdapterRegistry {
    adapters: Vec<Arc<dyn FilingAdapter>>,
}

impl AdapterRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register(mut self, adapter: Arc<dyn FilingAdapter>) -> Self {
        self.adapters.push(adapter);
        self
    }

    pub fn adapter_for(&self, filing_type: &FilingType) -> Option<&Arc<dyn FilingAdapter>> {
        self.adapters.iter().find(|a| a.supports(filing_type))
    }

    pub fn parse(
        &self,
        blob: &FilingBlob,
        filing_type: &FilingType,
    ) -> Result<Vec<RawOwnershipTuple>, ParseError> {
        self.adapter_for(filing_type)
            .ok_or_else(|| ParseError::UnsupportedForm(filing_type.to_string()))?
            .parse(blob, filing_type)
    }
}

/// Reads rows that were already extracted upstream, as a JSON array of
/// `{ holderName, shares, percent, asOfDate }` objects.
#[derive(Debug, Clone, Copy, Default)]
pub struct JsonTupleAdapter;

impl FilingAdapter for JsonTupleAdapter {
    fn name(&self) -> &'static str {
        "json_tuples"
    }

    fn supports(&self, _filing_type: &FilingType) -> bool {
        true
    }

    fn parse(
        &self,
        blob: &FilingBlob,
        _filing_type: &FilingType,
    ) -> Result<Vec<RawOwnershipTuple>, ParseError> {
        serde_json::from_slice(&blob.body)
            .map_err(|e| ParseError::Malformed(format!("{}: {}", blob.filing_id, e)))
    }
}
