//! Concentration domain models.

use std::collections::BTreeSet;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::holders::HolderId;
use crate::ownership::CompanyId;

/// Concentration figures for one company, in percentage points.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ConcentrationMetrics {
    /// Sum of squared percents; a sole 100% owner gives 10000.
    pub hhi: f64,
    pub cr1: f64,
    pub cr3: f64,
    pub cr5: f64,
    pub cr10: f64,
    /// Combined percent of the tracked majors.
    pub big_k_percent: f64,
    /// Holders with a current fact, whether or not a percent is known.
    pub holder_count: usize,
    /// Holders that contributed a percent to the figures above.
    pub measured_holder_count: usize,
}

impl ConcentrationMetrics {
    /// CR-N for one of the computed depths.
    pub fn cr(&self, depth: usize) -> Option<f64> {
        match depth {
            1 => Some(self.cr1),
            3 => Some(self.cr3),
            5 => Some(self.cr5),
            10 => Some(self.cr10),
            _ => None,
        }
    }
}

/// A company's concentration at one point in time. Derived, never edited.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ConcentrationSnapshot {
    pub company_id: CompanyId,
    pub computed_at: DateTime<Utc>,
    #[serde(flatten)]
    pub metrics: ConcentrationMetrics,
}

/// Concentration engine settings.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct ConcentrationConfig {
    /// Canonical names summed into `big_k_percent`.
    pub tracked_majors: Vec<String>,
}

impl ConcentrationConfig {
    pub fn tracked_holder_ids(&self) -> BTreeSet<HolderId> {
        self.tracked_majors
            .iter()
            .filter(|name| !name.trim().is_empty())
            .map(|name| HolderId::for_canonical_name(name))
            .collect()
    }
}
