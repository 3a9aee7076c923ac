//! Domain event types.

use serde::{Deserialize, Serialize};

use crate::holders::HolderId;
use crate::ownership::{CompanyId, FilingId};

/// Domain events emitted by core services after successful mutations.
///
/// These events represent facts about ownership data changes. The runner
/// logs them; other adapters may forward them elsewhere.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum DomainEvent {
    /// Holders were minted or gained aliases.
    HoldersChanged { holder_ids: Vec<HolderId> },

    /// A filing's facts were committed for one company.
    FactsCommitted {
        company_id: CompanyId,
        filing_id: FilingId,
        inserted: usize,
        updated: usize,
        unchanged: usize,
    },

    /// A company's concentration snapshot was recomputed.
    SnapshotRecomputed {
        company_id: CompanyId,
        hhi: f64,
        holder_count: usize,
    },

    /// A new holder was minted close to an existing one and needs review.
    AmbiguousHolder {
        holder_id: HolderId,
        similar_holder_id: HolderId,
        score: f64,
    },
}

impl DomainEvent {
    /// Creates a HoldersChanged event.
    pub fn holders_changed(holder_ids: Vec<HolderId>) -> Self {
        Self::HoldersChanged { holder_ids }
    }

    /// Creates a FactsCommitted event.
    pub fn facts_committed(
        company_id: CompanyId,
        filing_id: FilingId,
        inserted: usize,
        updated: usize,
        unchanged: usize,
    ) -> Self {
        Self::FactsCommitted {
            company_id,
            filing_id,
            inserted,
            updated,
            unchanged,
        }
    }

    /// Creates a SnapshotRecomputed event.
    pub fn snapshot_recomputed(company_id: CompanyId, hhi: f64, holder_count: usize) -> Self {
        Self::SnapshotRecomputed {
            company_id,
            hhi,
            holder_count,
        }
    }

    pub fn ambiguous_holder(holder_id: HolderId, similar_holder_id: HolderId, score: f64) -> Self {
        Self::AmbiguousHolder {
            holder_id,
            similar_holder_id,
            score,
        }
    }
}
