//! Snapshot storage interface.

use async_trait::async_trait;

use super::model::ConcentrationSnapshot;
use crate::errors::Result;
use crate::ownership::CompanyId;

/// Storage interface for concentration snapshots. Snapshots are appended,
/// never edited.
#[async_trait]
pub trait SnapshotStore: Send + Sync {
    async fn save_snapshot(&self, snapshot: &ConcentrationSnapshot) -> Result<()>;

    /// Most recent snapshot for a company.
    fn latest_snapshot(&self, company_id: &CompanyId) -> Result<Option<ConcentrationSnapshot>>;

    /// Every snapshot for a company, oldest first.
    fn snapshot_history(&self, company_id: &CompanyId) -> Result<Vec<ConcentrationSnapshot>>;
}
