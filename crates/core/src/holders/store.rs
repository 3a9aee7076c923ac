//! Canonical holder storage interface.

use async_trait::async_trait;

use super::model::{CanonicalHolder, HolderId};
use crate::errors::Result;

/// Storage interface for canonical holders.
///
/// Holders are written before any fact that references them, so the fact
/// store can enforce that every `holder_id` resolves.
#[async_trait]
pub trait HolderStore: Send + Sync {
    /// Insert a holder, or add its aliases to the stored alias set.
    ///
    /// Alias sets only grow. The canonical name of an existing holder is
    /// never changed; a differing name is a constraint violation.
    async fn upsert_holder(&self, holder: &CanonicalHolder) -> Result<()>;

    fn get_holder(&self, holder_id: &HolderId) -> Result<Option<CanonicalHolder>>;

    /// All holders ordered by `holder_id`.
    fn list_holders(&self) -> Result<Vec<CanonicalHolder>>;
}
