//! Per-company write serialization.

use std::sync::Arc;

use dashmap::DashMap;
use tokio::sync::{Mutex, OwnedMutexGuard};

use super::model::CompanyId;

/// One async mutex per company.
///
/// Fact commits and snapshot recomputation for a company hold its lock, so
/// a snapshot always reflects a complete set of committed filings. Different
/// companies never contend.
#[derive(Default)]
pub struct CompanyLocks {
    locks: DashMap<CompanyId, Arc<Mutex<()>>>,
}

impl CompanyLocks {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn lock(&self, company_id: &CompanyId) -> OwnedMutexGuard<()> {
        let mutex = self
            .locks
            .entry(company_id.clone())
            .or_insert_with(|| Arc::new(Mutex::new(())))
            .clone();
        mutex.lock_owned().await
    }

    pub fn len(&self) -> usize {
        self.locks.len()
    }

    pub fn is_empty(&self) -> bool {
        self.locks.is_empty()
    }
}
