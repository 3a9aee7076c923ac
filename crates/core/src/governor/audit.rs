//! Request audit log storage interface.

use super::model::RequestRecord;
use crate::errors::Result;

/// Append-only store of [`RequestRecord`]s.
///
/// The governor appends one record per admission attempt. Appends are
/// synchronous so the record exists before the caller acts on the decision.
pub trait AuditLog: Send + Sync {
    /// Append a record. Never rewrites earlier records.
    fn append(&self, record: &RequestRecord) -> Result<()>;

    /// All records in append order.
    fn records(&self) -> Result<Vec<RequestRecord>>;
}
