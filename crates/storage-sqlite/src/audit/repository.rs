use std::sync::Arc;

use diesel::prelude::*;

use stakeledger_core::errors::{Error, Result};
use stakeledger_core::governor::{AuditLog, RequestRecord};

use super::model::{NewRequestRecordDB, RequestRecordDB};
use crate::db::{get_connection, DbPool};
use crate::errors::IntoCore;
use crate::schema::request_records;

/// Request audit log on pooled connections.
///
/// Appends are synchronous, so they bypass the writer actor and rely on the
/// connection's busy timeout when the writer holds the database.
pub struct AuditRepository {
    pool: Arc<DbPool>,
}

impl AuditRepository {
    pub fn new(pool: Arc<DbPool>) -> Self {
        AuditRepository { pool }
    }
}

impl AuditLog for AuditRepository {
    fn append(&self, record: &RequestRecord) -> Result<()> {
        let mut conn = get_connection(&self.pool)?;
        diesel::insert_into(request_records::table)
            .values(NewRequestRecordDB::from(record))
            .execute(&mut conn)
            .into_core()?;
        Ok(())
    }

    fn records(&self) -> Result<Vec<RequestRecord>> {
        let mut conn = get_connection(&self.pool)?;
        request_records::table
            .order(request_records::id.asc())
            .select(RequestRecordDB::as_select())
            .load::<RequestRecordDB>(&mut conn)
            .into_core()?
            .into_iter()
            .map(|row| RequestRecord::try_from(row).map_err(Error::from))
            .collect()
    }
}
