use std::sync::Arc;

use async_trait::async_trait;
use diesel::prelude::*;
use diesel::SqliteConnection;

use stakeledger_core::concentration::{ConcentrationSnapshot, SnapshotStore};
use stakeledger_core::errors::{Error, Result};
use stakeledger_core::ownership::CompanyId;

use super::model::{NewSnapshotDB, SnapshotDB};
use crate::db::{get_connection, DbPool, WriteHandle};
use crate::errors::{IntoCore, StorageError};
use crate::schema::concentration_snapshots;

pub struct SnapshotRepository {
    pool: Arc<DbPool>,
    writer: WriteHandle,
}

impl SnapshotRepository {
    pub fn new(pool: Arc<DbPool>, writer: WriteHandle) -> Self {
        SnapshotRepository { pool, writer }
    }
}

#[async_trait]
impl SnapshotStore for SnapshotRepository {
    async fn save_snapshot(&self, snapshot: &ConcentrationSnapshot) -> Result<()> {
        let row = NewSnapshotDB::from(snapshot);
        self.writer
            .exec(move |conn: &mut SqliteConnection| -> Result<()> {
                diesel::insert_into(concentration_snapshots::table)
                    .values(&row)
                    .execute(conn)
                    .map_err(StorageError::from)?;
                Ok(())
            })
            .await
    }

    fn latest_snapshot(&self, company_id: &CompanyId) -> Result<Option<ConcentrationSnapshot>> {
        let mut conn = get_connection(&self.pool)?;
        concentration_snapshots::table
            .filter(concentration_snapshots::company_id.eq(company_id.as_str()))
            .order(concentration_snapshots::id.desc())
            .select(SnapshotDB::as_select())
            .first::<SnapshotDB>(&mut conn)
            .optional()
            .into_core()?
            .map(|row| ConcentrationSnapshot::try_from(row).map_err(Error::from))
            .transpose()
    }

    fn snapshot_history(&self, company_id: &CompanyId) -> Result<Vec<ConcentrationSnapshot>> {
        let mut conn = get_connection(&self.pool)?;
        concentration_snapshots::table
            .filter(concentration_snapshots::company_id.eq(company_id.as_str()))
            .order(concentration_snapshots::id.asc())
            .select(SnapshotDB::as_select())
            .load::<SnapshotDB>(&mut conn)
            .into_core()?
            .into_iter()
            .map(|row| ConcentrationSnapshot::try_from(row).map_err(Error::from))
            .collect()
    }
}
