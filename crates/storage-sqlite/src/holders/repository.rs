use std::collections::{BTreeMap, BTreeSet};
use std::sync::Arc;

use async_trait::async_trait;
use diesel::prelude::*;
use diesel::SqliteConnection;

use stakeledger_core::errors::{Error, Result};
use stakeledger_core::holders::{CanonicalHolder, HolderId, HolderStore};

use super::model::{HolderAliasDB, HolderDB};
use crate::db::{get_connection, DbPool, WriteHandle};
use crate::errors::{IntoCore, StorageError};
use crate::schema::{canonical_holders, holder_aliases};

pub struct HolderRepository {
    pool: Arc<DbPool>,
    writer: WriteHandle,
}

impl HolderRepository {
    pub fn new(pool: Arc<DbPool>, writer: WriteHandle) -> Self {
        HolderRepository { pool, writer }
    }

    fn assemble(row: HolderDB, aliases: impl IntoIterator<Item = String>) -> CanonicalHolder {
        CanonicalHolder {
            holder_id: HolderId::new(row.holder_id),
            canonical_name: row.canonical_name,
            known_aliases: aliases.into_iter().collect(),
        }
    }
}

#[async_trait]
impl HolderStore for HolderRepository {
    async fn upsert_holder(&self, holder: &CanonicalHolder) -> Result<()> {
        let row = HolderDB::from(holder);
        let aliases = HolderAliasDB::for_holder(holder);

        self.writer
            .exec(move |conn: &mut SqliteConnection| -> Result<()> {
                let stored_name = canonical_holders::table
                    .find(&row.holder_id)
                    .select(canonical_holders::canonical_name)
                    .first::<String>(conn)
                    .optional()
                    .map_err(StorageError::from)?;

                match stored_name {
                    Some(name) if name != row.canonical_name => {
                        return Err(Error::ConstraintViolation(format!(
                            "Holder {} is named '{}', refusing rename to '{}'",
                            row.holder_id, name, row.canonical_name
                        )));
                    }
                    Some(_) => {}
                    None => {
                        diesel::insert_into(canonical_holders::table)
                            .values(&row)
                            .execute(conn)
                            .map_err(StorageError::from)?;
                    }
                }

                for alias in &aliases {
                    diesel::insert_or_ignore_into(holder_aliases::table)
                        .values(alias)
                        .execute(conn)
                        .map_err(StorageError::from)?;
                }
                Ok(())
            })
            .await
    }

    fn get_holder(&self, holder_id: &HolderId) -> Result<Option<CanonicalHolder>> {
        let mut conn = get_connection(&self.pool)?;
        let Some(row) = canonical_holders::table
            .find(holder_id.as_str())
            .select(HolderDB::as_select())
            .first::<HolderDB>(&mut conn)
            .optional()
            .into_core()?
        else {
            return Ok(None);
        };

        let aliases = holder_aliases::table
            .filter(holder_aliases::holder_id.eq(holder_id.as_str()))
            .select(holder_aliases::alias)
            .load::<String>(&mut conn)
            .into_core()?;

        Ok(Some(Self::assemble(row, aliases)))
    }

    fn list_holders(&self) -> Result<Vec<CanonicalHolder>> {
        let mut conn = get_connection(&self.pool)?;
        let rows = canonical_holders::table
            .order(canonical_holders::holder_id.asc())
            .select(HolderDB::as_select())
            .load::<HolderDB>(&mut conn)
            .into_core()?;
        let alias_rows = holder_aliases::table
            .select(HolderAliasDB::as_select())
            .load::<HolderAliasDB>(&mut conn)
            .into_core()?;

        let mut aliases: BTreeMap<String, BTreeSet<String>> = BTreeMap::new();
        for alias in alias_rows {
            aliases.entry(alias.holder_id).or_default().insert(alias.alias);
        }

        Ok(rows
            .into_iter()
            .map(|row| {
                let known = aliases.remove(&row.holder_id).unwrap_or_default();
                Self::assemble(row, known)
            })
            .collect())
    }
}
