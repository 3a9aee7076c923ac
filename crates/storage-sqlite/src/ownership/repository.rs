use std::sync::Arc;

use async_trait::async_trait;
use diesel::dsl::count_star;
use diesel::prelude::*;
use diesel::SqliteConnection;

use stakeledger_core::errors::{Error, Result};
use stakeledger_core::ownership::{
    select_current_facts, CompanyId, OwnershipFact, OwnershipStore, UpsertOutcome,
};

use super::model::OwnershipFactDB;
use crate::db::{get_connection, DbConnection, DbPool, WriteHandle};
use crate::errors::{IntoCore, StorageError};
use crate::schema::{canonical_holders, ownership_facts};

pub struct OwnershipRepository {
    pool: Arc<DbPool>,
    writer: WriteHandle,
}

impl OwnershipRepository {
    pub fn new(pool: Arc<DbPool>, writer: WriteHandle) -> Self {
        OwnershipRepository { pool, writer }
    }

    fn load_company(conn: &mut DbConnection, company_id: &CompanyId) -> Result<Vec<OwnershipFact>> {
        let rows = ownership_facts::table
            .filter(ownership_facts::company_id.eq(company_id.as_str()))
            .order((
                ownership_facts::holder_id.asc(),
                ownership_facts::as_of_date.asc(),
                ownership_facts::filing_id.asc(),
            ))
            .select(OwnershipFactDB::as_select())
            .load::<OwnershipFactDB>(conn)
            .into_core()?;

        rows.into_iter()
            .map(|row| OwnershipFact::try_from(row).map_err(Error::from))
            .collect()
    }
}

#[async_trait]
impl OwnershipStore for OwnershipRepository {
    async fn upsert_fact(&self, fact: &OwnershipFact) -> Result<UpsertOutcome> {
        let row = OwnershipFactDB::try_from(fact)?;
        let fact = fact.clone();

        self.writer
            .exec(move |conn: &mut SqliteConnection| -> Result<UpsertOutcome> {
                let holder_known = canonical_holders::table
                    .filter(canonical_holders::holder_id.eq(&row.holder_id))
                    .select(count_star())
                    .first::<i64>(conn)
                    .map_err(StorageError::from)?;
                if holder_known == 0 {
                    return Err(Error::ConstraintViolation(format!(
                        "Fact references unknown holder {}",
                        row.holder_id
                    )));
                }

                let key = (
                    row.company_id.clone(),
                    row.holder_id.clone(),
                    row.filing_id.clone(),
                );
                let existing = ownership_facts::table
                    .find(key.clone())
                    .select(OwnershipFactDB::as_select())
                    .first::<OwnershipFactDB>(conn)
                    .optional()
                    .map_err(StorageError::from)?
                    .map(OwnershipFact::try_from)
                    .transpose()?;

                let outcome = match existing {
                    Some(stored) if stored.same_payload(&fact) => UpsertOutcome::Unchanged,
                    Some(_) => {
                        diesel::update(ownership_facts::table.find(key))
                            .set(&row)
                            .execute(conn)
                            .map_err(StorageError::from)?;
                        UpsertOutcome::Updated
                    }
                    None => {
                        diesel::insert_into(ownership_facts::table)
                            .values(&row)
                            .execute(conn)
                            .map_err(StorageError::from)?;
                        UpsertOutcome::Inserted
                    }
                };
                Ok(outcome)
            })
            .await
    }

    fn current_facts(&self, company_id: &CompanyId) -> Result<Vec<OwnershipFact>> {
        let mut conn = get_connection(&self.pool)?;
        Ok(select_current_facts(Self::load_company(&mut conn, company_id)?))
    }

    fn all_facts(&self, company_id: &CompanyId) -> Result<Vec<OwnershipFact>> {
        let mut conn = get_connection(&self.pool)?;
        Self::load_company(&mut conn, company_id)
    }

    fn companies(&self) -> Result<Vec<CompanyId>> {
        let mut conn = get_connection(&self.pool)?;
        let ids = ownership_facts::table
            .select(ownership_facts::company_id)
            .distinct()
            .order(ownership_facts::company_id.asc())
            .load::<String>(&mut conn)
            .into_core()?;
        Ok(ids.into_iter().map(CompanyId::new).collect())
    }
}
