//! Database models for ownership facts.

use chrono::NaiveDate;
use diesel::prelude::*;

use stakeledger_core::holders::HolderId;
use stakeledger_core::ownership::{CompanyId, FilingId, FilingType, OwnershipFact};

use crate::errors::StorageError;

#[derive(Queryable, Selectable, Insertable, AsChangeset, PartialEq, Debug, Clone)]
#[diesel(table_name = crate::schema::ownership_facts)]
#[diesel(check_for_backend(diesel::sqlite::Sqlite))]
#[diesel(treat_none_as_null = true)]
pub struct OwnershipFactDB {
    pub company_id: String,
    pub holder_id: String,
    pub filing_id: String,
    pub shares: i64,
    pub percent: Option<f64>,
    pub as_of_date: NaiveDate,
    pub source_filing_type: String,
}

impl TryFrom<&OwnershipFact> for OwnershipFactDB {
    type Error = StorageError;

    fn try_from(fact: &OwnershipFact) -> Result<Self, Self::Error> {
        let shares = i64::try_from(fact.shares).map_err(|_| {
            StorageError::InvalidValue(format!(
                "{} shares for {} in {} exceed the storable range",
                fact.shares, fact.holder_id, fact.company_id
            ))
        })?;
        Ok(Self {
            company_id: fact.company_id.as_str().to_string(),
            holder_id: fact.holder_id.as_str().to_string(),
            filing_id: fact.filing_id.as_str().to_string(),
            shares,
            percent: fact.percent,
            as_of_date: fact.as_of_date,
            source_filing_type: fact.source_filing_type.as_str().to_string(),
        })
    }
}

impl TryFrom<OwnershipFactDB> for OwnershipFact {
    type Error = StorageError;

    fn try_from(row: OwnershipFactDB) -> Result<Self, Self::Error> {
        let shares = u64::try_from(row.shares).map_err(|_| {
            StorageError::InvalidValue(format!(
                "negative share count {} stored for {} in {}",
                row.shares, row.holder_id, row.company_id
            ))
        })?;
        Ok(Self {
            company_id: CompanyId::new(row.company_id),
            holder_id: HolderId::new(row.holder_id),
            filing_id: FilingId::new(row.filing_id),
            shares,
            percent: row.percent,
            as_of_date: row.as_of_date,
            source_filing_type: FilingType::parse(&row.source_filing_type),
        })
    }
}
