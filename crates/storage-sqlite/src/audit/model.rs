//! Database models for the request audit log.

use chrono::NaiveDateTime;
use diesel::prelude::*;

use stakeledger_core::governor::{RequestOutcome, RequestRecord};

use crate::errors::StorageError;

#[derive(Queryable, Selectable, PartialEq, Debug, Clone)]
#[diesel(table_name = crate::schema::request_records)]
#[diesel(check_for_backend(diesel::sqlite::Sqlite))]
pub struct RequestRecordDB {
    pub id: i32,
    pub timestamp: NaiveDateTime,
    pub endpoint: String,
    pub outcome: String,
    pub wait_ms: Option<i64>,
}

#[derive(Insertable, Debug, Clone)]
#[diesel(table_name = crate::schema::request_records)]
pub struct NewRequestRecordDB {
    pub timestamp: NaiveDateTime,
    pub endpoint: String,
    pub outcome: String,
    pub wait_ms: Option<i64>,
}

impl From<&RequestRecord> for NewRequestRecordDB {
    fn from(record: &RequestRecord) -> Self {
        let wait_ms = match record.outcome {
            RequestOutcome::Delayed { wait_ms } => Some(i64::try_from(wait_ms).unwrap_or(i64::MAX)),
            _ => None,
        };
        Self {
            timestamp: record.timestamp.naive_utc(),
            endpoint: record.endpoint.clone(),
            outcome: record.outcome.as_str().to_string(),
            wait_ms,
        }
    }
}

impl TryFrom<RequestRecordDB> for RequestRecord {
    type Error = StorageError;

    fn try_from(row: RequestRecordDB) -> Result<Self, Self::Error> {
        let outcome = match (row.outcome.as_str(), row.wait_ms) {
            ("admitted", _) => RequestOutcome::Admitted,
            ("delayed", Some(wait_ms)) => RequestOutcome::Delayed {
                wait_ms: wait_ms.max(0) as u64,
            },
            ("quota_exhausted", _) => RequestOutcome::QuotaExhausted,
            (other, _) => {
                return Err(StorageError::InvalidValue(format!(
                    "request record {} has outcome '{}' without its details",
                    row.id, other
                )))
            }
        };
        Ok(Self {
            timestamp: row.timestamp.and_utc(),
            endpoint: row.endpoint,
            outcome,
        })
    }
}
