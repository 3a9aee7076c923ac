//! Database models for concentration snapshots.

use chrono::NaiveDateTime;
use diesel::prelude::*;

use stakeledger_core::concentration::{ConcentrationMetrics, ConcentrationSnapshot};
use stakeledger_core::ownership::CompanyId;

use crate::errors::StorageError;

#[derive(Queryable, Selectable, PartialEq, Debug, Clone)]
#[diesel(table_name = crate::schema::concentration_snapshots)]
#[diesel(check_for_backend(diesel::sqlite::Sqlite))]
pub struct SnapshotDB {
    pub id: i32,
    pub company_id: String,
    pub computed_at: NaiveDateTime,
    pub hhi: f64,
    pub cr1: f64,
    pub cr3: f64,
    pub cr5: f64,
    pub cr10: f64,
    pub big_k_percent: f64,
    pub holder_count: i64,
    pub measured_holder_count: i64,
}

#[derive(Insertable, Debug, Clone)]
#[diesel(table_name = crate::schema::concentration_snapshots)]
pub struct NewSnapshotDB {
    pub company_id: String,
    pub computed_at: NaiveDateTime,
    pub hhi: f64,
    pub cr1: f64,
    pub cr3: f64,
    pub cr5: f64,
    pub cr10: f64,
    pub big_k_percent: f64,
    pub holder_count: i64,
    pub measured_holder_count: i64,
}

impl From<&ConcentrationSnapshot> for NewSnapshotDB {
    fn from(snapshot: &ConcentrationSnapshot) -> Self {
        let metrics = &snapshot.metrics;
        Self {
            company_id: snapshot.company_id.as_str().to_string(),
            computed_at: snapshot.computed_at.naive_utc(),
            hhi: metrics.hhi,
            cr1: metrics.cr1,
            cr3: metrics.cr3,
            cr5: metrics.cr5,
            cr10: metrics.cr10,
            big_k_percent: metrics.big_k_percent,
            holder_count: metrics.holder_count as i64,
            measured_holder_count: metrics.measured_holder_count as i64,
        }
    }
}

impl TryFrom<SnapshotDB> for ConcentrationSnapshot {
    type Error = StorageError;

    fn try_from(row: SnapshotDB) -> Result<Self, Self::Error> {
        let count = |value: i64, column: &str| {
            usize::try_from(value).map_err(|_| {
                StorageError::InvalidValue(format!(
                    "snapshot {} has negative {} {}",
                    row.id, column, value
                ))
            })
        };
        let metrics = ConcentrationMetrics {
            hhi: row.hhi,
            cr1: row.cr1,
            cr3: row.cr3,
            cr5: row.cr5,
            cr10: row.cr10,
            big_k_percent: row.big_k_percent,
            holder_count: count(row.holder_count, "holder_count")?,
            measured_holder_count: count(row.measured_holder_count, "measured_holder_count")?,
        };
        Ok(Self {
            company_id: CompanyId::new(row.company_id),
            computed_at: row.computed_at.and_utc(),
            metrics,
        })
    }
}
