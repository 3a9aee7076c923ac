//! Governor configuration, admission decisions and audit records.

use std::time::Duration;

use chrono::{DateTime, Duration as ChronoDuration, NaiveDate, NaiveTime, Utc};
use serde::{Deserialize, Serialize};

use crate::constants::{DEFAULT_REQUESTS_PER_DAY, DEFAULT_REQUESTS_PER_SECOND};

/// Call budgets enforced by the [`RequestGovernor`](super::RequestGovernor).
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct GovernorConfig {
    /// Maximum admissions within any rolling one-second window.
    pub requests_per_second: u32,
    /// Maximum admissions per reporting day.
    pub requests_per_day: u32,
    /// Hour (UTC) at which the daily counter resets.
    pub daily_reset_hour_utc: u32,
}

impl Default for GovernorConfig {
    fn default() -> Self {
        Self {
            requests_per_second: DEFAULT_REQUESTS_PER_SECOND,
            requests_per_day: DEFAULT_REQUESTS_PER_DAY,
            daily_reset_hour_utc: 0,
        }
    }
}

/// Result of an admission request.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Admission {
    /// The caller may issue the fetch now.
    Admitted,
    /// Per-second capacity is used up; retry after this long.
    Wait(Duration),
}

/// What the governor decided for one attempt.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum RequestOutcome {
    Admitted,
    Delayed { wait_ms: u64 },
    QuotaExhausted,
}

impl RequestOutcome {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Admitted => "admitted",
            Self::Delayed { .. } => "delayed",
            Self::QuotaExhausted => "quota_exhausted",
        }
    }
}

/// One line of the append-only request audit log.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RequestRecord {
    pub timestamp: DateTime<Utc>,
    pub endpoint: String,
    pub outcome: RequestOutcome,
}

/// Read-only view of the governor's counters.
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct GovernorUsage {
    pub in_window: u32,
    pub admitted_today: u32,
    pub requests_per_second: u32,
    pub requests_per_day: u32,
    pub day: NaiveDate,
}

/// The reporting day a timestamp belongs to, given the reset hour.
pub fn reporting_day(ts: DateTime<Utc>, reset_hour_utc: u32) -> NaiveDate {
    (ts - ChronoDuration::hours(i64::from(reset_hour_utc))).date_naive()
}

/// The instant the given reporting day ends.
pub fn day_end(day: NaiveDate, reset_hour_utc: u32) -> DateTime<Utc> {
    day.and_time(NaiveTime::MIN).and_utc()
        + ChronoDuration::days(1)
        + ChronoDuration::hours(i64::from(reset_hour_utc))
}
