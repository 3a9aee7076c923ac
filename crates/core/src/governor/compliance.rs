//! Compliance reporting over the request audit log.
//!
//! The report is derived purely from persisted [`RequestRecord`]s, so
//! conformance can be reconstructed after the fact without access to the
//! live governor.

use std::collections::BTreeMap;

use chrono::{DateTime, Duration, NaiveDate, Utc};
use serde::Serialize;

use super::model::{reporting_day, RequestOutcome, RequestRecord};

/// Counts for one reporting day.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DayCompliance {
    pub day: NaiveDate,
    pub admitted: u32,
    pub delayed: u32,
    pub rejected: u32,
    /// Most admissions observed in any rolling one-second window that day.
    pub peak_per_second: u32,
}

/// A delayed admission attempt.
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DelayEvent {
    pub at: DateTime<Utc>,
    pub endpoint: String,
    pub wait_ms: u64,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ComplianceReport {
    pub per_second_ceiling: u32,
    pub total_attempts: usize,
    pub admitted: u32,
    pub delayed: u32,
    pub rejected: u32,
    pub peak_per_second: u32,
    /// Admissions that pushed a rolling window above the ceiling.
    pub window_breaches: u32,
    pub days: Vec<DayCompliance>,
    pub quota_exhaustions: Vec<DateTime<Utc>>,
    pub delays: Vec<DelayEvent>,
}

impl ComplianceReport {
    /// Build the report from audit records in any order.
    pub fn from_records(
        records: &[RequestRecord],
        per_second_ceiling: u32,
        reset_hour_utc: u32,
    ) -> Self {
        let mut sorted: Vec<&RequestRecord> = records.iter().collect();
        sorted.sort_by_key(|r| r.timestamp);

        let mut days: BTreeMap<NaiveDate, (DayCompliance, Vec<DateTime<Utc>>)> = BTreeMap::new();
        let mut admitted_at = Vec::new();
        let mut quota_exhaustions = Vec::new();
        let mut delays = Vec::new();

        for record in &sorted {
            let day = reporting_day(record.timestamp, reset_hour_utc);
            let (entry, day_admitted) = days.entry(day).or_insert_with(|| {
                (
                    DayCompliance {
                        day,
                        ..DayCompliance::default()
                    },
                    Vec::new(),
                )
            });

            match &record.outcome {
                RequestOutcome::Admitted => {
                    entry.admitted += 1;
                    day_admitted.push(record.timestamp);
                    admitted_at.push(record.timestamp);
                }
                RequestOutcome::Delayed { wait_ms } => {
                    entry.delayed += 1;
                    delays.push(DelayEvent {
                        at: record.timestamp,
                        endpoint: record.endpoint.clone(),
                        wait_ms: *wait_ms,
                    });
                }
                RequestOutcome::QuotaExhausted => {
                    entry.rejected += 1;
                    quota_exhaustions.push(record.timestamp);
                }
            }
        }

        let (peak_per_second, window_breaches) = window_stats(&admitted_at, per_second_ceiling);

        let days: Vec<DayCompliance> = days
            .into_values()
            .map(|(mut day, admitted)| {
                day.peak_per_second = window_stats(&admitted, per_second_ceiling).0;
                day
            })
            .collect();

        Self {
            per_second_ceiling,
            total_attempts: records.len(),
            admitted: days.iter().map(|d| d.admitted).sum(),
            delayed: days.iter().map(|d| d.delayed).sum(),
            rejected: days.iter().map(|d| d.rejected).sum(),
            peak_per_second,
            window_breaches,
            days,
            quota_exhaustions,
            delays,
        }
    }

    /// True when no rolling window ever exceeded the ceiling.
    pub fn is_conformant(&self) -> bool {
        self.window_breaches == 0
    }
}

/// Peak admissions in any rolling one-second window, and the number of
/// admissions that landed while the window was already full.
///
/// `sorted` must be in ascending order. A window ending at `t` holds every
/// admission with timestamp in `(t - 1s, t]`.
fn window_stats(sorted: &[DateTime<Utc>], ceiling: u32) -> (u32, u32) {
    let window = Duration::seconds(1);
    let mut start = 0;
    let mut peak = 0u32;
    let mut breaches = 0u32;

    for (end, ts) in sorted.iter().enumerate() {
        while sorted[start] <= *ts - window {
            start += 1;
        }
        let in_window = (end - start + 1) as u32;
        peak = peak.max(in_window);
        if in_window > ceiling {
            breaches += 1;
        }
    }

    (peak, breaches)
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn record(ms: i64, outcome: RequestOutcome) -> RequestRecord {
        RequestRecord {
            timestamp: Utc.with_ymd_and_hms(2024, 5, 6, 23, 59, 58).unwrap()
                + Duration::milliseconds(ms),
            endpoint: "https://data.sec.gov/submissions".to_string(),
            outcome,
        }
    }

    #[test]
    fn test_counts_and_days() {
        let records = vec![
            record(0, RequestOutcome::Admitted),
            record(100, RequestOutcome::Delayed { wait_ms: 900 }),
            record(1_000, RequestOutcome::Admitted),
            // Crosses UTC midnight.
            record(2_500, RequestOutcome::Admitted),
            record(2_600, RequestOutcome::QuotaExhausted),
        ];

        let report = ComplianceReport::from_records(&records, 1, 0);

        assert_eq!(report.total_attempts, 5);
        assert_eq!(report.admitted, 3);
        assert_eq!(report.delayed, 1);
        assert_eq!(report.rejected, 1);
        assert_eq!(report.days.len(), 2);
        assert_eq!(report.days[0].admitted, 2);
        assert_eq!(report.days[1].admitted, 1);
        assert_eq!(report.days[1].rejected, 1);
        assert_eq!(report.quota_exhaustions.len(), 1);
        assert_eq!(report.delays[0].wait_ms, 900);
        assert_eq!(report.peak_per_second, 1);
        assert!(report.is_conformant());
    }

    #[test]
    fn test_detects_window_breach() {
        let records = vec![
            record(0, RequestOutcome::Admitted),
            record(200, RequestOutcome::Admitted),
            record(400, RequestOutcome::Admitted),
            record(1_300, RequestOutcome::Admitted),
        ];

        let report = ComplianceReport::from_records(&records, 2, 0);

        assert_eq!(report.peak_per_second, 3);
        // Only the admission at 400ms saw three in its window.
        assert_eq!(report.window_breaches, 1);
        assert!(!report.is_conformant());
    }

    #[test]
    fn test_unordered_records_are_sorted() {
        let records = vec![
            record(900, RequestOutcome::Admitted),
            record(0, RequestOutcome::Admitted),
            record(500, RequestOutcome::Admitted),
        ];
        let report = ComplianceReport::from_records(&records, 3, 0);
        assert_eq!(report.peak_per_second, 3);
        assert!(report.is_conformant());
    }

    #[test]
    fn test_empty_log() {
        let report = ComplianceReport::from_records(&[], 10, 0);
        assert_eq!(report.total_attempts, 0);
        assert!(report.days.is_empty());
        assert!(report.is_conformant());
    }
}
