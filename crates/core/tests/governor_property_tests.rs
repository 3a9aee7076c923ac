//! Property-based integration tests for the request governor.
//!
//! These tests drive the governor with random request timings on a manual
//! clock and check the ceilings against the audit log it produced.

use std::sync::Arc;

use chrono::{DateTime, Duration, TimeZone, Utc};
use proptest::prelude::*;
use stakeledger_core::clock::ManualClock;
use stakeledger_core::governor::{
    Admission, AuditLog, ComplianceReport, GovernorConfig, GovernorError, RequestGovernor,
    RequestOutcome,
};
use stakeledger_core::memory::InMemoryStore;

// =============================================================================
// Helpers
// =============================================================================

fn start() -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2024, 3, 4, 9, 0, 0).unwrap()
}

/// Run one attempt per gap, advancing the clock by the gap first.
fn drive(
    per_second: u32,
    per_day: u32,
    gaps_ms: &[i64],
) -> (Vec<Result<Admission, GovernorError>>, Arc<InMemoryStore>) {
    let clock = Arc::new(ManualClock::new(start()));
    let store = Arc::new(InMemoryStore::new());
    let governor = RequestGovernor::with_clock(
        GovernorConfig {
            requests_per_second: per_second,
            requests_per_day: per_day,
            daily_reset_hour_utc: 0,
        },
        store.clone(),
        clock.clone(),
    )
    .unwrap();

    let results = gaps_ms
        .iter()
        .map(|gap| {
            clock.advance(Duration::milliseconds(*gap));
            governor.admit("archives")
        })
        .collect();
    (results, store)
}

// =============================================================================
// Property Tests
// =============================================================================

proptest! {
    #![proptest_config(ProptestConfig::with_cases(100))]

    /// No rolling one-second window ever holds more admissions than the
    /// per-second ceiling.
    #[test]
    fn prop_never_exceeds_per_second_ceiling(
        per_second in 1u32..8,
        gaps in proptest::collection::vec(0i64..400, 1..120),
    ) {
        let (_, store) = drive(per_second, 10_000, &gaps);
        let records = store.records().unwrap();
        let report = ComplianceReport::from_records(&records, per_second, 0);

        prop_assert_eq!(report.window_breaches, 0);
        prop_assert!(report.peak_per_second <= per_second);
        prop_assert!(report.is_conformant());
    }

    /// Admissions stop at the daily ceiling and every later attempt raises
    /// `QuotaExhausted`.
    #[test]
    fn prop_daily_ceiling_raises_quota_exhausted(
        per_day in 1u32..40,
        gaps in proptest::collection::vec(0i64..1_500, 1..120),
    ) {
        let (results, store) = drive(1_000, per_day, &gaps);

        let admitted = results
            .iter()
            .filter(|r| matches!(r, Ok(Admission::Admitted)))
            .count() as u32;
        prop_assert!(admitted <= per_day);

        if let Some(first_rejection) = results.iter().position(|r| r.is_err()) {
            prop_assert_eq!(admitted, per_day);
            for later in &results[first_rejection..] {
                let is_quota = matches!(later, Err(GovernorError::QuotaExhausted { .. }));
                prop_assert!(is_quota);
            }
        } else {
            prop_assert!(admitted <= per_day);
        }
    }

    /// Every attempt is audited exactly once, with a matching outcome.
    #[test]
    fn prop_every_attempt_is_audited(
        per_second in 1u32..5,
        per_day in 1u32..30,
        gaps in proptest::collection::vec(0i64..600, 1..80),
    ) {
        let (results, store) = drive(per_second, per_day, &gaps);
        let records = store.records().unwrap();
        prop_assert_eq!(records.len(), results.len());

        for (result, record) in results.iter().zip(&records) {
            let consistent = match (result, &record.outcome) {
                (Ok(Admission::Admitted), RequestOutcome::Admitted) => true,
                (Ok(Admission::Wait(_)), RequestOutcome::Delayed { .. }) => true,
                (Err(GovernorError::QuotaExhausted { .. }), RequestOutcome::QuotaExhausted) => true,
                _ => false,
            };
            prop_assert!(consistent, "{:?} audited as {:?}", result, record.outcome);
        }
    }
}
