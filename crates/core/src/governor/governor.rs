//! Sliding-window request governor.
//!
//! Every outbound filing fetch asks the governor for admission first. The
//! governor keeps the timestamps of admissions made within the last second
//! and a counter of admissions for the current reporting day. Decisions are
//! taken under one mutex so concurrent workers cannot jointly overshoot the
//! per-second ceiling.

use std::collections::VecDeque;
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::Duration;

use chrono::{DateTime, Duration as ChronoDuration, NaiveDate, Utc};
use log::{debug, error, warn};

use super::audit::AuditLog;
use super::errors::GovernorError;
use super::model::{
    day_end, reporting_day, Admission, GovernorConfig, GovernorUsage, RequestOutcome,
    RequestRecord,
};
use crate::clock::{Clock, SystemClock};
use crate::shutdown::StopSignal;

/// Mutable counters guarded by the governor's mutex.
#[derive(Debug)]
struct WindowState {
    /// Admission timestamps still inside the rolling window, oldest first.
    window: VecDeque<DateTime<Utc>>,
    /// Reporting day the daily counter belongs to.
    day: NaiveDate,
    admitted_today: u32,
}

impl WindowState {
    fn roll_day(&mut self, day: NaiveDate) {
        if day != self.day {
            debug!(
                "Governor: daily counter reset ({} -> {}, {} admitted)",
                self.day, day, self.admitted_today
            );
            self.day = day;
            self.admitted_today = 0;
        }
    }

    /// Drop timestamps that are at least one window old.
    fn expire(&mut self, now: DateTime<Utc>, window: ChronoDuration) {
        while let Some(oldest) = self.window.front() {
            if *oldest <= now - window {
                self.window.pop_front();
            } else {
                break;
            }
        }
    }
}

/// Rate and quota gate shared by every ingest worker.
pub struct RequestGovernor {
    config: GovernorConfig,
    window: ChronoDuration,
    state: Mutex<WindowState>,
    audit: Arc<dyn AuditLog>,
    clock: Arc<dyn Clock>,
}

impl RequestGovernor {
    /// Create a governor reading the system clock.
    pub fn new(config: GovernorConfig, audit: Arc<dyn AuditLog>) -> Result<Self, GovernorError> {
        Self::with_clock(config, audit, Arc::new(SystemClock))
    }

    /// Create a governor with an explicit clock.
    pub fn with_clock(
        config: GovernorConfig,
        audit: Arc<dyn AuditLog>,
        clock: Arc<dyn Clock>,
    ) -> Result<Self, GovernorError> {
        if config.requests_per_second == 0 {
            return Err(GovernorError::InvalidConfig(
                "requests_per_second must be at least 1".to_string(),
            ));
        }
        if config.daily_reset_hour_utc > 23 {
            return Err(GovernorError::InvalidConfig(format!(
                "daily_reset_hour_utc must be 0-23, got {}",
                config.daily_reset_hour_utc
            )));
        }

        let day = reporting_day(clock.now(), config.daily_reset_hour_utc);
        Ok(Self {
            state: Mutex::new(WindowState {
                window: VecDeque::with_capacity(config.requests_per_second as usize),
                day,
                admitted_today: 0,
            }),
            window: ChronoDuration::seconds(1),
            config,
            audit,
            clock,
        })
    }

    pub fn config(&self) -> &GovernorConfig {
        &self.config
    }

    /// Lock the window state, recovering from poison if necessary.
    ///
    /// Every mutation of the state completes before the guard is released,
    /// so a poisoned guard still holds consistent counters.
    fn lock_state(&self) -> MutexGuard<'_, WindowState> {
        self.state.lock().unwrap_or_else(|poisoned| {
            warn!("Governor state mutex was poisoned, recovering");
            poisoned.into_inner()
        })
    }

    /// Ask for permission to issue one fetch against `endpoint`.
    ///
    /// Returns [`Admission::Wait`] with the minimal delay until the oldest
    /// admission leaves the window when per-second capacity is used up, and
    /// [`GovernorError::QuotaExhausted`] once the daily ceiling is reached.
    /// Every attempt is appended to the audit log.
    pub fn admit(&self, endpoint: &str) -> Result<Admission, GovernorError> {
        let now = self.clock.now();

        let (decision, outcome) = {
            let mut state = self.lock_state();
            state.roll_day(reporting_day(now, self.config.daily_reset_hour_utc));

            if state.admitted_today >= self.config.requests_per_day {
                let resets_at = day_end(state.day, self.config.daily_reset_hour_utc);
                (
                    Err(GovernorError::QuotaExhausted {
                        limit: self.config.requests_per_day,
                        resets_at,
                    }),
                    RequestOutcome::QuotaExhausted,
                )
            } else {
                state.expire(now, self.window);

                match state.window.front().copied() {
                    Some(oldest)
                        if state.window.len() >= self.config.requests_per_second as usize =>
                    {
                        let wait = (oldest + self.window - now)
                            .to_std()
                            .unwrap_or(Duration::ZERO);
                        let wait_ms = wait.as_micros().div_ceil(1_000) as u64;
                        (Ok(Admission::Wait(wait)), RequestOutcome::Delayed { wait_ms })
                    }
                    _ => {
                        state.window.push_back(now);
                        state.admitted_today += 1;
                        (Ok(Admission::Admitted), RequestOutcome::Admitted)
                    }
                }
            }
        };

        let record = RequestRecord {
            timestamp: now,
            endpoint: endpoint.to_string(),
            outcome,
        };
        if let Err(e) = self.audit.append(&record) {
            error!("Governor: failed to audit request to '{}': {}", endpoint, e);
            return Err(GovernorError::Audit(e.to_string()));
        }

        decision
    }

    /// Wait until a fetch against `endpoint` is admitted.
    ///
    /// Sleeps through per-second waits; returns the quota error as soon as
    /// it is raised and [`GovernorError::Cancelled`] if `stop` fires first.
    pub async fn acquire(&self, endpoint: &str, stop: &StopSignal) -> Result<(), GovernorError> {
        loop {
            if stop.is_stopped() {
                return Err(GovernorError::Cancelled);
            }

            match self.admit(endpoint)? {
                Admission::Admitted => {
                    debug!("Governor: admitted request to '{}'", endpoint);
                    return Ok(());
                }
                Admission::Wait(wait) => {
                    debug!("Governor: waiting {:?} before '{}'", wait, endpoint);
                    if !stop.sleep(wait).await {
                        return Err(GovernorError::Cancelled);
                    }
                }
            }
        }
    }

    /// Snapshot of the counters as of now.
    pub fn usage(&self) -> GovernorUsage {
        let now = self.clock.now();
        let mut state = self.lock_state();
        state.roll_day(reporting_day(now, self.config.daily_reset_hour_utc));
        state.expire(now, self.window);

        GovernorUsage {
            in_window: state.window.len() as u32,
            admitted_today: state.admitted_today,
            requests_per_second: self.config.requests_per_second,
            requests_per_day: self.config.requests_per_day,
            day: state.day,
        }
    }
}
