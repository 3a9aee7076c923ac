//! Request governor module.
//!
//! This module provides the compliance gate for outbound filing fetches:
//! - Per-second sliding window and per-day quota enforcement
//! - An append-only audit log of every admission attempt
//! - Compliance reports reconstructed from the audit log

mod audit;
mod compliance;
mod errors;
mod governor;
mod model;

pub use audit::AuditLog;
pub use compliance::{ComplianceReport, DayCompliance, DelayEvent};
pub use errors::GovernorError;
pub use governor::RequestGovernor;
pub use model::{
    day_end, reporting_day, Admission, GovernorConfig, GovernorUsage, RequestOutcome,
    RequestRecord,
};
