//! Ownership facts.
//!
//! Facts are keyed by `(company, holder, filing)` and written idempotently.
//! The current view of a company keeps each holder's most recent fact.

mod locks;
mod model;
mod service;
mod store;

pub use locks::CompanyLocks;
pub use model::{
    CompanyId, FactKey, FilingId, FilingType, OwnershipFact, UpsertOutcome,
};
pub use service::{CommitHook, CommitReport, OwnershipService};
pub use store::{select_current_facts, OwnershipStore};
