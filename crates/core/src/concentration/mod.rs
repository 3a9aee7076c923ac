//! Concentration engine.
//!
//! Derives HHI, CR-N and tracked-major totals from each company's current
//! ownership facts. Snapshots are recomputed after every commit that changes
//! a company's facts.

mod calculator;
mod engine;
mod model;
mod presence;
mod reference;
mod store;

pub use calculator::ConcentrationCalculator;
pub use engine::ConcentrationEngine;
pub use model::{ConcentrationConfig, ConcentrationMetrics, ConcentrationSnapshot};
pub use presence::{HolderPresence, PresenceReport};
pub use reference::{NoSharesOutstanding, SharesOutstandingReference, StaticSharesOutstanding};
pub use store::SnapshotStore;
