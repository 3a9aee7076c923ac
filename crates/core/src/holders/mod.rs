//! Canonical holders and their storage interface.

mod model;
mod store;

pub use model::{CanonicalHolder, HolderId};
pub use store::HolderStore;
