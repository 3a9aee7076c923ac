mod model;
mod repository;

pub use model::{NewSnapshotDB, SnapshotDB};
pub use repository::SnapshotRepository;
