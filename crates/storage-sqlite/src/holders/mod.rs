mod model;
mod repository;

pub use model::{HolderAliasDB, HolderDB};
pub use repository::HolderRepository;
