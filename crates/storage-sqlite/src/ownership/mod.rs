mod model;
mod repository;

pub use model::OwnershipFactDB;
pub use repository::OwnershipRepository;
