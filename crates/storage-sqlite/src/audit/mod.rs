mod model;
mod repository;

pub use model::{NewRequestRecordDB, RequestRecordDB};
pub use repository::AuditRepository;
