pub mod repository;
pub mod types;

pub use repository::PatrolRepository;
pub use types::{PatrolPhoto, PatrolRecord, PatrolStatus};
