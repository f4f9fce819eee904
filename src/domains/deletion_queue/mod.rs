pub mod repository;
pub mod types;

pub use repository::DeletionQueue;
pub use types::DeletedItem;
