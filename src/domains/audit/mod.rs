pub mod repository;
pub mod types;

pub use repository::AuditLog;
pub use types::{AppLog, LogModule};
