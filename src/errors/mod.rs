mod error;

pub use error::{DomainError, DbError, ServiceError, SyncError, ValidationError};

/// Result type for storage operations
pub type DbResult<T> = Result<T, DbError>;

/// Result type for record store operations
pub type DomainResult<T> = Result<T, DomainError>;

/// Result type for remote collaborator operations
pub type ServiceResult<T> = Result<T, ServiceError>;

/// Result type for sync operations
pub type SyncResult<T> = Result<T, SyncError>;
