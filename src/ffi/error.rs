use crate::errors::{DbError, DomainError, ServiceError, SyncError, ValidationError};
use serde::{Deserialize, Serialize};
use serde_json::json;
use std::cell::RefCell;
use std::ffi::CString;
use std::fmt;
use std::os::raw::c_char;

/// Error codes for FFI boundary
#[repr(i32)]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ErrorCode {
    // Success (no error)
    Success = 0,

    // General errors (1-99)
    InvalidArgument = 2,
    NullPointer = 3,
    InvalidUtf8 = 4,
    InternalError = 6,
    NotInitialized = 7,

    // Storage errors (100-199)
    DatabaseGeneral = 100,
    DatabaseMigration = 106,
    StorageQuotaExceeded = 107,

    // Record store errors (200-299)
    EntityNotFound = 201,
    ValidationFailed = 204,
    StorageCapacity = 209,

    // Remote collaborator errors (300-399)
    NetworkError = 308,
    ConfigurationError = 310,
    ExternalServiceError = 311,

    // Sync errors (400-499)
    SyncUnavailable = 401,
    SyncRemoteRejected = 402,
    SyncAlreadyRunning = 403,
}

impl fmt::Display for ErrorCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:?} ({})", self, *self as i32)
    }
}

/// Error type for FFI boundary
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FFIError {
    /// Error code for programmatic handling
    pub code: ErrorCode,

    /// Human-readable error message
    pub message: String,

    /// Optional additional details (JSON string)
    pub details: Option<String>,
}

impl fmt::Display for FFIError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if let Some(details) = &self.details {
            write!(f, "{}: {} ({})", self.code, self.message, details)
        } else {
            write!(f, "{}: {}", self.code, self.message)
        }
    }
}

impl std::error::Error for FFIError {}

impl FFIError {
    pub fn new(code: ErrorCode, message: &str) -> Self {
        Self {
            code,
            message: message.to_string(),
            details: None,
        }
    }

    pub fn with_details(code: ErrorCode, message: &str, details: serde_json::Value) -> Self {
        Self {
            code,
            message: message.to_string(),
            details: Some(details.to_string()),
        }
    }

    pub fn invalid_argument(message: &str) -> Self {
        Self::new(ErrorCode::InvalidArgument, message)
    }

    pub fn internal(message: String) -> Self {
        Self::new(ErrorCode::InternalError, &message)
    }

    pub fn not_initialized(component: &str) -> Self {
        Self::new(ErrorCode::NotInitialized, &format!("{} not initialized", component))
    }
}

impl From<DbError> for FFIError {
    fn from(err: DbError) -> Self {
        match err {
            DbError::QuotaExceeded { key } => Self::with_details(
                ErrorCode::StorageQuotaExceeded,
                &format!("Storage quota exceeded while writing '{}'", key),
                json!({ "key": key }),
            ),
            DbError::Migration(msg) => Self::new(ErrorCode::DatabaseMigration, &msg),
            other => Self::new(ErrorCode::DatabaseGeneral, &other.to_string()),
        }
    }
}

impl From<DomainError> for FFIError {
    fn from(err: DomainError) -> Self {
        match err {
            DomainError::Database(db_err) => db_err.into(),
            DomainError::Validation(val_err) => val_err.into(),
            DomainError::EntityNotFound(entity, id) => Self::with_details(
                ErrorCode::EntityNotFound,
                &format!("Entity not found: {} with ID {}", entity, id),
                json!({ "entity": entity, "id": id }),
            ),
            DomainError::StorageCapacity(msg) => Self::new(ErrorCode::StorageCapacity, &msg),
            DomainError::Internal(msg) => Self::new(ErrorCode::InternalError, &msg),
        }
    }
}

impl From<ServiceError> for FFIError {
    fn from(err: ServiceError) -> Self {
        match err {
            ServiceError::Domain(domain_err) => domain_err.into(),
            ServiceError::Network(msg) => Self::new(ErrorCode::NetworkError, &msg),
            ServiceError::Configuration(msg) => Self::new(ErrorCode::ConfigurationError, &msg),
            ServiceError::ExternalService(msg) => Self::new(ErrorCode::ExternalServiceError, &msg),
        }
    }
}

impl From<SyncError> for FFIError {
    fn from(err: SyncError) -> Self {
        match err {
            SyncError::Unavailable(msg) => Self::new(ErrorCode::SyncUnavailable, &msg),
            SyncError::RemoteRejected { table, message } => Self::with_details(
                ErrorCode::SyncRemoteRejected,
                &format!("Remote rejected changes for '{}': {}", table, message),
                json!({ "table": table }),
            ),
            SyncError::AlreadyRunning => Self::new(ErrorCode::SyncAlreadyRunning, "A sync pass is already running"),
            SyncError::LocalStore(domain_err) => domain_err.into(),
        }
    }
}

impl From<ValidationError> for FFIError {
    fn from(err: ValidationError) -> Self {
        let message = err.to_string();
        let details = match &err {
            ValidationError::Required { field } => json!({ "field": field, "type": "required" }),
            ValidationError::MaxLength { field, max } => json!({ "field": field, "type": "max_length", "max": max }),
            ValidationError::Range { field, min, max } => {
                json!({ "field": field, "type": "range", "min": min, "max": max })
            }
            ValidationError::Format { field, reason } => json!({ "field": field, "type": "format", "reason": reason }),
            ValidationError::Unique { field } => json!({ "field": field, "type": "unique" }),
            ValidationError::InvalidValue { field, reason } => {
                json!({ "field": field, "type": "invalid_value", "reason": reason })
            }
            ValidationError::Custom(msg) => json!({ "type": "custom", "message": msg }),
        };
        Self::with_details(ErrorCode::ValidationFailed, &message, details)
    }
}

impl From<std::ffi::NulError> for FFIError {
    fn from(_: std::ffi::NulError) -> Self {
        Self::new(ErrorCode::InvalidUtf8, "String contains null bytes, cannot create CString")
    }
}

// Result type alias for FFI functions
pub type FFIResult<T> = Result<T, FFIError>;

thread_local! {
    static LAST_ERROR: RefCell<Option<FFIError>> = const { RefCell::new(None) };
}

pub fn set_last_error(error: &FFIError) {
    LAST_ERROR.with(|slot| *slot.borrow_mut() = Some(error.clone()));
}

pub fn clear_last_error() {
    LAST_ERROR.with(|slot| *slot.borrow_mut() = None);
}

pub fn last_error() -> Option<FFIError> {
    LAST_ERROR.with(|slot| slot.borrow().clone())
}

/// Last error of the calling thread as an owned JSON C string, or null.
pub fn get_last_error_message() -> *mut c_char {
    let Some(error) = last_error() else {
        return std::ptr::null_mut();
    };
    serde_json::to_string(&error)
        .ok()
        .and_then(|json| CString::new(json).ok())
        .map_or(std::ptr::null_mut(), CString::into_raw)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn capacity_and_not_found_keep_their_codes() {
        let err: FFIError = DomainError::StorageCapacity("full".to_string()).into();
        assert_eq!(err.code, ErrorCode::StorageCapacity);

        let err: FFIError = DomainError::EntityNotFound("Meter".to_string(), "M9".to_string()).into();
        assert_eq!(err.code, ErrorCode::EntityNotFound);
        assert!(err.details.unwrap().contains("\"id\":\"M9\""));
    }

    #[test]
    fn validation_details_name_the_field() {
        let err: FFIError = ValidationError::unique("name").into();
        assert_eq!(err.code, ErrorCode::ValidationFailed);
        let details: serde_json::Value = serde_json::from_str(&err.details.unwrap()).unwrap();
        assert_eq!(details["type"], "unique");
        assert_eq!(details["field"], "name");
    }

    #[test]
    fn sync_errors_map_to_sync_codes() {
        let err: FFIError = SyncError::RemoteRejected {
            table: "packages".to_string(),
            message: "400".to_string(),
        }
        .into();
        assert_eq!(err.code, ErrorCode::SyncRemoteRejected);
        assert_eq!(FFIError::from(SyncError::AlreadyRunning).code as i32, 403);
    }

    #[test]
    fn storage_and_remote_errors_keep_their_codes() {
        let sqlx_err = DbError::from(sqlx::Error::RowNotFound);
        let cloned = sqlx_err.clone();
        assert!(matches!(cloned, DbError::Sqlx(_)));
        assert_eq!(FFIError::from(cloned).code, ErrorCode::DatabaseGeneral);

        let err: FFIError = DbError::QuotaExceeded { key: "fg_entries".to_string() }.into();
        assert_eq!(err.code, ErrorCode::StorageQuotaExceeded);

        assert_eq!(FFIError::from(ServiceError::Network("timeout".to_string())).code, ErrorCode::NetworkError);
        assert_eq!(
            FFIError::from(ServiceError::ExternalService("502".to_string())).code,
            ErrorCode::ExternalServiceError
        );
        let err: FFIError = SyncError::LocalStore(DomainError::Internal("x".to_string())).into();
        assert_eq!(err.code, ErrorCode::InternalError);
    }

    #[test]
    fn last_error_is_per_thread() {
        clear_last_error();
        assert!(last_error().is_none());
        set_last_error(&FFIError::invalid_argument("bad"));
        assert_eq!(last_error().map(|e| e.code), Some(ErrorCode::InvalidArgument));

        std::thread::spawn(|| assert!(last_error().is_none())).join().unwrap();
        clear_last_error();
    }
}
