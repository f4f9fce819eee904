use crate::ffi::error::{clear_last_error, set_last_error, ErrorCode, FFIError};
use once_cell::sync::Lazy;
use serde::de::DeserializeOwned;
use serde::Serialize;
use std::ffi::{CStr, CString};
use std::os::raw::{c_char, c_int};
use std::panic::{catch_unwind, AssertUnwindSafe};
use tokio::runtime::{Builder, Runtime};

/// Return `InvalidArgument` from the enclosing closure when a pointer is null.
macro_rules! ensure_ptr {
    ($($ptr:expr),+ $(,)?) => {
        $(
            if $ptr.is_null() {
                return Err($crate::ffi::error::FFIError::new(
                    $crate::ffi::error::ErrorCode::NullPointer,
                    concat!("null pointer: ", stringify!($ptr)),
                ));
            }
        )+
    };
}

pub mod backup;
pub mod core;
pub mod error;
pub mod records;
pub mod sync;

pub use error::FFIResult;

/// Shared runtime for every blocking entry point.
static RUNTIME: Lazy<Option<Runtime>> = Lazy::new(|| {
    Builder::new_multi_thread()
        .enable_all()
        .thread_name("gatehouse-core")
        .build()
        .map_err(|e| log::error!("Failed to build tokio runtime: {}", e))
        .ok()
});

/// Run an async future to completion on the shared runtime.
pub fn block_on_async<F, T, E>(future: F) -> FFIResult<T>
where
    F: std::future::Future<Output = Result<T, E>>,
    E: Into<FFIError>,
{
    let runtime = RUNTIME
        .as_ref()
        .ok_or_else(|| FFIError::internal("Tokio runtime unavailable".to_string()))?;
    runtime.block_on(future).map_err(Into::into)
}

/// Error handling helper for FFI boundaries (returns error code)
pub fn handle_status_result<F>(func: F) -> c_int
where
    F: FnOnce() -> FFIResult<()>,
{
    let outcome = match catch_unwind(AssertUnwindSafe(func)) {
        Ok(result) => result,
        Err(panic_payload) => {
            let panic_msg = if let Some(s) = panic_payload.downcast_ref::<String>() {
                s.clone()
            } else if let Some(s) = panic_payload.downcast_ref::<&str>() {
                s.to_string()
            } else {
                "Panicked during FFI call, but panic message is not a string".to_string()
            };
            Err(FFIError::internal(format!("Panic across FFI boundary: {}", panic_msg)))
        }
    };

    match outcome {
        Ok(()) => {
            clear_last_error();
            ErrorCode::Success as c_int
        }
        Err(e) => {
            log::error!("FFI call failed: {}", e);
            set_last_error(&e);
            e.code as c_int
        }
    }
}

/// Borrow a C string as UTF-8.
///
/// # Safety
/// `ptr` must be null or point to a NUL-terminated string that outlives the borrow.
pub unsafe fn c_str<'a>(ptr: *const c_char) -> FFIResult<&'a str> {
    ensure_ptr!(ptr);
    unsafe { CStr::from_ptr(ptr) }
        .to_str()
        .map_err(|_| FFIError::new(ErrorCode::InvalidUtf8, "Invalid UTF-8 in argument"))
}

/// Decode a JSON payload argument.
///
/// # Safety
/// Same contract as [`c_str`].
pub unsafe fn parse_payload<T: DeserializeOwned>(ptr: *const c_char) -> FFIResult<T> {
    let json = unsafe { c_str(ptr) }?;
    serde_json::from_str(json).map_err(|e| FFIError::invalid_argument(&format!("json parse: {e}")))
}

/// Serialize `value` and hand ownership of the string to the caller through `result`.
///
/// # Safety
/// `result` must be null or valid for a single pointer write.
pub unsafe fn write_json<T: Serialize>(result: *mut *mut c_char, value: &T) -> FFIResult<()> {
    ensure_ptr!(result);
    let json = serde_json::to_string(value).map_err(|e| FFIError::internal(format!("ser {e}")))?;
    let c_string = CString::new(json)?;
    unsafe { *result = c_string.into_raw() };
    Ok(())
}
