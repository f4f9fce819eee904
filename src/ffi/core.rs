// Library lifecycle, connectivity and memory management.

use crate::config::CoreConfig;
use crate::ffi::{block_on_async, c_str, handle_status_result, parse_payload, write_json};
use crate::globals;
use serde::{Deserialize, Serialize};
use std::ffi::CString;
use std::os::raw::{c_char, c_int};

/// Initialize the library.
///
/// `config_json` may be null or an object with any of the `CoreConfig` fields
/// (`database_url`, `device_name`, `api_url`, `api_key`, `access_token`,
/// `storage_capacity`, `sync_interval_secs`, `identity_timeout_ms`).
/// Returns 0 on success, non-zero on error.
#[unsafe(no_mangle)]
pub unsafe extern "C" fn gatehouse_initialize(config_json: *const c_char) -> c_int {
    handle_status_result(|| unsafe {
        let config = if config_json.is_null() {
            CoreConfig::from_env()
        } else {
            CoreConfig::from_json(c_str(config_json)?)?
        };
        block_on_async(globals::initialize(config))
    })
}

/// Report the host's reachability. Going online triggers a pass when auto-sync runs.
#[unsafe(no_mangle)]
pub extern "C" fn gatehouse_set_online(online: bool) -> c_int {
    handle_status_result(|| globals::set_online(online))
}

/// Replace the remote session token.
///
/// Expected JSON payload: `{ "access_token": "..." }`, with null signing out.
/// Result: `{ "auto_sync": bool }`.
#[unsafe(no_mangle)]
pub unsafe extern "C" fn gatehouse_set_access_token(payload_json: *const c_char, result: *mut *mut c_char) -> c_int {
    handle_status_result(|| unsafe {
        ensure_ptr!(result);

        #[derive(Deserialize)]
        struct Payload {
            access_token: Option<String>,
        }
        #[derive(Serialize)]
        struct Response {
            auto_sync: bool,
        }

        let payload: Payload = parse_payload(payload_json)?;
        let auto_sync = block_on_async(globals::set_access_token(payload.access_token))?;
        write_json(result, &Response { auto_sync })
    })
}

/// Frees a C string that was allocated by Rust and passed over FFI.
#[unsafe(no_mangle)]
pub unsafe extern "C" fn gatehouse_free_string(ptr: *mut c_char) {
    if !ptr.is_null() {
        // Takes ownership back and drops it.
        let _ = unsafe { CString::from_raw(ptr) };
    }
}

/// Last error of the calling thread as JSON, or null.
/// Returns allocated string that must be freed with gatehouse_free_string()
#[unsafe(no_mangle)]
pub extern "C" fn gatehouse_last_error() -> *mut c_char {
    crate::ffi::error::get_last_error_message()
}

/// Returns allocated string that must be freed with gatehouse_free_string()
#[unsafe(no_mangle)]
pub extern "C" fn gatehouse_library_version() -> *mut c_char {
    CString::new(env!("CARGO_PKG_VERSION")).map_or(std::ptr::null_mut(), CString::into_raw)
}
