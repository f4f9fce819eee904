// Synchronizer bindings.

use crate::domains::sync::{StatusCallback, SyncOutcome, SyncStats, SyncStatus};
use crate::errors::SyncError;
use crate::ffi::error::FFIError;
use crate::ffi::{handle_status_result, write_json, FFIResult};
use crate::globals;
use std::ffi::CString;
use std::os::raw::{c_char, c_int};
use std::sync::Arc;

/// Host callback receiving `"syncing"`, `"success"` or `"error"`. The string is only valid during the call.
pub type SyncStatusCallback = extern "C" fn(status: *const c_char);

fn status_name(status: SyncStatus) -> &'static str {
    match status {
        SyncStatus::Idle => "idle",
        SyncStatus::Syncing => "syncing",
        SyncStatus::Success => "success",
        SyncStatus::Error => "error",
    }
}

fn run_sync(on_status: Option<SyncStatusCallback>) -> FFIResult<SyncOutcome> {
    let Some(service) = globals::get_sync_service()? else {
        return Ok(SyncOutcome::failed(
            SyncError::Unavailable("remote backend is not configured".to_string()),
            SyncStats::default(),
        ));
    };

    let callback: Option<StatusCallback> = on_status.map(|host| {
        Arc::new(move |status: SyncStatus| {
            if let Ok(name) = CString::new(status_name(status)) {
                host(name.as_ptr());
            }
        }) as StatusCallback
    });

    crate::ffi::block_on_async(async move { Ok::<_, FFIError>(service.sync_all(callback).await) })
}

/// Run one sync pass now.
///
/// `on_status` may be null. The result is always a `SyncOutcome` JSON; a failed
/// pass is reported in it rather than through the return code.
#[unsafe(no_mangle)]
pub unsafe extern "C" fn gatehouse_sync_trigger(on_status: Option<SyncStatusCallback>, result: *mut *mut c_char) -> c_int {
    handle_status_result(|| unsafe {
        ensure_ptr!(result);
        let outcome = run_sync(on_status)?;
        write_json(result, &outcome)
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn status_names_match_the_wire_values() {
        for status in [SyncStatus::Idle, SyncStatus::Syncing, SyncStatus::Success, SyncStatus::Error] {
            let wire = serde_json::to_value(status).unwrap();
            assert_eq!(wire, status_name(status));
        }
    }
}
