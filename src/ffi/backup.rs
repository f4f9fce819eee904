// Backup, restore and import bindings.

use crate::domains::entry::ImportOrigin;
use crate::domains::import::{master_data_json, parse_import_file};
use crate::ffi::error::FFIError;
use crate::ffi::{block_on_async, c_str, handle_status_result, write_json, FFIResult};
use crate::globals;
use serde::Serialize;
use std::ffi::CString;
use std::os::raw::{c_char, c_int};

unsafe fn write_text(result: *mut *mut c_char, text: String) -> FFIResult<()> {
    ensure_ptr!(result);
    let c_string = CString::new(text)?;
    unsafe { *result = c_string.into_raw() };
    Ok(())
}

/// `origin` is `"LOCAL"` or `"ARQUIVO"`; null means `"ARQUIVO"`.
unsafe fn parse_origin(origin: *const c_char) -> FFIResult<ImportOrigin> {
    if origin.is_null() {
        return Ok(ImportOrigin::File);
    }
    let raw = unsafe { c_str(origin) }?;
    serde_json::from_value(serde_json::Value::String(raw.trim().to_string()))
        .map_err(|_| FFIError::invalid_argument(&format!("unknown import origin '{}'", raw)))
}

/// Result: the backup document as JSON text.
#[unsafe(no_mangle)]
pub unsafe extern "C" fn gatehouse_backup_export(result: *mut *mut c_char) -> c_int {
    handle_status_result(|| unsafe {
        ensure_ptr!(result);
        let store = globals::get_record_store()?;
        let text = block_on_async(store.backup.export())?;
        write_text(result, text)
    })
}

/// Replace local data with a backup. Nothing is written unless `confirmed` is true.
/// Result: `{ "exported_by": "...", "restored": { collection: count } }`.
#[unsafe(no_mangle)]
pub unsafe extern "C" fn gatehouse_backup_restore(
    backup_json: *const c_char,
    confirmed: bool,
    result: *mut *mut c_char,
) -> c_int {
    handle_status_result(|| unsafe {
        ensure_ptr!(result);
        let text = c_str(backup_json)?;
        let store = globals::get_record_store()?;
        let summary = block_on_async(store.backup.restore(text, confirmed))?;
        write_json(result, &summary)
    })
}

/// Merge vehicle entries from an import file (a list or `{ "entries": [...] }`).
/// Result: `{ "count": n }`, the number of entries added.
#[unsafe(no_mangle)]
pub unsafe extern "C" fn gatehouse_import_merge_entries(
    entries_json: *const c_char,
    origin: *const c_char,
    result: *mut *mut c_char,
) -> c_int {
    handle_status_result(|| unsafe {
        ensure_ptr!(result);

        #[derive(Serialize)]
        struct Response {
            count: usize,
        }

        let candidates = parse_import_file(c_str(entries_json)?)?;
        let origin = parse_origin(origin)?;
        let store = globals::get_record_store()?;
        let count = block_on_async(store.import.merge_entries(candidates, origin))?;
        write_json(result, &Response { count })
    })
}

/// Result: every local entry as a master data file.
#[unsafe(no_mangle)]
pub unsafe extern "C" fn gatehouse_import_export_master_data(result: *mut *mut c_char) -> c_int {
    handle_status_result(|| unsafe {
        ensure_ptr!(result);
        let store = globals::get_record_store()?;
        let entries = block_on_async(store.entries.get_all())?;
        write_text(result, master_data_json(entries)?)
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn origin_defaults_to_file_and_rejects_unknown_values() {
        assert_eq!(unsafe { parse_origin(std::ptr::null()) }.unwrap(), ImportOrigin::File);

        let local = CString::new("LOCAL").unwrap();
        assert_eq!(unsafe { parse_origin(local.as_ptr()) }.unwrap(), ImportOrigin::Local);

        let bogus = CString::new("REMOTE").unwrap();
        assert!(unsafe { parse_origin(bogus.as_ptr()) }.is_err());
    }
}
