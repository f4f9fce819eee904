// Record store bindings.
//
// Every function takes its arguments as one JSON payload and writes its JSON
// result through `result`. Strings written to `result` are owned by the caller
// and must be released with `gatehouse_free_string`.

use crate::domains::breakfast::BreakfastRecord;
use crate::domains::core::repository::{AddOutcome, CollectionKey, DeleteOutcome, UpdateOutcome};
use crate::domains::entry::{ProfilePatch, VehicleEntry};
use crate::domains::meter::{Meter, MeterReading};
use crate::domains::package::{PackageRecord, PickupType};
use crate::domains::patrol::PatrolRecord;
use crate::domains::settings::AppSettings;
use crate::domains::shift::{ClockEvent, WorkShift};
use crate::errors::DomainError;
use crate::ffi::error::FFIError;
use crate::ffi::{block_on_async, c_str, handle_status_result, parse_payload, write_json, FFIResult};
use crate::globals;
use crate::store::RecordStore;
use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use std::os::raw::{c_char, c_int};
use std::sync::Arc;

// ---------------------------------------------------------------------------
// Helper utilities
// ---------------------------------------------------------------------------

fn store() -> FFIResult<Arc<RecordStore>> {
    globals::get_record_store()
}

#[derive(Serialize)]
struct AddResponse<T> {
    added: bool,
    record: T,
}

impl<T> From<AddOutcome<T>> for AddResponse<T> {
    fn from(outcome: AddOutcome<T>) -> Self {
        Self {
            added: outcome.was_added(),
            record: outcome.into_record(),
        }
    }
}

#[derive(Serialize)]
struct CountResponse {
    count: usize,
}

#[derive(Deserialize)]
struct IdPayload {
    id: String,
}

fn not_found(entity: &str, id: &str) -> FFIError {
    DomainError::EntityNotFound(entity.to_string(), id.to_string()).into()
}

fn require_updated<T>(outcome: UpdateOutcome<T>, entity: &str, id: &str) -> FFIResult<T> {
    outcome.into_option().ok_or_else(|| not_found(entity, id))
}

fn require_deleted<T>(outcome: DeleteOutcome<T>, entity: &str, id: &str) -> FFIResult<T> {
    match outcome {
        DeleteOutcome::Deleted(record) => Ok(record),
        DeleteOutcome::NotFound => Err(not_found(entity, id)),
    }
}

/// `collection` is a bare name such as `entries` or its storage key.
unsafe fn collection_key(collection: *const c_char) -> FFIResult<CollectionKey> {
    let name = unsafe { c_str(collection) }?;
    name.trim().parse::<CollectionKey>().map_err(FFIError::from)
}

// ---------------------------------------------------------------------------
// Generic collection access
// ---------------------------------------------------------------------------

#[unsafe(no_mangle)]
pub unsafe extern "C" fn gatehouse_records_get_all(collection: *const c_char, result: *mut *mut c_char) -> c_int {
    handle_status_result(|| unsafe {
        ensure_ptr!(result);
        let key = collection_key(collection)?;
        let records = block_on_async(store()?.get_all_raw(key))?;
        write_json(result, &records)
    })
}

#[unsafe(no_mangle)]
pub unsafe extern "C" fn gatehouse_records_get_unsynced(collection: *const c_char, result: *mut *mut c_char) -> c_int {
    handle_status_result(|| unsafe {
        ensure_ptr!(result);
        let key = collection_key(collection)?;
        let records = block_on_async(store()?.get_unsynced_raw(key))?;
        write_json(result, &records)
    })
}

/// `ids_json` is a JSON array of ids. Result: `{ "count": n }`.
#[unsafe(no_mangle)]
pub unsafe extern "C" fn gatehouse_records_mark_synced(
    collection: *const c_char,
    ids_json: *const c_char,
    result: *mut *mut c_char,
) -> c_int {
    handle_status_result(|| unsafe {
        ensure_ptr!(result);
        let key = collection_key(collection)?;
        let ids: Vec<String> = parse_payload(ids_json)?;
        let count = block_on_async(store()?.mark_synced(key, &ids))?;
        write_json(result, &CountResponse { count })
    })
}

#[unsafe(no_mangle)]
pub unsafe extern "C" fn gatehouse_deletion_queue_get(result: *mut *mut c_char) -> c_int {
    handle_status_result(|| unsafe {
        ensure_ptr!(result);
        let queue = block_on_async(store()?.deletion_queue())?;
        write_json(result, &queue)
    })
}

// ---------------------------------------------------------------------------
// Entries
// ---------------------------------------------------------------------------

/// Payload: a vehicle entry. Result: `{ "added": bool, "record": entry }`.
#[unsafe(no_mangle)]
pub unsafe extern "C" fn gatehouse_entry_add(payload_json: *const c_char, result: *mut *mut c_char) -> c_int {
    handle_status_result(|| unsafe {
        ensure_ptr!(result);
        let entry: VehicleEntry = parse_payload(payload_json)?;
        let outcome = block_on_async(store()?.entries.add(entry))?;
        write_json(result, &AddResponse::from(outcome))
    })
}

#[unsafe(no_mangle)]
pub unsafe extern "C" fn gatehouse_entry_update(payload_json: *const c_char, result: *mut *mut c_char) -> c_int {
    handle_status_result(|| unsafe {
        ensure_ptr!(result);
        let entry: VehicleEntry = parse_payload(payload_json)?;
        let id = entry.id.clone();
        let outcome = block_on_async(store()?.entries.update(entry))?;
        write_json(result, &require_updated(outcome, "VehicleEntry", &id)?)
    })
}

/// Payload: `{ "id": "..." }`. Result: the removed entry.
#[unsafe(no_mangle)]
pub unsafe extern "C" fn gatehouse_entry_delete(payload_json: *const c_char, result: *mut *mut c_char) -> c_int {
    handle_status_result(|| unsafe {
        ensure_ptr!(result);
        let payload: IdPayload = parse_payload(payload_json)?;
        let outcome = block_on_async(store()?.entries.delete(&payload.id))?;
        write_json(result, &require_deleted(outcome, "VehicleEntry", &payload.id)?)
    })
}

/// Payload: `{ "name": "...", "plate": "..." }`. Result: `{ "count": n }`.
#[unsafe(no_mangle)]
pub unsafe extern "C" fn gatehouse_entry_delete_by_profile(payload_json: *const c_char, result: *mut *mut c_char) -> c_int {
    handle_status_result(|| unsafe {
        ensure_ptr!(result);

        #[derive(Deserialize)]
        struct Payload {
            name: String,
            #[serde(default)]
            plate: String,
        }

        let payload: Payload = parse_payload(payload_json)?;
        let count = block_on_async(store()?.entries.delete_by_profile(&payload.name, &payload.plate))?;
        write_json(result, &CountResponse { count })
    })
}

/// Payload: `{ "name": "...", "plate": "...", "patch": { ... } }`. Result: `{ "count": n }`.
#[unsafe(no_mangle)]
pub unsafe extern "C" fn gatehouse_entry_update_by_profile(payload_json: *const c_char, result: *mut *mut c_char) -> c_int {
    handle_status_result(|| unsafe {
        ensure_ptr!(result);

        #[derive(Deserialize)]
        struct Payload {
            name: String,
            #[serde(default)]
            plate: String,
            patch: ProfilePatch,
        }

        let payload: Payload = parse_payload(payload_json)?;
        let count = block_on_async(store()?.entries.update_by_profile(&payload.name, &payload.plate, &payload.patch))?;
        write_json(result, &CountResponse { count })
    })
}

#[unsafe(no_mangle)]
pub unsafe extern "C" fn gatehouse_entry_unique_profiles(result: *mut *mut c_char) -> c_int {
    handle_status_result(|| unsafe {
        ensure_ptr!(result);
        let profiles = block_on_async(store()?.entries.unique_profiles())?;
        write_json(result, &profiles)
    })
}

// ---------------------------------------------------------------------------
// Breakfast
// ---------------------------------------------------------------------------

#[unsafe(no_mangle)]
pub unsafe extern "C" fn gatehouse_breakfast_add(payload_json: *const c_char, result: *mut *mut c_char) -> c_int {
    handle_status_result(|| unsafe {
        ensure_ptr!(result);
        let record: BreakfastRecord = parse_payload(payload_json)?;
        let outcome = block_on_async(store()?.breakfast.add(record))?;
        write_json(result, &AddResponse::from(outcome))
    })
}

#[unsafe(no_mangle)]
pub unsafe extern "C" fn gatehouse_breakfast_update(payload_json: *const c_char, result: *mut *mut c_char) -> c_int {
    handle_status_result(|| unsafe {
        ensure_ptr!(result);
        let record: BreakfastRecord = parse_payload(payload_json)?;
        let id = record.id.clone();
        let outcome = block_on_async(store()?.breakfast.update(record))?;
        write_json(result, &require_updated(outcome, "BreakfastRecord", &id)?)
    })
}

#[unsafe(no_mangle)]
pub unsafe extern "C" fn gatehouse_breakfast_delete(payload_json: *const c_char, result: *mut *mut c_char) -> c_int {
    handle_status_result(|| unsafe {
        ensure_ptr!(result);
        let payload: IdPayload = parse_payload(payload_json)?;
        let outcome = block_on_async(store()?.breakfast.delete(&payload.id))?;
        write_json(result, &require_deleted(outcome, "BreakfastRecord", &payload.id)?)
    })
}

/// Payload: `{ "id": "...", "operator": "..." }`.
#[unsafe(no_mangle)]
pub unsafe extern "C" fn gatehouse_breakfast_mark_delivered(payload_json: *const c_char, result: *mut *mut c_char) -> c_int {
    handle_status_result(|| unsafe {
        ensure_ptr!(result);

        #[derive(Deserialize)]
        struct Payload {
            id: String,
            operator: String,
        }

        let payload: Payload = parse_payload(payload_json)?;
        let outcome = block_on_async(store()?.breakfast.mark_delivered(&payload.id, &payload.operator))?;
        write_json(result, &require_updated(outcome, "BreakfastRecord", &payload.id)?)
    })
}

/// Payload: `{ "date": "YYYY-MM-DD" }`. Result: `{ "count": n }`.
#[unsafe(no_mangle)]
pub unsafe extern "C" fn gatehouse_breakfast_clear_by_date(payload_json: *const c_char, result: *mut *mut c_char) -> c_int {
    handle_status_result(|| unsafe {
        ensure_ptr!(result);

        #[derive(Deserialize)]
        struct Payload {
            date: NaiveDate,
        }

        let payload: Payload = parse_payload(payload_json)?;
        let count = block_on_async(store()?.breakfast.clear_by_date(payload.date))?;
        write_json(result, &CountResponse { count })
    })
}

// ---------------------------------------------------------------------------
// Packages
// ---------------------------------------------------------------------------

#[unsafe(no_mangle)]
pub unsafe extern "C" fn gatehouse_package_add(payload_json: *const c_char, result: *mut *mut c_char) -> c_int {
    handle_status_result(|| unsafe {
        ensure_ptr!(result);
        let package: PackageRecord = parse_payload(payload_json)?;
        let outcome = block_on_async(store()?.packages.add(package))?;
        write_json(result, &AddResponse::from(outcome))
    })
}

#[unsafe(no_mangle)]
pub unsafe extern "C" fn gatehouse_package_update(payload_json: *const c_char, result: *mut *mut c_char) -> c_int {
    handle_status_result(|| unsafe {
        ensure_ptr!(result);
        let package: PackageRecord = parse_payload(payload_json)?;
        let id = package.id.clone();
        let outcome = block_on_async(store()?.packages.update(package))?;
        write_json(result, &require_updated(outcome, "PackageRecord", &id)?)
    })
}

#[unsafe(no_mangle)]
pub unsafe extern "C" fn gatehouse_package_delete(payload_json: *const c_char, result: *mut *mut c_char) -> c_int {
    handle_status_result(|| unsafe {
        ensure_ptr!(result);
        let payload: IdPayload = parse_payload(payload_json)?;
        let outcome = block_on_async(store()?.packages.delete(&payload.id))?;
        write_json(result, &require_deleted(outcome, "PackageRecord", &payload.id)?)
    })
}

/// Payload: `{ "id": "...", "delivered_to": "...", "pickup_type": "Próprio" | "Terceiro" }`.
#[unsafe(no_mangle)]
pub unsafe extern "C" fn gatehouse_package_mark_delivered(payload_json: *const c_char, result: *mut *mut c_char) -> c_int {
    handle_status_result(|| unsafe {
        ensure_ptr!(result);

        #[derive(Deserialize)]
        struct Payload {
            id: String,
            delivered_to: String,
            pickup_type: PickupType,
        }

        let payload: Payload = parse_payload(payload_json)?;
        let outcome = block_on_async(store()?.packages.mark_delivered(
            &payload.id,
            &payload.delivered_to,
            payload.pickup_type,
        ))?;
        write_json(result, &require_updated(outcome, "PackageRecord", &payload.id)?)
    })
}

// ---------------------------------------------------------------------------
// Meters and readings
// ---------------------------------------------------------------------------

#[unsafe(no_mangle)]
pub unsafe extern "C" fn gatehouse_meter_add(payload_json: *const c_char, result: *mut *mut c_char) -> c_int {
    handle_status_result(|| unsafe {
        ensure_ptr!(result);
        let meter: Meter = parse_payload(payload_json)?;
        let stored = block_on_async(store()?.meters.add_meter(meter))?;
        write_json(result, &stored)
    })
}

#[unsafe(no_mangle)]
pub unsafe extern "C" fn gatehouse_meter_update(payload_json: *const c_char, result: *mut *mut c_char) -> c_int {
    handle_status_result(|| unsafe {
        ensure_ptr!(result);
        let meter: Meter = parse_payload(payload_json)?;
        let id = meter.id.clone();
        let outcome = block_on_async(store()?.meters.update_meter(meter))?;
        write_json(result, &require_updated(outcome, "Meter", &id)?)
    })
}

#[unsafe(no_mangle)]
pub unsafe extern "C" fn gatehouse_meter_delete(payload_json: *const c_char, result: *mut *mut c_char) -> c_int {
    handle_status_result(|| unsafe {
        ensure_ptr!(result);
        let payload: IdPayload = parse_payload(payload_json)?;
        let outcome = block_on_async(store()?.meters.delete_meter(&payload.id))?;
        write_json(result, &require_deleted(outcome, "Meter", &payload.id)?)
    })
}

/// Payload: a reading. Result: the stored reading with its derived consumption.
#[unsafe(no_mangle)]
pub unsafe extern "C" fn gatehouse_meter_add_reading(payload_json: *const c_char, result: *mut *mut c_char) -> c_int {
    handle_status_result(|| unsafe {
        ensure_ptr!(result);
        let reading: MeterReading = parse_payload(payload_json)?;
        let stored = block_on_async(store()?.meters.add_reading(reading))?;
        write_json(result, &stored)
    })
}

/// Payload: `{ "meter_id": "..." }`. Result: readings, newest first.
#[unsafe(no_mangle)]
pub unsafe extern "C" fn gatehouse_meter_readings_by_meter(payload_json: *const c_char, result: *mut *mut c_char) -> c_int {
    handle_status_result(|| unsafe {
        ensure_ptr!(result);

        #[derive(Deserialize)]
        struct Payload {
            meter_id: String,
        }

        let payload: Payload = parse_payload(payload_json)?;
        let readings = block_on_async(store()?.meters.readings_by_meter(&payload.meter_id))?;
        write_json(result, &readings)
    })
}

#[unsafe(no_mangle)]
pub unsafe extern "C" fn gatehouse_meter_delete_reading(payload_json: *const c_char, result: *mut *mut c_char) -> c_int {
    handle_status_result(|| unsafe {
        ensure_ptr!(result);
        let payload: IdPayload = parse_payload(payload_json)?;
        let outcome = block_on_async(store()?.meters.delete_reading(&payload.id))?;
        write_json(result, &require_deleted(outcome, "MeterReading", &payload.id)?)
    })
}

// ---------------------------------------------------------------------------
// Patrols
// ---------------------------------------------------------------------------

#[unsafe(no_mangle)]
pub unsafe extern "C" fn gatehouse_patrol_start(payload_json: *const c_char, result: *mut *mut c_char) -> c_int {
    handle_status_result(|| unsafe {
        ensure_ptr!(result);
        let patrol: PatrolRecord = parse_payload(payload_json)?;
        let outcome = block_on_async(store()?.patrols.start(patrol))?;
        write_json(result, &AddResponse::from(outcome))
    })
}

#[unsafe(no_mangle)]
pub unsafe extern "C" fn gatehouse_patrol_update(payload_json: *const c_char, result: *mut *mut c_char) -> c_int {
    handle_status_result(|| unsafe {
        ensure_ptr!(result);
        let patrol: PatrolRecord = parse_payload(payload_json)?;
        let id = patrol.id.clone();
        let outcome = block_on_async(store()?.patrols.update(patrol))?;
        write_json(result, &require_updated(outcome, "PatrolRecord", &id)?)
    })
}

/// Payload: `{ "id": "...", "notes": "..." | null }`.
#[unsafe(no_mangle)]
pub unsafe extern "C" fn gatehouse_patrol_finish(payload_json: *const c_char, result: *mut *mut c_char) -> c_int {
    handle_status_result(|| unsafe {
        ensure_ptr!(result);

        #[derive(Deserialize)]
        struct Payload {
            id: String,
            #[serde(default)]
            notes: Option<String>,
        }

        let payload: Payload = parse_payload(payload_json)?;
        let outcome = block_on_async(store()?.patrols.finish(&payload.id, payload.notes))?;
        write_json(result, &require_updated(outcome, "PatrolRecord", &payload.id)?)
    })
}

#[unsafe(no_mangle)]
pub unsafe extern "C" fn gatehouse_patrol_delete(payload_json: *const c_char, result: *mut *mut c_char) -> c_int {
    handle_status_result(|| unsafe {
        ensure_ptr!(result);
        let payload: IdPayload = parse_payload(payload_json)?;
        let outcome = block_on_async(store()?.patrols.delete(&payload.id))?;
        write_json(result, &require_deleted(outcome, "PatrolRecord", &payload.id)?)
    })
}

// ---------------------------------------------------------------------------
// Work shifts
// ---------------------------------------------------------------------------

#[unsafe(no_mangle)]
pub unsafe extern "C" fn gatehouse_shift_upsert(payload_json: *const c_char, result: *mut *mut c_char) -> c_int {
    handle_status_result(|| unsafe {
        ensure_ptr!(result);
        let shift: WorkShift = parse_payload(payload_json)?;
        let stored = block_on_async(store()?.shifts.upsert_shift(shift))?;
        write_json(result, &stored)
    })
}

/// Payload: `{ "operator": "...", "event": "clockIn" | "lunchStart" | "lunchEnd" | "clockOut" }`.
#[unsafe(no_mangle)]
pub unsafe extern "C" fn gatehouse_shift_clock_event(payload_json: *const c_char, result: *mut *mut c_char) -> c_int {
    handle_status_result(|| unsafe {
        ensure_ptr!(result);

        #[derive(Deserialize)]
        struct Payload {
            operator: String,
            event: ClockEvent,
        }

        let payload: Payload = parse_payload(payload_json)?;
        let shift = block_on_async(store()?.shifts.record_clock_event(&payload.operator, payload.event))?;
        write_json(result, &shift)
    })
}

// ---------------------------------------------------------------------------
// Settings, session, draft and logs
// ---------------------------------------------------------------------------

#[unsafe(no_mangle)]
pub unsafe extern "C" fn gatehouse_settings_get(result: *mut *mut c_char) -> c_int {
    handle_status_result(|| unsafe {
        ensure_ptr!(result);
        let settings = block_on_async(store()?.settings.get())?;
        write_json(result, &settings)
    })
}

#[unsafe(no_mangle)]
pub unsafe extern "C" fn gatehouse_settings_save(payload_json: *const c_char, result: *mut *mut c_char) -> c_int {
    handle_status_result(|| unsafe {
        ensure_ptr!(result);
        let settings: AppSettings = parse_payload(payload_json)?;
        let stored = block_on_async(store()?.settings.save(settings))?;
        write_json(result, &stored)
    })
}

/// Payload: `{ "operator_name": "..." }`. Operator login also tries to start auto-sync.
#[unsafe(no_mangle)]
pub unsafe extern "C" fn gatehouse_session_start(payload_json: *const c_char, result: *mut *mut c_char) -> c_int {
    handle_status_result(|| unsafe {
        ensure_ptr!(result);

        #[derive(Deserialize)]
        struct Payload {
            operator_name: String,
        }

        let payload: Payload = parse_payload(payload_json)?;
        let session = block_on_async(store()?.session.start_session(&payload.operator_name))?;
        if let Err(e) = block_on_async(globals::ensure_auto_sync()) {
            log::warn!("Auto-sync not started after login: {}", e);
        }
        write_json(result, &session)
    })
}

/// Result: the closed session, or null when nobody was logged in.
#[unsafe(no_mangle)]
pub unsafe extern "C" fn gatehouse_session_end(result: *mut *mut c_char) -> c_int {
    handle_status_result(|| unsafe {
        ensure_ptr!(result);
        let session = block_on_async(store()?.session.end_session())?;
        write_json(result, &session)
    })
}

#[unsafe(no_mangle)]
pub unsafe extern "C" fn gatehouse_session_current(result: *mut *mut c_char) -> c_int {
    handle_status_result(|| unsafe {
        ensure_ptr!(result);
        let session = block_on_async(store()?.session.current())?;
        write_json(result, &session)
    })
}

/// Payload: `{ "form_data": { ... }, "step": n }`.
#[unsafe(no_mangle)]
pub unsafe extern "C" fn gatehouse_draft_save(payload_json: *const c_char) -> c_int {
    handle_status_result(|| unsafe {
        #[derive(Deserialize)]
        struct Payload {
            form_data: serde_json::Value,
            #[serde(default)]
            step: u32,
        }

        let payload: Payload = parse_payload(payload_json)?;
        block_on_async(store()?.session.save_draft(payload.form_data, payload.step))
    })
}

#[unsafe(no_mangle)]
pub unsafe extern "C" fn gatehouse_draft_get(result: *mut *mut c_char) -> c_int {
    handle_status_result(|| unsafe {
        ensure_ptr!(result);
        let draft = block_on_async(store()?.session.get_draft())?;
        write_json(result, &draft)
    })
}

#[unsafe(no_mangle)]
pub extern "C" fn gatehouse_draft_clear() -> c_int {
    handle_status_result(|| block_on_async(store()?.session.clear_draft()))
}

/// Payload: `{ "limit": n }` or null for the default of 50. Result: newest first.
#[unsafe(no_mangle)]
pub unsafe extern "C" fn gatehouse_logs_recent(payload_json: *const c_char, result: *mut *mut c_char) -> c_int {
    handle_status_result(|| unsafe {
        ensure_ptr!(result);

        #[derive(Deserialize)]
        struct Payload {
            #[serde(default = "default_limit")]
            limit: usize,
        }
        fn default_limit() -> usize {
            50
        }

        let limit = if payload_json.is_null() {
            default_limit()
        } else {
            parse_payload::<Payload>(payload_json)?.limit
        };
        let logs = block_on_async(store()?.audit.recent(limit))?;
        write_json(result, &logs)
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domains::entry::types::sample_entry;

    #[test]
    fn outcomes_map_to_responses() {
        let response = AddResponse::from(AddOutcome::AlreadyExists(1));
        assert!(!response.added);
        assert_eq!(response.record, 1);

        let err = require_updated::<i32>(UpdateOutcome::NotFound, "Meter", "M1").unwrap_err();
        assert_eq!(err.code, crate::ffi::error::ErrorCode::EntityNotFound);
        assert_eq!(require_deleted(DeleteOutcome::Deleted(7), "Meter", "M1").unwrap(), 7);
    }

    #[test]
    fn add_response_serializes_the_record() {
        let response = AddResponse::from(AddOutcome::Added(sample_entry("A1", "João", "ABC-1234")));
        let json = serde_json::to_value(&response).unwrap();
        assert_eq!(json["added"], true);
        assert_eq!(json["record"]["driverName"], "João");
    }

    #[test]
    fn unknown_collection_names_are_rejected() {
        let name = std::ffi::CString::new("settings").unwrap();
        let err = unsafe { collection_key(name.as_ptr()) }.unwrap_err();
        assert_eq!(err.code, crate::ffi::error::ErrorCode::ValidationFailed);
    }
}
