use crate::domains::audit::AppLog;
use crate::domains::breakfast::BreakfastRecord;
use crate::domains::entry::VehicleEntry;
use crate::domains::meter::{Meter, MeterReading};
use crate::domains::package::PackageRecord;
use crate::domains::patrol::PatrolRecord;
use crate::domains::settings::AppSettings;
use chrono::{DateTime, Utc};
use serde_json::{json, Value};

/// Conversion of a local record into a row of its remote table.
///
/// Photos are never part of the row.
pub trait ToRemoteRow {
    fn to_remote_row(&self, user_id: &str) -> Value;
}

impl ToRemoteRow for VehicleEntry {
    fn to_remote_row(&self, user_id: &str) -> Value {
        json!({
            "id": self.id,
            "user_id": user_id,
            "access_type": self.access_type,
            "driver_name": self.driver_name,
            "company": self.company,
            "supplier": self.supplier,
            "operation_type": self.operation_type,
            "order_number": self.order_number,
            "vehicle_plate": self.vehicle_plate,
            "trailer_plate": self.trailer_plate,
            "is_truck": self.is_truck,
            "document_number": self.document_number,
            "visit_reason": self.visit_reason,
            "visited_person": self.visited_person,
            "status": self.status,
            "rejection_reason": self.rejection_reason,
            "entry_time": self.entry_time,
            "exit_time": self.exit_time,
            "volumes": self.volumes,
            "sector": self.sector,
            "observations": self.observations,
            "exit_observations": self.exit_observations,
            "created_at": self.meta.created_at.or(self.registered_at),
            "updated_at": self.meta.updated_at,
            "operator_name": self.operator_name,
            "device_name": self.device_name,
            "authorized_by": self.authorized_by,
            "origin": self.origin,
        })
    }
}

impl ToRemoteRow for BreakfastRecord {
    fn to_remote_row(&self, user_id: &str) -> Value {
        json!({
            "id": self.id,
            "user_id": user_id,
            "person_name": self.person_name,
            "breakfast_type": self.breakfast_type,
            "status": self.status,
            "delivered_at": self.delivered_at,
            "operator_name": self.operator_name,
            "date": self.date,
            "observations": self.observations,
            "origin": self.origin,
            "created_at": self.meta.created_at,
            "updated_at": self.meta.updated_at,
        })
    }
}

impl ToRemoteRow for PackageRecord {
    fn to_remote_row(&self, user_id: &str) -> Value {
        json!({
            "id": self.id,
            "user_id": user_id,
            "delivery_company": self.delivery_company,
            "recipient_name": self.recipient_name,
            "description": self.description,
            "operator_name": self.operator_name,
            "received_at": self.received_at,
            "status": self.status,
            "delivered_at": self.delivered_at,
            "delivered_to": self.delivered_to,
            "pickup_type": self.pickup_type,
            "created_at": self.meta.created_at,
            "updated_at": self.meta.updated_at,
        })
    }
}

impl ToRemoteRow for Meter {
    fn to_remote_row(&self, user_id: &str) -> Value {
        json!({
            "id": self.id,
            "user_id": user_id,
            "name": self.name,
            "type": self.meter_type,
            "unit": self.unit,
            "custom_unit": self.custom_unit,
            "active": self.active,
            "created_at": self.meta.created_at.or(self.registered_at),
            "updated_at": self.meta.updated_at,
        })
    }
}

impl ToRemoteRow for MeterReading {
    fn to_remote_row(&self, user_id: &str) -> Value {
        json!({
            "id": self.id,
            "user_id": user_id,
            "meter_id": self.meter_id,
            "value": self.value,
            "consumption": self.consumption,
            "observation": self.observation,
            "operator": self.operator,
            "timestamp": self.timestamp,
            "created_at": self.meta.created_at,
            "updated_at": self.meta.updated_at,
        })
    }
}

impl ToRemoteRow for PatrolRecord {
    fn to_remote_row(&self, user_id: &str) -> Value {
        json!({
            "id": self.id,
            "user_id": user_id,
            "data": self.date,
            "hora_inicio": self.started_at,
            "hora_fim": self.finished_at,
            "duracao_minutos": self.duration_minutes,
            "porteiro": self.guard_name,
            "status": self.status,
            "observacoes": self.notes,
            "criado_em": self.registered_at.or(self.meta.created_at),
            "created_at": self.meta.created_at,
            "updated_at": self.meta.updated_at,
        })
    }
}

impl ToRemoteRow for AppLog {
    fn to_remote_row(&self, user_id: &str) -> Value {
        json!({
            "id": self.id,
            "user_id": user_id,
            "timestamp": self.timestamp,
            "user_name": self.user,
            "module": self.module,
            "action": self.action,
            "reference_id": self.reference_id,
            "details": self.details,
            "created_at": self.meta.created_at,
        })
    }
}

/// Settings row, one per remote account.
pub fn settings_row(settings: &AppSettings, user_id: &str, now: DateTime<Utc>) -> Value {
    json!({
        "user_id": user_id,
        "company_name": settings.company_name,
        "device_name": settings.device_name,
        "theme": settings.theme,
        "font_size": settings.font_size,
        "sector_contacts": settings.sector_contacts,
        "updated_at": now,
    })
}
