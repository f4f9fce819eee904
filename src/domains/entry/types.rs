use crate::domains::core::repository::SyncMeta;
use crate::errors::DomainResult;
use crate::validation::{NestedValidator, Validate, ValidationBuilder};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum AccessType {
    #[serde(rename = "Caminhão")]
    Truck,
    #[serde(rename = "Carro")]
    Car,
    #[serde(rename = "Moto")]
    Motorcycle,
    #[serde(rename = "Visitante a pé")]
    Pedestrian,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum EntryStatus {
    #[serde(rename = "Pendente")]
    Pending,
    #[serde(rename = "Autorizado")]
    Authorized,
    #[serde(rename = "Recusado")]
    Rejected,
    #[serde(rename = "Finalizado")]
    Finalized,
}

impl EntryStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            EntryStatus::Pending => "Pendente",
            EntryStatus::Authorized => "Autorizado",
            EntryStatus::Rejected => "Recusado",
            EntryStatus::Finalized => "Finalizado",
        }
    }
}

impl fmt::Display for EntryStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum OperationType {
    #[serde(rename = "Entrega")]
    Delivery,
    #[serde(rename = "Coleta")]
    Pickup,
    #[serde(rename = "Serviço")]
    Service,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum DestinationSector {
    #[serde(rename = "Logística")]
    Logistics,
    #[serde(rename = "Almoxarifado")]
    Warehouse,
    #[serde(rename = "Manutenção")]
    Maintenance,
    #[serde(rename = "Outro")]
    Other,
}

/// Where a vehicle entry came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum ImportOrigin {
    #[default]
    #[serde(rename = "LOCAL")]
    Local,
    #[serde(rename = "ARQUIVO")]
    File,
}

impl ImportOrigin {
    pub fn as_str(&self) -> &'static str {
        match self {
            ImportOrigin::Local => "LOCAL",
            ImportOrigin::File => "ARQUIVO",
        }
    }
}

/// One visit or delivery through the gate.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct VehicleEntry {
    #[serde(default)]
    pub id: String,
    pub access_type: AccessType,
    pub driver_name: String,
    #[serde(default)]
    pub company: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub supplier: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub operation_type: Option<OperationType>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub order_number: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub vehicle_plate: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub trailer_plate: Option<String>,
    #[serde(default)]
    pub is_truck: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub document_number: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub visit_reason: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub visited_person: Option<String>,
    pub status: EntryStatus,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub rejection_reason: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub entry_time: Option<DateTime<Utc>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub exit_time: Option<DateTime<Utc>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub volumes: Option<u32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub sector: Option<DestinationSector>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub observations: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub exit_observations: Option<String>,
    /// Registration time shown to the operator. Older records only carry this.
    #[serde(rename = "createdAt", default, skip_serializing_if = "Option::is_none")]
    pub registered_at: Option<DateTime<Utc>>,
    #[serde(default)]
    pub operator_name: String,
    #[serde(default)]
    pub device_name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub last_sync_at: Option<DateTime<Utc>>,
    #[serde(default)]
    pub origin: ImportOrigin,
    /// Contact who authorized or refused the entry.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub authorized_by: Option<String>,
    #[serde(flatten)]
    pub meta: SyncMeta,
}

crate::impl_syncable!(VehicleEntry);

impl VehicleEntry {
    /// Lower-cased (driver name, plate) pair identifying a recurring visitor.
    pub fn profile_key(&self) -> (String, String) {
        (
            self.driver_name.trim().to_lowercase(),
            self.vehicle_plate.as_deref().unwrap_or("").trim().to_lowercase(),
        )
    }

    pub fn matches_profile(&self, name: &str, plate: &str) -> bool {
        let (own_name, own_plate) = self.profile_key();
        own_name == name.trim().to_lowercase() && own_plate == plate.trim().to_lowercase()
    }
}

impl Validate for VehicleEntry {
    fn validate(&self) -> DomainResult<()> {
        let mut nested = NestedValidator::new();
        nested.check(
            ValidationBuilder::new("driverName", Some(self.driver_name.clone()))
                .required()
                .max_length(120)
                .validate(),
        );
        if self.access_type != AccessType::Pedestrian {
            nested.check(
                ValidationBuilder::new("vehiclePlate", self.vehicle_plate.clone())
                    .required()
                    .validate(),
            );
        }
        nested.validate()
    }
}

/// Fields that `update_by_profile` may overwrite on every matching entry.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProfilePatch {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub driver_name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub company: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub supplier: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub vehicle_plate: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub trailer_plate: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub document_number: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub access_type: Option<AccessType>,
}

impl ProfilePatch {
    pub fn is_empty(&self) -> bool {
        *self == ProfilePatch::default()
    }

    pub fn apply(&self, entry: &mut VehicleEntry) {
        if let Some(name) = &self.driver_name {
            entry.driver_name = name.clone();
        }
        if let Some(company) = &self.company {
            entry.company = company.clone();
        }
        if let Some(supplier) = &self.supplier {
            entry.supplier = Some(supplier.clone());
        }
        if let Some(plate) = &self.vehicle_plate {
            entry.vehicle_plate = Some(plate.clone());
        }
        if let Some(trailer) = &self.trailer_plate {
            entry.trailer_plate = Some(trailer.clone());
        }
        if let Some(document) = &self.document_number {
            entry.document_number = Some(document.clone());
        }
        if let Some(access_type) = self.access_type {
            entry.access_type = access_type;
            entry.is_truck = access_type == AccessType::Truck;
        }
    }
}

/// Latest known details of a recurring visitor.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct VisitorProfile {
    pub driver_name: String,
    pub company: String,
    pub vehicle_plate: Option<String>,
    pub document_number: Option<String>,
    pub access_type: AccessType,
    pub last_seen: Option<DateTime<Utc>>,
    pub visits: usize,
}

#[cfg(test)]
pub(crate) fn sample_entry(id: &str, driver: &str, plate: &str) -> VehicleEntry {
    VehicleEntry {
        id: id.to_string(),
        access_type: AccessType::Truck,
        driver_name: driver.to_string(),
        company: "Transportes Silva".to_string(),
        supplier: None,
        operation_type: Some(OperationType::Delivery),
        order_number: None,
        vehicle_plate: Some(plate.to_string()),
        trailer_plate: None,
        is_truck: true,
        document_number: None,
        visit_reason: None,
        visited_person: None,
        status: EntryStatus::Pending,
        rejection_reason: None,
        entry_time: None,
        exit_time: None,
        volumes: None,
        sector: None,
        observations: None,
        exit_observations: None,
        registered_at: None,
        operator_name: "Carlos".to_string(),
        device_name: "Estação Principal".to_string(),
        last_sync_at: None,
        origin: ImportOrigin::Local,
        authorized_by: None,
        meta: SyncMeta::default(),
    }
}
