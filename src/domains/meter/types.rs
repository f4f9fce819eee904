use crate::domains::core::repository::SyncMeta;
use crate::errors::DomainResult;
use crate::validation::{NestedValidator, Validate, ValidationBuilder};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum MeterType {
    #[serde(rename = "Água")]
    Water,
    #[serde(rename = "Energia")]
    Energy,
    #[serde(rename = "Gás")]
    Gas,
    #[serde(rename = "Outro")]
    Other,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum MeterUnit {
    #[serde(rename = "m³")]
    CubicMeters,
    #[serde(rename = "kWh")]
    KilowattHours,
    #[serde(rename = "Litros")]
    Liters,
    #[serde(rename = "Personalizado")]
    Custom,
}

fn default_active() -> bool {
    true
}

/// A physical utility meter.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Meter {
    #[serde(default)]
    pub id: String,
    pub name: String,
    #[serde(rename = "type")]
    pub meter_type: MeterType,
    pub unit: MeterUnit,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub custom_unit: Option<String>,
    #[serde(default = "default_active")]
    pub active: bool,
    #[serde(rename = "createdAt", default, skip_serializing_if = "Option::is_none")]
    pub registered_at: Option<DateTime<Utc>>,
    #[serde(flatten)]
    pub meta: SyncMeta,
}

crate::impl_syncable!(Meter);

impl Meter {
    pub fn has_name(&self, name: &str) -> bool {
        self.name.trim().to_lowercase() == name.trim().to_lowercase()
    }
}

impl Validate for Meter {
    fn validate(&self) -> DomainResult<()> {
        let mut nested = NestedValidator::new();
        nested.check(
            ValidationBuilder::new("name", Some(self.name.clone()))
                .required()
                .max_length(80)
                .validate(),
        );
        if self.unit == MeterUnit::Custom {
            nested.check(
                ValidationBuilder::new("customUnit", self.custom_unit.clone())
                    .required()
                    .validate(),
            );
        }
        nested.validate()
    }
}

/// A dated reading of one meter.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MeterReading {
    #[serde(default)]
    pub id: String,
    pub meter_id: String,
    pub value: f64,
    /// Difference to the previous reading of the same meter.
    #[serde(default)]
    pub consumption: f64,
    /// Base64 image. Never leaves the device.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub photo: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub observation: Option<String>,
    #[serde(default)]
    pub operator: String,
    pub timestamp: DateTime<Utc>,
    #[serde(flatten)]
    pub meta: SyncMeta,
}

crate::impl_syncable!(MeterReading);

impl Validate for MeterReading {
    fn validate(&self) -> DomainResult<()> {
        let mut nested = NestedValidator::new();
        nested.check(
            ValidationBuilder::new("meterId", Some(self.meter_id.clone()))
                .required()
                .validate(),
        );
        nested.check(ValidationBuilder::new("value", Some(self.value)).finite().min(0.0).validate());
        nested.validate()
    }
}
