use crate::domains::core::repository::SyncMeta;
use crate::errors::DomainResult;
use crate::validation::{Validate, ValidationBuilder};
use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum BreakfastType {
    #[serde(rename = "Fruta")]
    Fruit,
    #[serde(rename = "Outro")]
    Other,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum BreakfastStatus {
    #[default]
    #[serde(rename = "Pendente")]
    Pending,
    #[serde(rename = "Entregue")]
    Delivered,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum BreakfastOrigin {
    #[serde(rename = "Importado")]
    Imported,
    #[default]
    #[serde(rename = "Manual")]
    Manual,
}

/// One person's breakfast for a given day.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BreakfastRecord {
    #[serde(default)]
    pub id: String,
    pub person_name: String,
    pub breakfast_type: BreakfastType,
    #[serde(default)]
    pub status: BreakfastStatus,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub delivered_at: Option<DateTime<Utc>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub operator_name: Option<String>,
    pub date: NaiveDate,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub observations: Option<String>,
    #[serde(default)]
    pub origin: BreakfastOrigin,
    #[serde(flatten)]
    pub meta: SyncMeta,
}

crate::impl_syncable!(BreakfastRecord);

impl Validate for BreakfastRecord {
    fn validate(&self) -> DomainResult<()> {
        ValidationBuilder::new("personName", Some(self.person_name.clone()))
            .required()
            .max_length(120)
            .validate()
    }
}
