use crate::domains::core::repository::SyncMeta;
use crate::errors::DomainResult;
use crate::validation::{NestedValidator, Validate, ValidationBuilder};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum PackageStatus {
    #[default]
    #[serde(rename = "Aguardando retirada")]
    Awaiting,
    #[serde(rename = "Entregue")]
    Delivered,
}

/// Who collected the parcel.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum PickupType {
    #[serde(rename = "Próprio")]
    SelfPickup,
    #[serde(rename = "Terceiro")]
    ThirdParty,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PackageRecord {
    #[serde(default)]
    pub id: String,
    pub delivery_company: String,
    pub recipient_name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(default)]
    pub operator_name: String,
    pub received_at: DateTime<Utc>,
    #[serde(default)]
    pub status: PackageStatus,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub delivered_at: Option<DateTime<Utc>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub delivered_to: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub pickup_type: Option<PickupType>,
    /// Base64 image. Never leaves the device.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub photo: Option<String>,
    #[serde(flatten)]
    pub meta: SyncMeta,
}

crate::impl_syncable!(PackageRecord);

impl Validate for PackageRecord {
    fn validate(&self) -> DomainResult<()> {
        let mut nested = NestedValidator::new();
        nested.check(
            ValidationBuilder::new("recipientName", Some(self.recipient_name.clone()))
                .required()
                .max_length(120)
                .validate(),
        );
        nested.check(
            ValidationBuilder::new("deliveryCompany", Some(self.delivery_company.clone()))
                .required()
                .validate(),
        );
        if self.status == PackageStatus::Delivered {
            nested.check(
                ValidationBuilder::new("deliveredTo", self.delivered_to.clone())
                    .required()
                    .validate(),
            );
        }
        nested.validate()
    }
}
