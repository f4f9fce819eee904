use crate::domains::core::repository::SyncMeta;
use crate::errors::DomainResult;
use crate::validation::{NestedValidator, Validate, ValidationBuilder};
use serde::{Deserialize, Serialize};

/// Enum for app theme options
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AppTheme {
    #[default]
    Light,
    Dark,
}

impl AppTheme {
    pub fn as_str(&self) -> &'static str {
        match self {
            AppTheme::Light => "light",
            AppTheme::Dark => "dark",
        }
    }
}

/// Enum for UI font scale
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FontSize {
    Small,
    #[default]
    Medium,
    Large,
    Xlarge,
}

impl FontSize {
    pub fn as_str(&self) -> &'static str {
        match self {
            FontSize::Small => "small",
            FontSize::Medium => "medium",
            FontSize::Large => "large",
            FontSize::Xlarge => "xlarge",
        }
    }
}

/// A sector phone number used to request entry authorization.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SectorContact {
    pub id: String,
    pub name: String,
    pub number: String,
}

/// Device-wide configuration singleton.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AppSettings {
    #[serde(default)]
    pub sector_contacts: Vec<SectorContact>,
    pub company_name: String,
    pub device_name: String,
    #[serde(default)]
    pub theme: AppTheme,
    #[serde(default)]
    pub font_size: FontSize,
    #[serde(flatten)]
    pub meta: SyncMeta,
}

impl Default for AppSettings {
    fn default() -> Self {
        Self {
            sector_contacts: vec![
                SectorContact {
                    id: "1".to_string(),
                    name: "Logística".to_string(),
                    number: String::new(),
                },
                SectorContact {
                    id: "2".to_string(),
                    name: "Almoxarifado".to_string(),
                    number: String::new(),
                },
            ],
            company_name: "Portaria PX".to_string(),
            device_name: "Estação Principal".to_string(),
            theme: AppTheme::Light,
            font_size: FontSize::Medium,
            meta: SyncMeta {
                synced: true,
                created_at: None,
                updated_at: None,
            },
        }
    }
}

impl Validate for AppSettings {
    fn validate(&self) -> DomainResult<()> {
        let mut nested = NestedValidator::new();
        nested.check(
            ValidationBuilder::new("companyName", Some(self.company_name.clone()))
                .required()
                .max_length(120)
                .validate(),
        );
        nested.check(
            ValidationBuilder::new("deviceName", Some(self.device_name.clone()))
                .required()
                .max_length(120)
                .validate(),
        );
        for contact in &self.sector_contacts {
            nested.check(
                ValidationBuilder::new("sectorContacts.name", Some(contact.name.clone()))
                    .required()
                    .validate(),
            );
        }
        nested.validate()
    }
}
