use crate::domains::core::repository::SyncMeta;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Area of the application an audit entry belongs to
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum LogModule {
    #[serde(rename = "Café")]
    Breakfast,
    #[serde(rename = "Encomendas")]
    Packages,
    #[serde(rename = "Portaria")]
    Gatehouse,
    #[serde(rename = "Medidores")]
    Meters,
    #[serde(rename = "Sistema")]
    System,
    #[serde(rename = "Ponto")]
    TimeClock,
    #[serde(rename = "Rondas")]
    Patrols,
}

impl LogModule {
    pub fn as_str(&self) -> &'static str {
        match self {
            LogModule::Breakfast => "Café",
            LogModule::Packages => "Encomendas",
            LogModule::Gatehouse => "Portaria",
            LogModule::Meters => "Medidores",
            LogModule::System => "Sistema",
            LogModule::TimeClock => "Ponto",
            LogModule::Patrols => "Rondas",
        }
    }
}

/// Immutable audit trail entry
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AppLog {
    #[serde(default)]
    pub id: String,
    pub timestamp: DateTime<Utc>,
    pub user: String,
    pub module: LogModule,
    pub action: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub reference_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub details: Option<String>,
    #[serde(flatten)]
    pub meta: SyncMeta,
}

crate::impl_syncable!(AppLog);
