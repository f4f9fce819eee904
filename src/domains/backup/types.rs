use crate::domains::core::repository::CollectionKey;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Version tag written into, and required from, every backup document.
pub const BACKUP_FORMAT_VERSION: &str = "1.0";

/// Author recorded when nobody is logged in.
pub const DEFAULT_EXPORTER: &str = "Porteiro";

/// Portable snapshot of every operational collection.
///
/// The Portuguese aliases accept documents produced by older devices.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BackupDocument {
    #[serde(alias = "versao")]
    pub format_version: String,
    #[serde(alias = "dataExportacao", default)]
    pub exported_at: Option<DateTime<Utc>>,
    #[serde(alias = "geradoPor", default)]
    pub exported_by: String,
    #[serde(alias = "dados", default)]
    pub data: BackupData,
}

/// Collections are carried as raw JSON so that restore writes back exactly what was exported.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct BackupData {
    #[serde(alias = "entradas", default)]
    pub entries: Vec<Value>,
    #[serde(alias = "cafe", default)]
    pub breakfast: Vec<Value>,
    #[serde(alias = "encomendas", default)]
    pub packages: Vec<Value>,
    #[serde(alias = "medidores", default)]
    pub meters: Vec<Value>,
    #[serde(alias = "leituras", default)]
    pub meter_readings: Vec<Value>,
    #[serde(alias = "expediente", default)]
    pub shifts: Vec<Value>,
    #[serde(alias = "rondas", default)]
    pub patrols: Vec<Value>,
    #[serde(default)]
    pub logs: Vec<Value>,
}

impl BackupData {
    pub fn collection(&self, key: CollectionKey) -> &Vec<Value> {
        match key {
            CollectionKey::Entries => &self.entries,
            CollectionKey::Breakfast => &self.breakfast,
            CollectionKey::Packages => &self.packages,
            CollectionKey::Meters => &self.meters,
            CollectionKey::MeterReadings => &self.meter_readings,
            CollectionKey::Shifts => &self.shifts,
            CollectionKey::Patrols => &self.patrols,
            CollectionKey::Logs => &self.logs,
        }
    }

    pub fn collection_mut(&mut self, key: CollectionKey) -> &mut Vec<Value> {
        match key {
            CollectionKey::Entries => &mut self.entries,
            CollectionKey::Breakfast => &mut self.breakfast,
            CollectionKey::Packages => &mut self.packages,
            CollectionKey::Meters => &mut self.meters,
            CollectionKey::MeterReadings => &mut self.meter_readings,
            CollectionKey::Shifts => &mut self.shifts,
            CollectionKey::Patrols => &mut self.patrols,
            CollectionKey::Logs => &mut self.logs,
        }
    }

    pub fn total_records(&self) -> usize {
        CollectionKey::ALL.iter().map(|key| self.collection(*key).len()).sum()
    }
}

/// Counts written by a restore, per collection name.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct RestoreSummary {
    pub exported_by: String,
    pub restored: std::collections::BTreeMap<String, usize>,
}
