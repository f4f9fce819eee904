use crate::domains::core::repository::SyncMeta;
use crate::errors::DomainResult;
use crate::validation::{Validate, ValidationBuilder};
use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum PatrolStatus {
    #[default]
    #[serde(rename = "EM_ANDAMENTO")]
    InProgress,
    #[serde(rename = "CONCLUIDA")]
    Completed,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PatrolPhoto {
    pub id: String,
    #[serde(rename = "imagemBase64")]
    pub image_base64: String,
}

/// One security round. Field names on disk follow the historical backup format.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PatrolRecord {
    #[serde(default)]
    pub id: String,
    #[serde(rename = "data")]
    pub date: NaiveDate,
    #[serde(rename = "horaInicio")]
    pub started_at: DateTime<Utc>,
    #[serde(rename = "horaFim", default)]
    pub finished_at: Option<DateTime<Utc>>,
    #[serde(rename = "duracaoMinutos", default)]
    pub duration_minutes: Option<i64>,
    #[serde(rename = "porteiro")]
    pub guard_name: String,
    #[serde(default)]
    pub status: PatrolStatus,
    #[serde(rename = "observacoes", default)]
    pub notes: String,
    #[serde(rename = "fotos", default)]
    pub photos: Vec<PatrolPhoto>,
    #[serde(rename = "criadoEm", default, skip_serializing_if = "Option::is_none")]
    pub registered_at: Option<DateTime<Utc>>,
    #[serde(flatten)]
    pub meta: SyncMeta,
}

crate::impl_syncable!(PatrolRecord);

impl Validate for PatrolRecord {
    fn validate(&self) -> DomainResult<()> {
        ValidationBuilder::new("porteiro", Some(self.guard_name.clone()))
            .required()
            .validate()
    }
}

/// Whole minutes between start and end, rounded to nearest.
pub fn duration_in_minutes(start: DateTime<Utc>, end: DateTime<Utc>) -> i64 {
    let seconds = (end - start).num_seconds().max(0);
    (seconds + 30) / 60
}
