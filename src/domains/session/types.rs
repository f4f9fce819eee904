use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Operator currently working at the device.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UserSession {
    pub operator_name: String,
    pub login_time: DateTime<Utc>,
}

/// In-progress new-entry form, kept so an interrupted registration can resume.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EntryDraft {
    pub form_data: serde_json::Value,
    pub step: u32,
}
