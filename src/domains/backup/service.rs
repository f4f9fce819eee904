use crate::domains::audit::repository::cap_oldest_first;
use crate::domains::audit::{AuditLog, LogModule};
use crate::domains::backup::types::{
    BackupData, BackupDocument, RestoreSummary, BACKUP_FORMAT_VERSION, DEFAULT_EXPORTER,
};
use crate::domains::core::collection::{CollectionStore, MAX_LOG_ENTRIES};
use crate::domains::core::repository::{keys, CollectionKey};
use crate::domains::session::UserSession;
use crate::errors::{DomainError, DomainResult, ValidationError};
use log::{info, warn};
use serde_json::Value;
use std::collections::HashSet;
use std::sync::Arc;

/// Shift-handover export and wholesale restore.
pub struct BackupService {
    store: Arc<CollectionStore>,
    audit: Arc<AuditLog>,
}

impl BackupService {
    pub fn new(store: Arc<CollectionStore>, audit: Arc<AuditLog>) -> Self {
        Self { store, audit }
    }

    /// Snapshot every operational collection. Settings and session are left out.
    pub async fn export_document(&self) -> DomainResult<BackupDocument> {
        let mut data = BackupData::default();
        for key in CollectionKey::ALL {
            *data.collection_mut(key) = self.store.load_list::<Value>(key.storage_key()).await?;
        }
        let exported_by = match self.store.load_value::<UserSession>(keys::SESSION).await? {
            Some(session) if !session.operator_name.is_empty() => session.operator_name,
            _ => DEFAULT_EXPORTER.to_string(),
        };
        Ok(BackupDocument {
            format_version: BACKUP_FORMAT_VERSION.to_string(),
            exported_at: Some(self.store.now()),
            exported_by,
            data,
        })
    }

    /// Export as JSON text.
    pub async fn export(&self) -> DomainResult<String> {
        let document = self.export_document().await?;
        let json = serde_json::to_string_pretty(&document)
            .map_err(|e| DomainError::Internal(format!("could not encode backup: {}", e)))?;
        self.audit
            .append(
                LogModule::System,
                "Backup exported",
                None,
                Some(format!("{} records", document.data.total_records())),
            )
            .await;
        Ok(json)
    }

    /// Replace local operational data with the contents of `text`.
    ///
    /// Nothing is written unless `confirmed` is set and the document carries the
    /// expected version. Audit logs are merged instead of replaced.
    pub async fn restore(&self, text: &str, confirmed: bool) -> DomainResult<RestoreSummary> {
        if !confirmed {
            return Err(ValidationError::custom("restoring a backup overwrites local data and must be confirmed").into());
        }
        let document = parse_backup(text)?;

        let existing_logs = self.store.load_list::<Value>(CollectionKey::Logs.storage_key()).await?;
        let merged_logs = union_logs(existing_logs, &document.data.logs);

        let mut summary = RestoreSummary {
            exported_by: document.exported_by.clone(),
            ..Default::default()
        };
        for key in CollectionKey::ALL {
            let records = if key == CollectionKey::Logs {
                &merged_logs
            } else {
                document.data.collection(key)
            };
            self.store.write_all(key, records).await?;
            summary.restored.insert(key.as_str().to_string(), records.len());
        }

        info!(
            "Restored backup from '{}' with {} records",
            document.exported_by,
            document.data.total_records()
        );
        self.audit
            .append(
                LogModule::System,
                "Backup restored",
                None,
                Some(format!("Exported by {}", document.exported_by)),
            )
            .await;
        Ok(summary)
    }
}

/// Parse and version-check a backup document.
pub fn parse_backup(text: &str) -> DomainResult<BackupDocument> {
    let value: Value = serde_json::from_str(text)
        .map_err(|e| ValidationError::format("backup", &format!("not valid JSON: {}", e)))?;

    let version = value
        .get("format_version")
        .or_else(|| value.get("versao"))
        .and_then(Value::as_str);
    match version {
        Some(BACKUP_FORMAT_VERSION) => {}
        Some(other) => {
            warn!("Rejected backup with version '{}'", other);
            return Err(ValidationError::format(
                "format_version",
                &format!("unsupported backup version '{}'", other),
            )
            .into());
        }
        None => return Err(ValidationError::format("format_version", "backup version is missing").into()),
    }

    serde_json::from_value(value)
        .map_err(|e| ValidationError::format("backup", &format!("unreadable backup: {}", e)).into())
}

/// Existing logs first, then unseen backup logs, keeping the newest entries.
fn union_logs(existing: Vec<Value>, incoming: &[Value]) -> Vec<Value> {
    let mut seen: HashSet<String> = existing
        .iter()
        .filter_map(|log| log.get("id").and_then(Value::as_str).map(str::to_string))
        .collect();
    let mut merged = existing;
    for log in incoming {
        match log.get("id").and_then(Value::as_str) {
            Some(id) if !seen.insert(id.to_string()) => continue,
            _ => merged.push(log.clone()),
        }
    }
    cap_oldest_first(&mut merged, MAX_LOG_ENTRIES);
    merged
}
