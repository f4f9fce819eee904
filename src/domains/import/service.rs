use crate::domains::audit::{AuditLog, LogModule};
use crate::domains::core::collection::{Change, CollectionStore};
use crate::domains::core::repository::CollectionKey;
use crate::domains::entry::{ImportOrigin, VehicleEntry};
use crate::domains::import::types::MasterDataDocument;
use crate::errors::{DomainError, DomainResult, ValidationError};
use crate::utils::id::{needs_id, new_record_id};
use log::{debug, warn};
use serde_json::Value;
use std::collections::HashSet;
use std::sync::Arc;

/// Additive merge of externally supplied entries.
pub struct ImportService {
    store: Arc<CollectionStore>,
    audit: Arc<AuditLog>,
}

impl ImportService {
    pub fn new(store: Arc<CollectionStore>, audit: Arc<AuditLog>) -> Self {
        Self { store, audit }
    }

    /// Append candidates whose id is not stored yet. Existing records are never touched.
    ///
    /// Returns how many records were added.
    pub async fn merge_entries(&self, candidates: Vec<VehicleEntry>, origin: ImportOrigin) -> DomainResult<usize> {
        let now = self.store.now();
        let added = self
            .store
            .modify(CollectionKey::Entries, move |entries: &mut Vec<VehicleEntry>| {
                let mut known: HashSet<String> = entries.iter().map(|e| e.id.clone()).collect();
                let mut added = 0;
                for mut candidate in candidates {
                    if needs_id(&candidate.id) {
                        candidate.id = new_record_id();
                    }
                    if !known.insert(candidate.id.clone()) {
                        continue;
                    }
                    candidate.origin = origin;
                    candidate.last_sync_at = Some(now);
                    candidate.meta.stamp_created(now);
                    entries.push(candidate);
                    added += 1;
                }
                if added > 0 {
                    Change::Write(added)
                } else {
                    Change::Skip(0)
                }
            })
            .await?;

        if added > 0 {
            self.audit
                .append(
                    LogModule::Gatehouse,
                    "Records imported",
                    None,
                    Some(format!("{} new records merged ({})", added, origin.as_str())),
                )
                .await;
        } else {
            debug!("Import added no new entries");
        }
        Ok(added)
    }
}

/// Read candidates from an import file: either a bare array or a document with an `entries` array.
///
/// Elements that are not valid entries are skipped.
pub fn parse_import_file(text: &str) -> DomainResult<Vec<VehicleEntry>> {
    let value: Value = serde_json::from_str(text)
        .map_err(|e| ValidationError::format("import", &format!("not valid JSON: {}", e)))?;
    let items = match value {
        Value::Array(items) => items,
        Value::Object(mut object) => match object.remove("entries") {
            Some(Value::Array(items)) => items,
            _ => return Err(ValidationError::format("entries", "import file has no entries list").into()),
        },
        _ => return Err(ValidationError::format("import", "expected a list of entries").into()),
    };

    Ok(items
        .into_iter()
        .filter_map(|item| match serde_json::from_value::<VehicleEntry>(item) {
            Ok(entry) => Some(entry),
            Err(e) => {
                warn!("Skipping unreadable import candidate: {}", e);
                None
            }
        })
        .collect())
}

/// Encode `entries` as a visitor base file.
pub fn master_data_json(entries: Vec<VehicleEntry>) -> DomainResult<String> {
    serde_json::to_string_pretty(&MasterDataDocument::new(entries))
        .map_err(|e| DomainError::Internal(format!("could not encode master data: {}", e)))
}
