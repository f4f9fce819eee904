use crate::domains::audit::types::{AppLog, LogModule};
use crate::domains::core::collection::{Change, CollectionStore, LOG_TRIM_ON_QUOTA, MAX_LOG_ENTRIES};
use crate::domains::core::repository::{keys, CollectionKey, SyncMeta};
use crate::domains::session::types::UserSession;
use crate::errors::{DomainError, DomainResult};
use crate::utils::id::new_record_id;
use log::warn;
use std::sync::Arc;

/// Attribution used when nobody is logged in.
pub const UNKNOWN_USER: &str = "unknown";

/// Append-only audit trail capped to the most recent entries.
pub struct AuditLog {
    store: Arc<CollectionStore>,
}

impl AuditLog {
    pub fn new(store: Arc<CollectionStore>) -> Self {
        Self { store }
    }

    pub async fn get_all(&self) -> DomainResult<Vec<AppLog>> {
        self.store.get_all(CollectionKey::Logs).await
    }

    /// Newest entries first.
    pub async fn recent(&self, limit: usize) -> DomainResult<Vec<AppLog>> {
        let mut logs = self.get_all().await?;
        logs.reverse();
        logs.truncate(limit);
        Ok(logs)
    }

    /// Record an action. Failures are logged and swallowed so that auditing
    /// never fails the operation being audited.
    pub async fn append(
        &self,
        module: LogModule,
        action: &str,
        reference_id: Option<&str>,
        details: Option<String>,
    ) {
        if let Err(e) = self.try_append(module, action, reference_id, details).await {
            warn!("Audit entry '{}' for {} was not stored: {}", action, module.as_str(), e);
        }
    }

    pub async fn try_append(
        &self,
        module: LogModule,
        action: &str,
        reference_id: Option<&str>,
        details: Option<String>,
    ) -> DomainResult<AppLog> {
        let now = self.store.now();
        let entry = AppLog {
            id: new_record_id(),
            timestamp: now,
            user: self.current_user().await,
            module,
            action: action.to_string(),
            reference_id: reference_id.map(str::to_string),
            details,
            meta: SyncMeta {
                synced: false,
                created_at: Some(now),
                updated_at: Some(now),
            },
        };

        match self.push_capped(entry.clone(), MAX_LOG_ENTRIES).await {
            Err(DomainError::StorageCapacity(_)) => {
                warn!("Audit log hit storage limit, keeping only the latest {} entries", LOG_TRIM_ON_QUOTA);
                self.push_capped(entry.clone(), LOG_TRIM_ON_QUOTA).await?;
            }
            other => other?,
        }
        Ok(entry)
    }

    /// Entries are handled as stored JSON so the cap also counts legacy entries.
    async fn push_capped(&self, entry: AppLog, cap: usize) -> DomainResult<()> {
        let value = serde_json::to_value(&entry)
            .map_err(|e| DomainError::Internal(format!("serialization failed: {}", e)))?;
        self.store
            .modify_raw(CollectionKey::Logs.storage_key(), move |logs| {
                logs.push(value);
                cap_oldest_first(logs, cap);
                Change::Write(())
            })
            .await
    }

    async fn current_user(&self) -> String {
        match self.store.load_value::<UserSession>(keys::SESSION).await {
            Ok(Some(session)) if !session.operator_name.is_empty() => session.operator_name,
            _ => UNKNOWN_USER.to_string(),
        }
    }
}

/// Drop the oldest entries so at most `cap` remain.
pub fn cap_oldest_first<T>(entries: &mut Vec<T>, cap: usize) {
    if entries.len() > cap {
        let excess = entries.len() - cap;
        entries.drain(..excess);
    }
}
