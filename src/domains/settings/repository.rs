use crate::domains::audit::{AuditLog, LogModule};
use crate::domains::core::collection::CollectionStore;
use crate::domains::core::repository::keys;
use crate::domains::settings::types::AppSettings;
use crate::errors::DomainResult;
use crate::validation::Validate;
use log::warn;
use serde_json::Value;
use std::sync::Arc;

pub struct SettingsRepository {
    store: Arc<CollectionStore>,
    audit: Arc<AuditLog>,
}

impl SettingsRepository {
    pub fn new(store: Arc<CollectionStore>, audit: Arc<AuditLog>) -> Self {
        Self { store, audit }
    }

    /// Stored settings, or the defaults when none were saved yet.
    pub async fn get(&self) -> DomainResult<AppSettings> {
        Ok(self
            .store
            .load_value::<AppSettings>(keys::SETTINGS)
            .await?
            .unwrap_or_default())
    }

    pub async fn save(&self, mut settings: AppSettings) -> DomainResult<AppSettings> {
        settings.validate()?;
        let now = self.store.now();
        if settings.meta.created_at.is_none() {
            settings.meta.created_at = Some(now);
        }
        settings.meta.stamp_updated(now);
        self.store.store_value(keys::SETTINGS, &settings).await?;
        self.audit
            .append(LogModule::System, "Settings changed", None, Some(settings.company_name.clone()))
            .await;
        Ok(settings)
    }

    /// Stored settings awaiting a push, with the stored JSON they were read from.
    pub async fn dirty_snapshot(&self) -> DomainResult<Option<(AppSettings, Value)>> {
        let Some(stored) = self.store.load_raw_value(keys::SETTINGS).await? else {
            return Ok(None);
        };
        match serde_json::from_value::<AppSettings>(stored.clone()) {
            Ok(settings) if !settings.meta.synced => Ok(Some((settings, stored))),
            Ok(_) => Ok(None),
            Err(e) => {
                warn!("Stored settings cannot be decoded and stay unsynced: {}", e);
                Ok(None)
            }
        }
    }

    /// Flag the settings as synced unless they changed since `pushed` was read.
    /// Only the synchronizer calls this.
    pub async fn mark_pushed(&self, pushed: &Value) -> DomainResult<bool> {
        self.store.mark_value_pushed(keys::SETTINGS, pushed).await
    }
}
