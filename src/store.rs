use crate::domains::audit::AuditLog;
use crate::domains::backup::BackupService;
use crate::domains::breakfast::BreakfastRepository;
use crate::domains::core::collection::CollectionStore;
use crate::domains::core::repository::CollectionKey;
use crate::domains::core::storage::{KeyValueStorage, MemoryKeyValueStorage};
use crate::domains::deletion_queue::{DeletedItem, DeletionQueue};
use crate::domains::entry::EntryRepository;
use crate::domains::import::ImportService;
use crate::domains::meter::MeterRepository;
use crate::domains::package::PackageRepository;
use crate::domains::patrol::PatrolRepository;
use crate::domains::session::SessionRepository;
use crate::domains::settings::SettingsRepository;
use crate::domains::shift::ShiftRepository;
use crate::errors::DomainResult;
use crate::utils::clock::{Clock, SystemClock};
use serde_json::Value;
use std::sync::Arc;

/// The local record store: every collection repository over one shared key-value storage.
#[derive(Clone)]
pub struct RecordStore {
    pub collections: Arc<CollectionStore>,
    pub audit: Arc<AuditLog>,
    pub deletions: Arc<DeletionQueue>,
    pub session: Arc<SessionRepository>,
    pub settings: Arc<SettingsRepository>,
    pub entries: Arc<EntryRepository>,
    pub breakfast: Arc<BreakfastRepository>,
    pub packages: Arc<PackageRepository>,
    pub meters: Arc<MeterRepository>,
    pub patrols: Arc<PatrolRepository>,
    pub shifts: Arc<ShiftRepository>,
    pub backup: Arc<BackupService>,
    pub import: Arc<ImportService>,
}

impl RecordStore {
    pub fn new(storage: Arc<dyn KeyValueStorage>, clock: Arc<dyn Clock>) -> Self {
        let collections = Arc::new(CollectionStore::new(storage, clock));
        let audit = Arc::new(AuditLog::new(collections.clone()));
        let deletions = Arc::new(DeletionQueue::new(collections.clone()));

        Self {
            session: Arc::new(SessionRepository::new(collections.clone(), audit.clone())),
            settings: Arc::new(SettingsRepository::new(collections.clone(), audit.clone())),
            entries: Arc::new(EntryRepository::new(collections.clone(), audit.clone(), deletions.clone())),
            breakfast: Arc::new(BreakfastRepository::new(collections.clone(), audit.clone(), deletions.clone())),
            packages: Arc::new(PackageRepository::new(collections.clone(), audit.clone(), deletions.clone())),
            meters: Arc::new(MeterRepository::new(collections.clone(), audit.clone(), deletions.clone())),
            patrols: Arc::new(PatrolRepository::new(collections.clone(), audit.clone(), deletions.clone())),
            shifts: Arc::new(ShiftRepository::new(collections.clone(), audit.clone())),
            backup: Arc::new(BackupService::new(collections.clone(), audit.clone())),
            import: Arc::new(ImportService::new(collections.clone(), audit.clone())),
            collections,
            audit,
            deletions,
        }
    }

    /// Unbounded in-memory store on the system clock.
    pub fn in_memory() -> Self {
        Self::new(Arc::new(MemoryKeyValueStorage::new()), Arc::new(SystemClock))
    }

    /// Records of any collection as stored, unknown fields included.
    pub async fn get_all_raw(&self, key: CollectionKey) -> DomainResult<Vec<Value>> {
        self.collections.load_list(key.storage_key()).await
    }

    pub async fn get_unsynced_raw(&self, key: CollectionKey) -> DomainResult<Vec<Value>> {
        Ok(self
            .get_all_raw(key)
            .await?
            .into_iter()
            .filter(|value| value.get("synced").and_then(Value::as_bool) != Some(true))
            .collect())
    }

    pub async fn mark_synced(&self, key: CollectionKey, ids: &[String]) -> DomainResult<usize> {
        self.collections.mark_as_synced(key, ids).await
    }

    pub async fn deletion_queue(&self) -> DomainResult<Vec<DeletedItem>> {
        self.deletions.drain().await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domains::entry::types::sample_entry;
    use crate::domains::sync::mapping::ToRemoteRow;
    use crate::utils::clock::MockClock;

    fn store() -> RecordStore {
        RecordStore::new(
            Arc::new(MemoryKeyValueStorage::new()),
            Arc::new(MockClock::at("2025-03-10T08:00:00Z")),
        )
    }

    #[tokio::test]
    async fn raw_views_follow_the_dirty_flag() {
        let store = store();
        store.entries.add(sample_entry("A1", "João", "ABC-1234")).await.unwrap();
        store.entries.add(sample_entry("A2", "Maria", "XYZ-0000")).await.unwrap();

        assert_eq!(store.get_unsynced_raw(CollectionKey::Entries).await.unwrap().len(), 2);
        assert_eq!(store.mark_synced(CollectionKey::Entries, &["A1".to_string()]).await.unwrap(), 1);

        let unsynced = store.get_unsynced_raw(CollectionKey::Entries).await.unwrap();
        assert_eq!(unsynced.len(), 1);
        assert_eq!(unsynced[0]["id"], "A2");
        assert_eq!(store.get_all_raw(CollectionKey::Entries).await.unwrap().len(), 2);
    }

    #[tokio::test]
    async fn repositories_share_one_audit_trail_and_queue() {
        let store = store();
        store.session.start_session("Carlos").await.unwrap();
        store.entries.add(sample_entry("A1", "João", "ABC-1234")).await.unwrap();
        store.entries.delete("A1").await.unwrap();

        let queue = store.deletion_queue().await.unwrap();
        assert_eq!(queue.len(), 1);
        assert_eq!(queue[0].table, "vehicle_entries");

        let logs = store.audit.recent(10).await.unwrap();
        assert!(logs.len() >= 3);
        assert!(logs.iter().all(|log| log.user == "Carlos"));
        assert_eq!(logs[0].to_remote_row("u")["user_name"], "Carlos");
    }
}
