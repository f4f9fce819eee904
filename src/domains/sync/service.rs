use crate::auth::RemoteIdentity;
use crate::domains::core::collection::CollectionStore;
use crate::domains::core::repository::{CollectionKey, Syncable};
use crate::domains::deletion_queue::DeletionQueue;
use crate::domains::settings::SettingsRepository;
use crate::domains::sync::mapping::{settings_row, ToRemoteRow};
use crate::domains::sync::remote::RemoteBackend;
use crate::domains::sync::types::{SyncOutcome, SyncStats, SyncStatus};
use crate::domains::audit::AppLog;
use crate::domains::breakfast::BreakfastRecord;
use crate::domains::entry::VehicleEntry;
use crate::domains::meter::{Meter, MeterReading};
use crate::domains::package::PackageRecord;
use crate::domains::patrol::PatrolRecord;
use crate::errors::{SyncError, SyncResult};
use async_trait::async_trait;
use log::{debug, error, info, warn};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use tokio::sync::Semaphore;

/// Callback receiving status transitions of a pass.
pub type StatusCallback = Arc<dyn Fn(SyncStatus) + Send + Sync>;

/// Collections pushed each pass, in this order. Settings follow last.
pub const PUSH_ORDER: [CollectionKey; 7] = [
    CollectionKey::Entries,
    CollectionKey::Breakfast,
    CollectionKey::Packages,
    CollectionKey::Meters,
    CollectionKey::MeterReadings,
    CollectionKey::Patrols,
    CollectionKey::Logs,
];

const SETTINGS_TABLE: &str = "app_settings";

/// High-level trait for the synchronisation service.
#[async_trait]
pub trait SyncService: Send + Sync {
    /// Run one full pass: remote deletions, then pushes of every dirty record.
    async fn sync_all(&self, on_status: Option<StatusCallback>) -> SyncOutcome;

    /// Whether the device currently believes it is online.
    fn is_online(&self) -> bool;

    fn set_online(&self, online: bool);
}

/// Implementation of the synchronisation service.
pub struct SyncServiceImpl {
    store: Arc<CollectionStore>,
    deletions: Arc<DeletionQueue>,
    settings: Arc<SettingsRepository>,
    remote: Arc<dyn RemoteBackend>,
    online: AtomicBool,
    // One pass at a time
    pass_permit: Semaphore,
}

impl SyncServiceImpl {
    pub fn new(
        store: Arc<CollectionStore>,
        deletions: Arc<DeletionQueue>,
        settings: Arc<SettingsRepository>,
        remote: Arc<dyn RemoteBackend>,
    ) -> Self {
        Self {
            store,
            deletions,
            settings,
            remote,
            online: AtomicBool::new(true),
            pass_permit: Semaphore::new(1),
        }
    }

    pub fn remote(&self) -> Arc<dyn RemoteBackend> {
        self.remote.clone()
    }

    async fn run_pass(&self, on_status: Option<&StatusCallback>, stats: &mut SyncStats) -> SyncResult<()> {
        notify(on_status, SyncStatus::Syncing);

        let identity = match self.remote.get_authenticated_identity().await {
            Ok(Some(identity)) => identity,
            Ok(None) => {
                return Err(SyncError::Unavailable("no authenticated remote session".to_string()));
            }
            Err(e) => {
                return Err(SyncError::Unavailable(format!("could not verify remote session: {}", e)));
            }
        };
        info!("Sync pass started for remote account {}", identity.id);

        self.process_deletion_queue(stats).await?;
        self.push_all(&identity, stats).await?;
        self.push_settings(&identity, stats).await?;
        Ok(())
    }

    /// One batched delete per table. A failing table stays queued and does not stop the others.
    async fn process_deletion_queue(&self, stats: &mut SyncStats) -> SyncResult<()> {
        let grouped = self.deletions.grouped_by_table().await?;
        if grouped.is_empty() {
            debug!("Deletion queue is empty");
            return Ok(());
        }

        for (table, ids) in grouped {
            match self.remote.delete_where_id_in(&table, &ids).await {
                Ok(()) => {
                    let removed = self.deletions.acknowledge_in_table(&table, &ids).await?;
                    info!("Deleted {} remote rows from {}", ids.len(), table);
                    stats.deleted.insert(table, removed);
                }
                Err(e) => {
                    warn!("Remote deletion from {} failed, keeping {} ids queued: {}", table, ids.len(), e);
                    stats.failed_deletions.insert(table, e.to_string());
                }
            }
        }
        Ok(())
    }

    async fn push_all(&self, identity: &RemoteIdentity, stats: &mut SyncStats) -> SyncResult<()> {
        for key in PUSH_ORDER {
            let pushed = match key {
                CollectionKey::Entries => self.push_collection::<VehicleEntry>(key, identity, stats).await?,
                CollectionKey::Breakfast => self.push_collection::<BreakfastRecord>(key, identity, stats).await?,
                CollectionKey::Packages => self.push_collection::<PackageRecord>(key, identity, stats).await?,
                CollectionKey::Meters => self.push_collection::<Meter>(key, identity, stats).await?,
                CollectionKey::MeterReadings => self.push_collection::<MeterReading>(key, identity, stats).await?,
                CollectionKey::Patrols => self.push_collection::<PatrolRecord>(key, identity, stats).await?,
                CollectionKey::Logs => self.push_collection::<AppLog>(key, identity, stats).await?,
                CollectionKey::Shifts => 0,
            };
            if pushed > 0 {
                stats.pushed.insert(key.as_str().to_string(), pushed);
            }
        }
        Ok(())
    }

    /// Upsert every dirty record of `key`, then flag those still unchanged as synced.
    async fn push_collection<T>(
        &self,
        key: CollectionKey,
        identity: &RemoteIdentity,
        stats: &mut SyncStats,
    ) -> SyncResult<usize>
    where
        T: Syncable + ToRemoteRow,
    {
        let Some(table) = key.remote_table() else {
            return Ok(0);
        };
        let snapshot = self.store.dirty_snapshot::<T>(key).await?;
        if !snapshot.unreadable.is_empty() {
            warn!(
                "{} dirty records in {} cannot be decoded and stay unsynced",
                snapshot.unreadable.len(),
                key
            );
            stats.unreadable.insert(key.as_str().to_string(), snapshot.unreadable.len());
        }
        if snapshot.records.is_empty() {
            return Ok(0);
        }

        let rows = snapshot
            .records
            .iter()
            .map(|dirty| dirty.record.to_remote_row(&identity.id))
            .collect();
        let pushed: Vec<_> = snapshot.records.into_iter().map(|dirty| dirty.stored).collect();

        self.remote
            .upsert(table, rows, None)
            .await
            .map_err(|e| SyncError::RemoteRejected {
                table: table.to_string(),
                message: e.to_string(),
            })?;

        let marked = self.store.mark_pushed(key, &pushed).await?;
        debug!("Pushed {} records to {}, {} now synced", pushed.len(), table, marked);
        Ok(pushed.len())
    }

    async fn push_settings(&self, identity: &RemoteIdentity, stats: &mut SyncStats) -> SyncResult<()> {
        let Some((settings, stored)) = self.settings.dirty_snapshot().await? else {
            return Ok(());
        };
        let row = settings_row(&settings, &identity.id, self.store.now());
        self.remote
            .upsert(SETTINGS_TABLE, vec![row], Some("user_id"))
            .await
            .map_err(|e| SyncError::RemoteRejected {
                table: SETTINGS_TABLE.to_string(),
                message: e.to_string(),
            })?;
        self.settings.mark_pushed(&stored).await?;
        stats.settings_pushed = true;
        Ok(())
    }
}

fn notify(on_status: Option<&StatusCallback>, status: SyncStatus) {
    if let Some(callback) = on_status {
        callback(status);
    }
}

#[async_trait]
impl SyncService for SyncServiceImpl {
    async fn sync_all(&self, on_status: Option<StatusCallback>) -> SyncOutcome {
        let Ok(_permit) = self.pass_permit.try_acquire() else {
            debug!("Sync requested while a pass is running");
            return SyncOutcome::failed(SyncError::AlreadyRunning, SyncStats::default());
        };

        let mut stats = SyncStats::default();
        if !self.is_online() {
            debug!("Sync skipped while offline");
            return SyncOutcome::failed(SyncError::Unavailable("device is offline".to_string()), stats);
        }

        match self.run_pass(on_status.as_ref(), &mut stats).await {
            Ok(()) => {
                info!(
                    "Sync pass finished: {} pushed, {} deleted",
                    stats.total_pushed(),
                    stats.total_deleted()
                );
                notify(on_status.as_ref(), SyncStatus::Success);
                SyncOutcome::completed(stats)
            }
            Err(e) => {
                if e.is_soft() {
                    warn!("Sync pass skipped: {}", e);
                } else {
                    error!("Sync pass failed: {}", e);
                }
                notify(on_status.as_ref(), SyncStatus::Error);
                SyncOutcome::failed(e, stats)
            }
        }
    }

    fn is_online(&self) -> bool {
        self.online.load(Ordering::SeqCst)
    }

    fn set_online(&self, online: bool) {
        self.online.store(online, Ordering::SeqCst);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domains::audit::{AuditLog, LogModule};
    use crate::domains::core::collection::test_support::memory_store;
    use crate::domains::core::collection::Change;
    use crate::domains::entry::types::sample_entry;
    use crate::domains::entry::EntryRepository;
    use crate::domains::sync::remote::{MockRemoteBackend, RemoteCall};
    use std::sync::Mutex;
    use std::time::Duration;

    struct Harness {
        store: Arc<CollectionStore>,
        deletions: Arc<DeletionQueue>,
        settings: Arc<SettingsRepository>,
        audit: Arc<AuditLog>,
        remote: Arc<MockRemoteBackend>,
        service: Arc<SyncServiceImpl>,
    }

    fn harness(remote: MockRemoteBackend) -> Harness {
        let (store, _, _) = memory_store();
        let audit = Arc::new(AuditLog::new(store.clone()));
        let deletions = Arc::new(DeletionQueue::new(store.clone()));
        let settings = Arc::new(SettingsRepository::new(store.clone(), audit.clone()));
        let remote = Arc::new(remote);
        let service = Arc::new(SyncServiceImpl::new(
            store.clone(),
            deletions.clone(),
            settings.clone(),
            remote.clone(),
        ));
        Harness {
            store,
            deletions,
            settings,
            audit,
            remote,
            service,
        }
    }

    fn recorder() -> (StatusCallback, Arc<Mutex<Vec<SyncStatus>>>) {
        let seen = Arc::new(Mutex::new(Vec::new()));
        let sink = seen.clone();
        let callback: StatusCallback = Arc::new(move |status| sink.lock().unwrap().push(status));
        (callback, seen)
    }

    #[tokio::test]
    async fn offline_pass_does_nothing_and_stays_quiet() {
        let h = harness(MockRemoteBackend::with_identity("user-1"));
        h.store.add(CollectionKey::Entries, sample_entry("A1", "João", "ABC-1234")).await.unwrap();
        h.service.set_online(false);

        let (callback, seen) = recorder();
        let outcome = h.service.sync_all(Some(callback)).await;

        assert!(!outcome.success);
        assert!(outcome.is_soft_failure());
        assert!(matches!(outcome.error, Some(SyncError::Unavailable(_))));
        assert!(seen.lock().unwrap().is_empty());
        assert!(h.remote.calls().is_empty());
    }

    #[tokio::test]
    async fn missing_identity_reports_error_without_partial_work() {
        let h = harness(MockRemoteBackend::signed_out());
        h.store.add(CollectionKey::Entries, sample_entry("A1", "João", "ABC-1234")).await.unwrap();
        h.deletions.enqueue("P1", "packages").await.unwrap();

        let (callback, seen) = recorder();
        let outcome = h.service.sync_all(Some(callback)).await;

        assert!(matches!(outcome.error, Some(SyncError::Unavailable(_))));
        assert_eq!(*seen.lock().unwrap(), vec![SyncStatus::Syncing, SyncStatus::Error]);
        assert_eq!(h.remote.calls(), vec![RemoteCall::Identity]);
        assert_eq!(h.deletions.len().await.unwrap(), 1);
    }

    #[tokio::test]
    async fn deletions_complete_before_any_push() {
        let h = harness(MockRemoteBackend::with_identity("user-1"));
        let entries = EntryRepository::new(h.store.clone(), h.audit.clone(), h.deletions.clone());
        entries.add(sample_entry("A1", "João", "ABC-1234")).await.unwrap();
        entries.add(sample_entry("A2", "Maria", "XYZ-0000")).await.unwrap();
        entries.delete("A2").await.unwrap();

        let (callback, seen) = recorder();
        let outcome = h.service.sync_all(Some(callback)).await;
        assert!(outcome.success, "{}", outcome.message);
        assert_eq!(*seen.lock().unwrap(), vec![SyncStatus::Syncing, SyncStatus::Success]);

        let calls = h.remote.calls();
        let first_upsert = calls
            .iter()
            .position(|c| matches!(c, RemoteCall::Upsert { .. }))
            .unwrap();
        let last_delete = calls
            .iter()
            .rposition(|c| matches!(c, RemoteCall::Delete { .. }))
            .unwrap();
        assert!(last_delete < first_upsert);
        assert_eq!(
            calls[last_delete],
            RemoteCall::Delete {
                table: "vehicle_entries".to_string(),
                ids: vec!["A2".to_string()]
            }
        );

        // Entries first, then the audit trail produced by the adds and delete.
        assert_eq!(h.remote.upserted_tables(), vec!["vehicle_entries", "app_logs"]);
        assert!(h.store.get_unsynced::<VehicleEntry>(CollectionKey::Entries).await.unwrap().is_empty());
        assert_eq!(h.deletions.len().await.unwrap(), 0);
        assert_eq!(outcome.stats.pushed["entries"], 1);
    }

    #[tokio::test]
    async fn failed_table_deletion_stays_queued() {
        let h = harness(MockRemoteBackend::with_identity("user-1"));
        h.deletions.enqueue("P1", "packages").await.unwrap();
        h.deletions.enqueue("P2", "patrols").await.unwrap();
        h.remote.fail_deletes_from("patrols");

        let outcome = h.service.sync_all(None).await;
        assert!(outcome.success);

        let remaining = h.deletions.drain().await.unwrap();
        assert_eq!(remaining.len(), 1);
        assert_eq!(remaining[0].id, "P2");
        assert_eq!(remaining[0].table, "patrols");
        assert!(outcome.stats.failed_deletions.contains_key("patrols"));
    }

    #[tokio::test]
    async fn rejected_upsert_aborts_remaining_collections() {
        let h = harness(MockRemoteBackend::with_identity("user-1"));
        h.store.add(CollectionKey::Entries, sample_entry("A1", "João", "ABC-1234")).await.unwrap();
        h.audit.append(LogModule::System, "something", None, None).await;
        let mut settings = h.settings.get().await.unwrap();
        settings.device_name = "Tablet 2".to_string();
        h.settings.save(settings).await.unwrap();
        h.remote.fail_upserts_to("app_logs");

        let (callback, seen) = recorder();
        let outcome = h.service.sync_all(Some(callback)).await;

        assert!(!outcome.success);
        assert!(matches!(
            outcome.error,
            Some(SyncError::RemoteRejected { ref table, .. }) if table == "app_logs"
        ));
        assert_eq!(seen.lock().unwrap().last(), Some(&SyncStatus::Error));
        // Entries stay synced, logs and settings remain dirty for the next pass.
        assert!(h.store.get_unsynced::<VehicleEntry>(CollectionKey::Entries).await.unwrap().is_empty());
        assert!(!h.store.get_unsynced::<AppLog>(CollectionKey::Logs).await.unwrap().is_empty());
        assert!(!h.settings.get().await.unwrap().meta.synced);
        assert!(!h.remote.upserted_tables().contains(&"app_settings".to_string()));

        h.remote.heal();
        h.remote.clear_calls();
        let retry = h.service.sync_all(None).await;
        assert!(retry.success);
        assert!(retry.stats.settings_pushed);
        assert_eq!(h.remote.upserted_tables(), vec!["app_logs", "app_settings"]);
    }

    #[tokio::test]
    async fn settings_upsert_is_keyed_by_account() {
        let h = harness(MockRemoteBackend::with_identity("user-9"));
        let mut settings = h.settings.get().await.unwrap();
        settings.company_name = "Condomínio Aurora".to_string();
        h.settings.save(settings).await.unwrap();

        h.service.sync_all(None).await;
        let settings_call = h
            .remote
            .calls()
            .into_iter()
            .find_map(|c| match c {
                RemoteCall::Upsert { table, rows, on_conflict } if table == "app_settings" => Some((rows, on_conflict)),
                _ => None,
            })
            .unwrap();
        assert_eq!(settings_call.1.as_deref(), Some("user_id"));
        assert_eq!(settings_call.0[0]["user_id"], "user-9");
        assert!(h.settings.get().await.unwrap().meta.synced);

        // Already synced settings are skipped.
        h.remote.clear_calls();
        h.service.sync_all(None).await;
        assert!(!h.remote.upserted_tables().contains(&"app_settings".to_string()));
    }

    #[tokio::test]
    async fn work_shifts_are_never_pushed() {
        let h = harness(MockRemoteBackend::with_identity("user-1"));
        let shifts = crate::domains::shift::ShiftRepository::new(h.store.clone(), h.audit.clone());
        shifts
            .record_clock_event("Carlos", crate::domains::shift::ClockEvent::ClockIn)
            .await
            .unwrap();

        h.service.sync_all(None).await;
        assert_eq!(h.remote.upserted_tables(), vec!["app_logs"]);
    }

    #[tokio::test]
    async fn record_edited_while_its_push_is_in_flight_stays_dirty() {
        let h = harness(MockRemoteBackend::with_identity("user-1"));
        h.store.add(CollectionKey::Entries, sample_entry("A1", "João", "ABC-1234")).await.unwrap();
        let gate = h.remote.hold_upserts_to("vehicle_entries");

        let pass = {
            let service = h.service.clone();
            tokio::spawn(async move { service.sync_all(None).await })
        };
        gate.entered.notified().await;
        h.store
            .update_where(
                CollectionKey::Entries,
                |e: &VehicleEntry| e.id == "A1",
                |e| e.company = "Transportes Norte".to_string(),
            )
            .await
            .unwrap();
        gate.release.notify_one();

        let outcome = pass.await.unwrap();
        assert!(outcome.success);
        let sent = h
            .remote
            .calls()
            .into_iter()
            .find_map(|c| match c {
                RemoteCall::Upsert { table, rows, .. } if table == "vehicle_entries" => Some(rows),
                _ => None,
            })
            .unwrap();
        assert_eq!(sent[0]["company"], "Transportes Silva");

        let dirty = h.store.get_unsynced::<VehicleEntry>(CollectionKey::Entries).await.unwrap();
        assert_eq!(dirty.len(), 1);
        assert_eq!(dirty[0].company, "Transportes Norte");
    }

    #[tokio::test]
    async fn undecodable_dirty_records_are_reported_and_kept() {
        let h = harness(MockRemoteBackend::with_identity("user-1"));
        h.store
            .modify_raw(CollectionKey::Entries.storage_key(), |values| {
                values.push(serde_json::json!({ "id": "X", "volumes": "3", "synced": false }));
                Change::Write(())
            })
            .await
            .unwrap();
        h.store.add(CollectionKey::Entries, sample_entry("A1", "João", "ABC-1234")).await.unwrap();

        let outcome = h.service.sync_all(None).await;
        assert!(outcome.success);
        assert_eq!(outcome.stats.unreadable["entries"], 1);
        assert_eq!(outcome.stats.pushed["entries"], 1);
        assert!(outcome.message.contains("1 unreadable"));

        let stored = h.store.load_list::<serde_json::Value>(CollectionKey::Entries.storage_key()).await.unwrap();
        let x = stored.iter().find(|v| v["id"] == "X").unwrap();
        assert_eq!(x["synced"], false);
    }

    #[tokio::test]
    async fn concurrent_pass_is_refused() {
        let h = harness(MockRemoteBackend::with_identity("user-1"));
        h.remote.set_identity_delay(Duration::from_millis(200));

        let first = {
            let service = h.service.clone();
            tokio::spawn(async move { service.sync_all(None).await })
        };
        tokio::time::sleep(Duration::from_millis(20)).await;

        let second = h.service.sync_all(None).await;
        assert!(matches!(second.error, Some(SyncError::AlreadyRunning)));

        let first = first.await.unwrap();
        assert!(first.success);
        let identity_calls = h.remote.calls().iter().filter(|c| **c == RemoteCall::Identity).count();
        assert_eq!(identity_calls, 1);
    }
}
