use crate::domains::audit::{AuditLog, LogModule};
use crate::domains::core::collection::CollectionStore;
use crate::domains::core::repository::{AddOutcome, CollectionKey, DeleteOutcome, UpdateOutcome};
use crate::domains::deletion_queue::DeletionQueue;
use crate::domains::entry::types::{ProfilePatch, VehicleEntry, VisitorProfile};
use crate::errors::DomainResult;
use crate::validation::Validate;
use std::collections::HashMap;
use std::sync::Arc;

/// Gate entries and the profile-wide corrections over them.
pub struct EntryRepository {
    store: Arc<CollectionStore>,
    audit: Arc<AuditLog>,
    deletions: Arc<DeletionQueue>,
}

impl EntryRepository {
    pub fn new(store: Arc<CollectionStore>, audit: Arc<AuditLog>, deletions: Arc<DeletionQueue>) -> Self {
        Self { store, audit, deletions }
    }

    pub async fn get_all(&self) -> DomainResult<Vec<VehicleEntry>> {
        self.store.get_all(CollectionKey::Entries).await
    }

    pub async fn find(&self, id: &str) -> DomainResult<Option<VehicleEntry>> {
        self.store.find(CollectionKey::Entries, id).await
    }

    /// Register an entry. An id that is already stored leaves the collection untouched.
    pub async fn add(&self, mut entry: VehicleEntry) -> DomainResult<AddOutcome<VehicleEntry>> {
        entry.validate()?;
        if entry.registered_at.is_none() {
            entry.registered_at = Some(self.store.now());
        }
        let outcome = self.store.add(CollectionKey::Entries, entry).await?;
        if let AddOutcome::Added(stored) = &outcome {
            self.audit
                .append(
                    LogModule::Gatehouse,
                    "New entry registered",
                    Some(&stored.id),
                    Some(format!("{} ({})", stored.driver_name, stored.status)),
                )
                .await;
        }
        Ok(outcome)
    }

    pub async fn update(&self, entry: VehicleEntry) -> DomainResult<UpdateOutcome<VehicleEntry>> {
        entry.validate()?;
        let Some((previous, stored)) = self.store.replace(CollectionKey::Entries, entry).await? else {
            return Ok(UpdateOutcome::NotFound);
        };
        let details = if previous.status != stored.status {
            format!("Status: {} -> {}", previous.status, stored.status)
        } else {
            format!("Entry for {} edited", stored.driver_name)
        };
        self.audit
            .append(LogModule::Gatehouse, "Entry updated", Some(&stored.id), Some(details))
            .await;
        Ok(UpdateOutcome::Updated(stored))
    }

    pub async fn delete(&self, id: &str) -> DomainResult<DeleteOutcome<VehicleEntry>> {
        let mut removed = self
            .store
            .remove_where(CollectionKey::Entries, |e: &VehicleEntry| e.id == id)
            .await?;
        let Some(entry) = removed.pop() else {
            return Ok(DeleteOutcome::NotFound);
        };
        self.deletions.enqueue_removed(CollectionKey::Entries, &[entry.id.clone()]).await?;
        self.audit
            .append(
                LogModule::Gatehouse,
                "Entry deleted",
                Some(&entry.id),
                Some(entry.driver_name.clone()),
            )
            .await;
        Ok(DeleteOutcome::Deleted(entry))
    }

    /// Remove every entry of a visitor. Each removed id is queued for remote deletion.
    pub async fn delete_by_profile(&self, name: &str, plate: &str) -> DomainResult<usize> {
        let removed = self
            .store
            .remove_where(CollectionKey::Entries, |e: &VehicleEntry| e.matches_profile(name, plate))
            .await?;
        if removed.is_empty() {
            return Ok(0);
        }
        let ids: Vec<String> = removed.iter().map(|e| e.id.clone()).collect();
        self.deletions.enqueue_removed(CollectionKey::Entries, &ids).await?;
        self.audit
            .append(
                LogModule::Gatehouse,
                "Profile history deleted",
                None,
                Some(format!("{} / {}: {} records", name, plate, removed.len())),
            )
            .await;
        Ok(removed.len())
    }

    /// Apply `patch` to every entry of a visitor.
    pub async fn update_by_profile(&self, name: &str, plate: &str, patch: &ProfilePatch) -> DomainResult<usize> {
        if patch.is_empty() {
            return Ok(0);
        }
        let updated = self
            .store
            .update_where(
                CollectionKey::Entries,
                |e: &VehicleEntry| e.matches_profile(name, plate),
                |e| patch.apply(e),
            )
            .await?;
        if !updated.is_empty() {
            self.audit
                .append(
                    LogModule::Gatehouse,
                    "Profile updated",
                    None,
                    Some(format!("{} / {}: {} records", name, plate, updated.len())),
                )
                .await;
        }
        Ok(updated.len())
    }

    /// Distinct visitors, most recently seen first.
    pub async fn unique_profiles(&self) -> DomainResult<Vec<VisitorProfile>> {
        let mut entries = self.get_all().await?;
        entries.sort_by(|a, b| seen_at(b).cmp(&seen_at(a)));

        let mut order: Vec<(String, String)> = Vec::new();
        let mut profiles: HashMap<(String, String), VisitorProfile> = HashMap::new();
        for entry in entries {
            let plate_or_document = entry
                .vehicle_plate
                .as_deref()
                .filter(|p| !p.trim().is_empty())
                .or(entry.document_number.as_deref())
                .unwrap_or("")
                .trim()
                .to_lowercase();
            let key = (entry.driver_name.trim().to_lowercase(), plate_or_document);
            if let Some(profile) = profiles.get_mut(&key) {
                profile.visits += 1;
                continue;
            }
            order.push(key.clone());
            profiles.insert(
                key,
                VisitorProfile {
                    driver_name: entry.driver_name.clone(),
                    company: entry.company.clone(),
                    vehicle_plate: entry.vehicle_plate.clone(),
                    document_number: entry.document_number.clone(),
                    access_type: entry.access_type,
                    last_seen: seen_at(&entry),
                    visits: 1,
                },
            );
        }
        Ok(order.into_iter().filter_map(|key| profiles.remove(&key)).collect())
    }
}

fn seen_at(entry: &VehicleEntry) -> Option<chrono::DateTime<chrono::Utc>> {
    entry.registered_at.or(entry.meta.created_at)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domains::core::collection::test_support::memory_store;
    use crate::domains::entry::types::{sample_entry, EntryStatus};
    use crate::errors::DomainError;

    fn repo() -> (EntryRepository, Arc<DeletionQueue>, Arc<AuditLog>, Arc<crate::utils::clock::MockClock>) {
        let (store, _, clock) = memory_store();
        let audit = Arc::new(AuditLog::new(store.clone()));
        let deletions = Arc::new(DeletionQueue::new(store.clone()));
        (
            EntryRepository::new(store, audit.clone(), deletions.clone()),
            deletions,
            audit,
            clock,
        )
    }

    #[tokio::test]
    async fn add_then_mark_synced_scenario() {
        let (repo, _, _, _) = repo();
        repo.add(sample_entry("A1", "João", "ABC-1234")).await.unwrap();

        let all = repo.get_all().await.unwrap();
        assert_eq!(all.len(), 1);
        assert!(!all[0].meta.synced);

        repo.store
            .mark_as_synced(CollectionKey::Entries, &["A1".to_string()])
            .await
            .unwrap();
        assert!(repo.get_all().await.unwrap()[0].meta.synced);
    }

    #[tokio::test]
    async fn duplicate_id_is_ignored() {
        let (repo, _, audit, _) = repo();
        assert!(repo.add(sample_entry("A1", "João", "ABC-1234")).await.unwrap().was_added());
        assert!(!repo.add(sample_entry("A1", "Outro", "XYZ-0000")).await.unwrap().was_added());
        assert_eq!(repo.get_all().await.unwrap().len(), 1);
        assert_eq!(audit.get_all().await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn invalid_entry_is_rejected_without_writes() {
        let (repo, _, _, _) = repo();
        let err = repo.add(sample_entry("A1", " ", "ABC-1234")).await.unwrap_err();
        assert!(matches!(err, DomainError::Validation(_)));
        assert!(repo.get_all().await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn update_logs_status_transition_and_dirties_record() {
        let (repo, _, audit, clock) = repo();
        repo.add(sample_entry("A1", "João", "ABC-1234")).await.unwrap();
        repo.store
            .mark_as_synced(CollectionKey::Entries, &["A1".to_string()])
            .await
            .unwrap();

        clock.advance(chrono::Duration::minutes(2));
        let mut changed = repo.find("A1").await.unwrap().unwrap();
        changed.status = EntryStatus::Authorized;
        let stored = repo.update(changed).await.unwrap().into_option().unwrap();
        assert!(!stored.meta.synced);

        let latest = audit.recent(1).await.unwrap();
        assert_eq!(latest[0].details.as_deref(), Some("Status: Pendente -> Autorizado"));
    }

    #[tokio::test]
    async fn update_of_missing_id_reports_not_found() {
        let (repo, _, _, _) = repo();
        let outcome = repo.update(sample_entry("nope", "João", "ABC-1234")).await.unwrap();
        assert!(outcome.is_not_found());
        assert!(repo.get_all().await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn delete_enqueues_exactly_once() {
        let (repo, deletions, _, _) = repo();
        repo.add(sample_entry("A1", "João", "ABC-1234")).await.unwrap();

        assert!(repo.delete("A1").await.unwrap().is_deleted());
        assert!(!repo.delete("A1").await.unwrap().is_deleted());

        assert!(repo.get_all().await.unwrap().is_empty());
        let queued = deletions.drain().await.unwrap();
        assert_eq!(queued.len(), 1);
        assert_eq!(queued[0].id, "A1");
        assert_eq!(queued[0].table, "vehicle_entries");
    }

    #[tokio::test]
    async fn update_by_profile_fans_out_case_insensitively() {
        let (repo, _, _, _) = repo();
        repo.add(sample_entry("A", "João Souza", "ABC-1234")).await.unwrap();
        repo.add(sample_entry("B", "joão souza", "abc-1234")).await.unwrap();
        repo.add(sample_entry("C", "João Souza", "XYZ-0000")).await.unwrap();

        let patch = ProfilePatch {
            company: Some("X".to_string()),
            ..Default::default()
        };
        let count = repo.update_by_profile("JOÃO SOUZA", "Abc-1234", &patch).await.unwrap();
        assert_eq!(count, 2);

        let all = repo.get_all().await.unwrap();
        let companies: Vec<(&str, &str)> = all.iter().map(|e| (e.id.as_str(), e.company.as_str())).collect();
        assert_eq!(companies, vec![("A", "X"), ("B", "X"), ("C", "Transportes Silva")]);
    }

    #[tokio::test]
    async fn delete_by_profile_enqueues_every_id() {
        let (repo, deletions, _, _) = repo();
        repo.add(sample_entry("A", "Maria", "AAA-1111")).await.unwrap();
        repo.add(sample_entry("B", "MARIA", "aaa-1111")).await.unwrap();
        repo.add(sample_entry("C", "Pedro", "AAA-1111")).await.unwrap();

        assert_eq!(repo.delete_by_profile("maria", "AAA-1111").await.unwrap(), 2);
        let remaining: Vec<String> = repo.get_all().await.unwrap().into_iter().map(|e| e.id).collect();
        assert_eq!(remaining, vec!["C"]);

        let mut queued: Vec<String> = deletions.drain().await.unwrap().into_iter().map(|d| d.id).collect();
        queued.sort();
        assert_eq!(queued, vec!["A", "B"]);
    }

    #[tokio::test]
    async fn unique_profiles_newest_first() {
        let (repo, _, _, clock) = repo();
        repo.add(sample_entry("A", "Maria", "AAA-1111")).await.unwrap();
        clock.advance(chrono::Duration::minutes(1));
        repo.add(sample_entry("B", "Pedro", "BBB-2222")).await.unwrap();
        clock.advance(chrono::Duration::minutes(1));
        repo.add(sample_entry("C", "maria", "aaa-1111")).await.unwrap();

        let profiles = repo.unique_profiles().await.unwrap();
        assert_eq!(profiles.len(), 2);
        assert_eq!(profiles[0].driver_name, "maria");
        assert_eq!(profiles[0].visits, 2);
        assert_eq!(profiles[1].driver_name, "Pedro");
    }
}
