use crate::domains::audit::{AuditLog, LogModule};
use crate::domains::breakfast::types::{BreakfastRecord, BreakfastStatus};
use crate::domains::core::collection::CollectionStore;
use crate::domains::core::repository::{AddOutcome, CollectionKey, DeleteOutcome, UpdateOutcome};
use crate::domains::deletion_queue::DeletionQueue;
use crate::errors::DomainResult;
use crate::validation::Validate;
use chrono::NaiveDate;
use std::sync::Arc;

pub struct BreakfastRepository {
    store: Arc<CollectionStore>,
    audit: Arc<AuditLog>,
    deletions: Arc<DeletionQueue>,
}

impl BreakfastRepository {
    pub fn new(store: Arc<CollectionStore>, audit: Arc<AuditLog>, deletions: Arc<DeletionQueue>) -> Self {
        Self { store, audit, deletions }
    }

    pub async fn get_all(&self) -> DomainResult<Vec<BreakfastRecord>> {
        self.store.get_all(CollectionKey::Breakfast).await
    }

    pub async fn by_date(&self, date: NaiveDate) -> DomainResult<Vec<BreakfastRecord>> {
        Ok(self.get_all().await?.into_iter().filter(|r| r.date == date).collect())
    }

    pub async fn add(&self, record: BreakfastRecord) -> DomainResult<AddOutcome<BreakfastRecord>> {
        record.validate()?;
        let outcome = self.store.add(CollectionKey::Breakfast, record).await?;
        if let AddOutcome::Added(stored) = &outcome {
            self.audit
                .append(
                    LogModule::Breakfast,
                    "Breakfast added",
                    Some(&stored.id),
                    Some(format!("{} ({})", stored.person_name, stored.date)),
                )
                .await;
        }
        Ok(outcome)
    }

    pub async fn update(&self, record: BreakfastRecord) -> DomainResult<UpdateOutcome<BreakfastRecord>> {
        record.validate()?;
        let Some((_, stored)) = self.store.replace(CollectionKey::Breakfast, record).await? else {
            return Ok(UpdateOutcome::NotFound);
        };
        self.audit
            .append(
                LogModule::Breakfast,
                "Breakfast updated",
                Some(&stored.id),
                Some(stored.person_name.clone()),
            )
            .await;
        Ok(UpdateOutcome::Updated(stored))
    }

    pub async fn mark_delivered(&self, id: &str, operator: &str) -> DomainResult<UpdateOutcome<BreakfastRecord>> {
        let now = self.store.now();
        let mut updated = self
            .store
            .update_where(
                CollectionKey::Breakfast,
                |r: &BreakfastRecord| r.id == id,
                |r: &mut BreakfastRecord| {
                    r.status = BreakfastStatus::Delivered;
                    r.delivered_at = Some(now);
                    r.operator_name = Some(operator.to_string());
                },
            )
            .await?;
        let Some(stored) = updated.pop() else {
            return Ok(UpdateOutcome::NotFound);
        };
        self.audit
            .append(
                LogModule::Breakfast,
                "Breakfast delivered",
                Some(&stored.id),
                Some(stored.person_name.clone()),
            )
            .await;
        Ok(UpdateOutcome::Updated(stored))
    }

    pub async fn delete(&self, id: &str) -> DomainResult<DeleteOutcome<BreakfastRecord>> {
        let mut removed = self
            .store
            .remove_where(CollectionKey::Breakfast, |r: &BreakfastRecord| r.id == id)
            .await?;
        let Some(record) = removed.pop() else {
            return Ok(DeleteOutcome::NotFound);
        };
        self.deletions.enqueue_removed(CollectionKey::Breakfast, &[record.id.clone()]).await?;
        self.audit
            .append(
                LogModule::Breakfast,
                "Breakfast removed",
                Some(&record.id),
                Some(record.person_name.clone()),
            )
            .await;
        Ok(DeleteOutcome::Deleted(record))
    }

    /// Remove the whole list for `date`. Returns how many records went.
    pub async fn clear_by_date(&self, date: NaiveDate) -> DomainResult<usize> {
        let removed = self
            .store
            .remove_where(CollectionKey::Breakfast, |r: &BreakfastRecord| r.date == date)
            .await?;
        if removed.is_empty() {
            return Ok(0);
        }
        let ids: Vec<String> = removed.iter().map(|r| r.id.clone()).collect();
        self.deletions.enqueue_removed(CollectionKey::Breakfast, &ids).await?;
        self.audit
            .append(
                LogModule::Breakfast,
                "Breakfast list cleared",
                None,
                Some(format!("{}: {} records", date, removed.len())),
            )
            .await;
        Ok(removed.len())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domains::breakfast::types::{BreakfastOrigin, BreakfastType};
    use crate::domains::core::collection::test_support::memory_store;
    use crate::domains::core::repository::SyncMeta;

    fn record(id: &str, name: &str, date: &str) -> BreakfastRecord {
        BreakfastRecord {
            id: id.to_string(),
            person_name: name.to_string(),
            breakfast_type: BreakfastType::Fruit,
            status: BreakfastStatus::Pending,
            delivered_at: None,
            operator_name: None,
            date: date.parse().unwrap(),
            observations: None,
            origin: BreakfastOrigin::Manual,
            meta: SyncMeta::default(),
        }
    }

    fn repo() -> (BreakfastRepository, Arc<DeletionQueue>) {
        let (store, _, _) = memory_store();
        let audit = Arc::new(AuditLog::new(store.clone()));
        let deletions = Arc::new(DeletionQueue::new(store.clone()));
        (BreakfastRepository::new(store, audit, deletions.clone()), deletions)
    }

    #[tokio::test]
    async fn mark_delivered_stamps_operator_and_time() {
        let (repo, _) = repo();
        repo.add(record("B1", "Ana", "2025-03-10")).await.unwrap();

        let stored = repo.mark_delivered("B1", "Carlos").await.unwrap().into_option().unwrap();
        assert_eq!(stored.status, BreakfastStatus::Delivered);
        assert_eq!(stored.operator_name.as_deref(), Some("Carlos"));
        assert_eq!(stored.delivered_at.unwrap().to_rfc3339(), "2025-03-10T08:00:00+00:00");
        assert!(!stored.meta.synced);

        assert!(repo.mark_delivered("missing", "Carlos").await.unwrap().is_not_found());
    }

    #[tokio::test]
    async fn delete_queues_one_remote_deletion() {
        let (repo, deletions) = repo();
        repo.add(record("B1", "Ana", "2025-03-10")).await.unwrap();

        assert!(repo.delete("B1").await.unwrap().is_deleted());
        assert!(repo.delete("B1").await.unwrap().is_not_found());

        let queued = deletions.drain().await.unwrap();
        assert_eq!(queued.len(), 1);
        assert_eq!((queued[0].id.as_str(), queued[0].table.as_str()), ("B1", "breakfast_list"));
        assert!(repo.get_all().await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn clear_by_date_only_touches_that_day() {
        let (repo, deletions) = repo();
        repo.add(record("B1", "Ana", "2025-03-10")).await.unwrap();
        repo.add(record("B2", "Rui", "2025-03-10")).await.unwrap();
        repo.add(record("B3", "Lia", "2025-03-11")).await.unwrap();

        let cleared = repo.clear_by_date("2025-03-10".parse().unwrap()).await.unwrap();
        assert_eq!(cleared, 2);
        assert_eq!(repo.get_all().await.unwrap().len(), 1);

        let grouped = deletions.grouped_by_table().await.unwrap();
        assert_eq!(grouped.len(), 1);
        assert_eq!(grouped["breakfast_list"], vec!["B1".to_string(), "B2".to_string()]);
        assert_eq!(deletions.len().await.unwrap(), 2);
    }

    #[tokio::test]
    async fn wire_format_uses_portuguese_values() {
        let json = serde_json::to_value(record("B1", "Ana", "2025-03-10")).unwrap();
        assert_eq!(json["breakfastType"], "Fruta");
        assert_eq!(json["status"], "Pendente");
        assert_eq!(json["origin"], "Manual");
        assert_eq!(json["date"], "2025-03-10");
    }
}
