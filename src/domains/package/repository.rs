use crate::domains::audit::{AuditLog, LogModule};
use crate::domains::core::collection::CollectionStore;
use crate::domains::core::repository::{AddOutcome, CollectionKey, DeleteOutcome, UpdateOutcome};
use crate::domains::deletion_queue::DeletionQueue;
use crate::domains::package::types::{PackageRecord, PackageStatus, PickupType};
use crate::errors::DomainResult;
use crate::validation::Validate;
use std::sync::Arc;

pub struct PackageRepository {
    store: Arc<CollectionStore>,
    audit: Arc<AuditLog>,
    deletions: Arc<DeletionQueue>,
}

impl PackageRepository {
    pub fn new(store: Arc<CollectionStore>, audit: Arc<AuditLog>, deletions: Arc<DeletionQueue>) -> Self {
        Self { store, audit, deletions }
    }

    pub async fn get_all(&self) -> DomainResult<Vec<PackageRecord>> {
        self.store.get_all(CollectionKey::Packages).await
    }

    pub async fn find(&self, id: &str) -> DomainResult<Option<PackageRecord>> {
        self.store.find(CollectionKey::Packages, id).await
    }

    pub async fn add(&self, package: PackageRecord) -> DomainResult<AddOutcome<PackageRecord>> {
        package.validate()?;
        let outcome = self.store.add(CollectionKey::Packages, package).await?;
        if let AddOutcome::Added(stored) = &outcome {
            self.audit
                .append(
                    LogModule::Packages,
                    "Package received",
                    Some(&stored.id),
                    Some(format!("For {} via {}", stored.recipient_name, stored.delivery_company)),
                )
                .await;
        }
        Ok(outcome)
    }

    pub async fn update(&self, package: PackageRecord) -> DomainResult<UpdateOutcome<PackageRecord>> {
        package.validate()?;
        let Some((previous, stored)) = self.store.replace(CollectionKey::Packages, package).await? else {
            return Ok(UpdateOutcome::NotFound);
        };
        if previous.status != PackageStatus::Delivered && stored.status == PackageStatus::Delivered {
            let picked_by = stored.delivered_to.as_deref().unwrap_or("?");
            self.audit
                .append(
                    LogModule::Packages,
                    "Package marked as delivered",
                    Some(&stored.id),
                    Some(format!("Picked up by {}", picked_by)),
                )
                .await;
        } else {
            self.audit
                .append(
                    LogModule::Packages,
                    "Package updated",
                    Some(&stored.id),
                    Some(stored.recipient_name.clone()),
                )
                .await;
        }
        Ok(UpdateOutcome::Updated(stored))
    }

    /// Hand the parcel over to `delivered_to`.
    pub async fn mark_delivered(
        &self,
        id: &str,
        delivered_to: &str,
        pickup_type: PickupType,
    ) -> DomainResult<UpdateOutcome<PackageRecord>> {
        let Some(mut package) = self.find(id).await? else {
            return Ok(UpdateOutcome::NotFound);
        };
        package.status = PackageStatus::Delivered;
        package.delivered_at = Some(self.store.now());
        package.delivered_to = Some(delivered_to.to_string());
        package.pickup_type = Some(pickup_type);
        self.update(package).await
    }

    pub async fn delete(&self, id: &str) -> DomainResult<DeleteOutcome<PackageRecord>> {
        let mut removed = self
            .store
            .remove_where(CollectionKey::Packages, |p: &PackageRecord| p.id == id)
            .await?;
        let Some(package) = removed.pop() else {
            return Ok(DeleteOutcome::NotFound);
        };
        self.deletions.enqueue_removed(CollectionKey::Packages, &[package.id.clone()]).await?;
        self.audit
            .append(
                LogModule::Packages,
                "Package deleted",
                Some(&package.id),
                Some(package.recipient_name.clone()),
            )
            .await;
        Ok(DeleteOutcome::Deleted(package))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domains::core::collection::test_support::memory_store;
    use crate::domains::core::repository::SyncMeta;
    use crate::errors::DomainError;

    fn package(id: &str) -> PackageRecord {
        PackageRecord {
            id: id.to_string(),
            delivery_company: "Correios".to_string(),
            recipient_name: "Fernanda".to_string(),
            description: Some("Caixa pequena".to_string()),
            operator_name: "Carlos".to_string(),
            received_at: "2025-03-10T07:30:00Z".parse().unwrap(),
            status: PackageStatus::Awaiting,
            delivered_at: None,
            delivered_to: None,
            pickup_type: None,
            photo: Some("data:image/jpeg;base64,AAAA".to_string()),
            meta: SyncMeta::default(),
        }
    }

    fn repo() -> (PackageRepository, Arc<AuditLog>) {
        let (store, _, _) = memory_store();
        let audit = Arc::new(AuditLog::new(store.clone()));
        let deletions = Arc::new(DeletionQueue::new(store.clone()));
        (PackageRepository::new(store, audit.clone(), deletions), audit)
    }

    #[tokio::test]
    async fn delivery_is_logged_with_picker() {
        let (repo, audit) = repo();
        repo.add(package("P1")).await.unwrap();

        let stored = repo
            .mark_delivered("P1", "Fernanda", PickupType::SelfPickup)
            .await
            .unwrap()
            .into_option()
            .unwrap();
        assert_eq!(stored.status, PackageStatus::Delivered);
        assert!(stored.delivered_at.is_some());

        let latest = &audit.recent(1).await.unwrap()[0];
        assert_eq!(latest.action, "Package marked as delivered");
        assert_eq!(latest.details.as_deref(), Some("Picked up by Fernanda"));
    }

    #[tokio::test]
    async fn delivered_status_requires_a_picker() {
        let (repo, _) = repo();
        repo.add(package("P1")).await.unwrap();
        let mut changed = package("P1");
        changed.status = PackageStatus::Delivered;
        let err = repo.update(changed).await.unwrap_err();
        assert!(matches!(err, DomainError::Validation(_)));
        assert_eq!(repo.find("P1").await.unwrap().unwrap().status, PackageStatus::Awaiting);
    }

    #[tokio::test]
    async fn delete_queues_one_remote_deletion() {
        let (store, _, _) = memory_store();
        let audit = Arc::new(AuditLog::new(store.clone()));
        let deletions = Arc::new(DeletionQueue::new(store.clone()));
        let repo = PackageRepository::new(store, audit, deletions.clone());
        repo.add(package("P1")).await.unwrap();

        assert!(repo.delete("P1").await.unwrap().is_deleted());
        assert!(repo.delete("P1").await.unwrap().is_not_found());

        let queued = deletions.drain().await.unwrap();
        assert_eq!(queued.len(), 1);
        assert_eq!((queued[0].id.as_str(), queued[0].table.as_str()), ("P1", "packages"));
        assert!(repo.find("P1").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn photo_survives_local_storage() {
        let (repo, _) = repo();
        repo.add(package("P1")).await.unwrap();
        let stored = repo.find("P1").await.unwrap().unwrap();
        assert_eq!(stored.photo.as_deref(), Some("data:image/jpeg;base64,AAAA"));
        let json = serde_json::to_value(&stored).unwrap();
        assert_eq!(json["status"], "Aguardando retirada");
    }
}
