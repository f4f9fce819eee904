use crate::domains::audit::{AuditLog, LogModule};
use crate::domains::core::collection::CollectionStore;
use crate::domains::core::repository::{AddOutcome, CollectionKey, DeleteOutcome, UpdateOutcome};
use crate::domains::deletion_queue::DeletionQueue;
use crate::domains::patrol::types::{duration_in_minutes, PatrolRecord, PatrolStatus};
use crate::errors::DomainResult;
use crate::validation::Validate;
use std::sync::Arc;

pub struct PatrolRepository {
    store: Arc<CollectionStore>,
    audit: Arc<AuditLog>,
    deletions: Arc<DeletionQueue>,
}

impl PatrolRepository {
    pub fn new(store: Arc<CollectionStore>, audit: Arc<AuditLog>, deletions: Arc<DeletionQueue>) -> Self {
        Self { store, audit, deletions }
    }

    pub async fn get_all(&self) -> DomainResult<Vec<PatrolRecord>> {
        self.store.get_all(CollectionKey::Patrols).await
    }

    pub async fn find(&self, id: &str) -> DomainResult<Option<PatrolRecord>> {
        self.store.find(CollectionKey::Patrols, id).await
    }

    /// Open a new round.
    pub async fn start(&self, mut patrol: PatrolRecord) -> DomainResult<AddOutcome<PatrolRecord>> {
        patrol.validate()?;
        if patrol.registered_at.is_none() {
            patrol.registered_at = Some(self.store.now());
        }
        let outcome = self.store.add(CollectionKey::Patrols, patrol).await?;
        if let AddOutcome::Added(stored) = &outcome {
            self.audit
                .append(
                    LogModule::Patrols,
                    "Patrol started",
                    Some(&stored.id),
                    Some(stored.guard_name.clone()),
                )
                .await;
        }
        Ok(outcome)
    }

    pub async fn update(&self, patrol: PatrolRecord) -> DomainResult<UpdateOutcome<PatrolRecord>> {
        patrol.validate()?;
        let Some((_, stored)) = self.store.replace(CollectionKey::Patrols, patrol).await? else {
            return Ok(UpdateOutcome::NotFound);
        };
        self.audit
            .append(
                LogModule::Patrols,
                "Patrol updated",
                Some(&stored.id),
                Some(format!("{} photos", stored.photos.len())),
            )
            .await;
        Ok(UpdateOutcome::Updated(stored))
    }

    /// Close a round, computing its duration from the start time.
    pub async fn finish(&self, id: &str, notes: Option<String>) -> DomainResult<UpdateOutcome<PatrolRecord>> {
        let now = self.store.now();
        let mut updated = self
            .store
            .update_where(
                CollectionKey::Patrols,
                |p: &PatrolRecord| p.id == id,
                |p: &mut PatrolRecord| {
                    p.status = PatrolStatus::Completed;
                    p.finished_at = Some(now);
                    p.duration_minutes = Some(duration_in_minutes(p.started_at, now));
                    if let Some(notes) = &notes {
                        p.notes = notes.clone();
                    }
                },
            )
            .await?;
        let Some(stored) = updated.pop() else {
            return Ok(UpdateOutcome::NotFound);
        };
        self.audit
            .append(
                LogModule::Patrols,
                "Patrol completed",
                Some(&stored.id),
                Some(format!("{} min", stored.duration_minutes.unwrap_or(0))),
            )
            .await;
        Ok(UpdateOutcome::Updated(stored))
    }

    pub async fn delete(&self, id: &str) -> DomainResult<DeleteOutcome<PatrolRecord>> {
        let mut removed = self
            .store
            .remove_where(CollectionKey::Patrols, |p: &PatrolRecord| p.id == id)
            .await?;
        let Some(patrol) = removed.pop() else {
            return Ok(DeleteOutcome::NotFound);
        };
        self.deletions.enqueue_removed(CollectionKey::Patrols, &[patrol.id.clone()]).await?;
        self.audit
            .append(LogModule::Patrols, "Patrol deleted", Some(&patrol.id), None)
            .await;
        Ok(DeleteOutcome::Deleted(patrol))
    }
}
