use crate::domains::audit::{AuditLog, LogModule};
use crate::domains::core::collection::{Change, CollectionStore};
use crate::domains::core::repository::{AddOutcome, CollectionKey, DeleteOutcome, UpdateOutcome};
use crate::domains::deletion_queue::DeletionQueue;
use crate::domains::meter::types::{Meter, MeterReading};
use crate::errors::{DomainError, DomainResult, ValidationError};
use crate::utils::id::{needs_id, new_record_id};
use crate::validation::Validate;
use std::sync::Arc;

/// Meters and their reading history.
pub struct MeterRepository {
    store: Arc<CollectionStore>,
    audit: Arc<AuditLog>,
    deletions: Arc<DeletionQueue>,
}

impl MeterRepository {
    pub fn new(store: Arc<CollectionStore>, audit: Arc<AuditLog>, deletions: Arc<DeletionQueue>) -> Self {
        Self { store, audit, deletions }
    }

    pub async fn get_meters(&self) -> DomainResult<Vec<Meter>> {
        self.store.get_all(CollectionKey::Meters).await
    }

    pub async fn get_readings(&self) -> DomainResult<Vec<MeterReading>> {
        self.store.get_all(CollectionKey::MeterReadings).await
    }

    /// Register a meter. Names are unique, ignoring case.
    pub async fn add_meter(&self, mut meter: Meter) -> DomainResult<Meter> {
        meter.validate()?;
        if needs_id(&meter.id) {
            meter.id = new_record_id();
        }
        let now = self.store.now();
        if meter.registered_at.is_none() {
            meter.registered_at = Some(now);
        }
        let stored = self
            .store
            .modify(CollectionKey::Meters, move |meters: &mut Vec<Meter>| {
                if meters.iter().any(|m| m.has_name(&meter.name)) {
                    return Change::Skip(Err(ValidationError::unique("name")));
                }
                if let Some(existing) = meters.iter().find(|m| m.id == meter.id) {
                    return Change::Skip(Ok(AddOutcome::AlreadyExists(existing.clone())));
                }
                meter.meta.stamp_created(now);
                meters.push(meter.clone());
                Change::Write(Ok(AddOutcome::Added(meter)))
            })
            .await??;

        if let AddOutcome::Added(meter) = &stored {
            self.audit
                .append(LogModule::Meters, "Meter registered", Some(&meter.id), Some(meter.name.clone()))
                .await;
        }
        Ok(stored.into_record())
    }

    pub async fn update_meter(&self, meter: Meter) -> DomainResult<UpdateOutcome<Meter>> {
        meter.validate()?;
        let clash = self
            .get_meters()
            .await?
            .iter()
            .any(|m| m.id != meter.id && m.has_name(&meter.name));
        if clash {
            return Err(ValidationError::unique("name").into());
        }
        let Some((_, stored)) = self.store.replace(CollectionKey::Meters, meter).await? else {
            return Ok(UpdateOutcome::NotFound);
        };
        self.audit
            .append(LogModule::Meters, "Meter updated", Some(&stored.id), Some(stored.name.clone()))
            .await;
        Ok(UpdateOutcome::Updated(stored))
    }

    /// Remove a meter. Its readings stay so that history is not lost.
    pub async fn delete_meter(&self, id: &str) -> DomainResult<DeleteOutcome<Meter>> {
        let mut removed = self
            .store
            .remove_where(CollectionKey::Meters, |m: &Meter| m.id == id)
            .await?;
        let Some(meter) = removed.pop() else {
            return Ok(DeleteOutcome::NotFound);
        };
        self.deletions.enqueue_removed(CollectionKey::Meters, &[meter.id.clone()]).await?;
        self.audit
            .append(LogModule::Meters, "Meter deleted", Some(&meter.id), Some(meter.name.clone()))
            .await;
        Ok(DeleteOutcome::Deleted(meter))
    }

    /// Record a reading, deriving its consumption from the latest earlier one.
    pub async fn add_reading(&self, mut reading: MeterReading) -> DomainResult<MeterReading> {
        reading.validate()?;
        let meters = self.get_meters().await?;
        let Some(meter) = meters.iter().find(|m| m.id == reading.meter_id) else {
            return Err(DomainError::EntityNotFound("Meter".to_string(), reading.meter_id.clone()));
        };

        let previous = self
            .get_readings()
            .await?
            .into_iter()
            .filter(|r| r.meter_id == reading.meter_id && r.timestamp <= reading.timestamp)
            .max_by(|a, b| a.timestamp.cmp(&b.timestamp));
        reading.consumption = match previous {
            Some(prev) => reading.value - prev.value,
            None => 0.0,
        };

        let stored = self.store.add(CollectionKey::MeterReadings, reading).await?.into_record();
        self.audit
            .append(
                LogModule::Meters,
                "Reading recorded",
                Some(&stored.id),
                Some(format!("{}: {} (consumption {})", meter.name, stored.value, stored.consumption)),
            )
            .await;
        Ok(stored)
    }

    /// Readings of one meter, newest first.
    pub async fn readings_by_meter(&self, meter_id: &str) -> DomainResult<Vec<MeterReading>> {
        let mut readings: Vec<MeterReading> = self
            .get_readings()
            .await?
            .into_iter()
            .filter(|r| r.meter_id == meter_id)
            .collect();
        readings.sort_by(|a, b| b.timestamp.cmp(&a.timestamp));
        Ok(readings)
    }

    pub async fn delete_reading(&self, id: &str) -> DomainResult<DeleteOutcome<MeterReading>> {
        let mut removed = self
            .store
            .remove_where(CollectionKey::MeterReadings, |r: &MeterReading| r.id == id)
            .await?;
        let Some(reading) = removed.pop() else {
            return Ok(DeleteOutcome::NotFound);
        };
        self.deletions.enqueue_removed(CollectionKey::MeterReadings, &[reading.id.clone()]).await?;
        self.audit
            .append(
                LogModule::Meters,
                "Reading deleted",
                Some(&reading.id),
                Some(format!("Value {}", reading.value)),
            )
            .await;
        Ok(DeleteOutcome::Deleted(reading))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domains::core::collection::test_support::memory_store;
    use crate::domains::core::repository::SyncMeta;
    use crate::domains::meter::types::{MeterType, MeterUnit};

    fn meter(id: &str, name: &str) -> Meter {
        Meter {
            id: id.to_string(),
            name: name.to_string(),
            meter_type: MeterType::Water,
            unit: MeterUnit::CubicMeters,
            custom_unit: None,
            active: true,
            registered_at: None,
            meta: SyncMeta::default(),
        }
    }

    fn reading(meter_id: &str, value: f64, at: &str) -> MeterReading {
        MeterReading {
            id: String::new(),
            meter_id: meter_id.to_string(),
            value,
            consumption: 0.0,
            photo: None,
            observation: None,
            operator: "Carlos".to_string(),
            timestamp: at.parse().unwrap(),
            meta: SyncMeta::default(),
        }
    }

    fn repo() -> MeterRepository {
        let (store, _, _) = memory_store();
        let audit = Arc::new(AuditLog::new(store.clone()));
        let deletions = Arc::new(DeletionQueue::new(store.clone()));
        MeterRepository::new(store, audit, deletions)
    }

    #[tokio::test]
    async fn duplicate_name_is_rejected_case_insensitively() {
        let repo = repo();
        repo.add_meter(meter("M1", "Água Geral")).await.unwrap();

        let err = repo.add_meter(meter("M2", "água geral")).await.unwrap_err();
        assert!(matches!(err, DomainError::Validation(ValidationError::Unique { .. })));
        assert_eq!(repo.get_meters().await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn renaming_onto_another_meter_is_rejected() {
        let repo = repo();
        repo.add_meter(meter("M1", "Água Geral")).await.unwrap();
        repo.add_meter(meter("M2", "Energia Bloco A")).await.unwrap();

        assert!(repo.update_meter(meter("M2", "ÁGUA GERAL")).await.is_err());
        assert!(repo.update_meter(meter("M2", "Energia Bloco B")).await.unwrap().into_option().is_some());
    }

    #[tokio::test]
    async fn consumption_is_derived_from_previous_reading() {
        let repo = repo();
        repo.add_meter(meter("M1", "Água Geral")).await.unwrap();

        let first = repo.add_reading(reading("M1", 100.0, "2025-03-01T08:00:00Z")).await.unwrap();
        assert_eq!(first.consumption, 0.0);
        let second = repo.add_reading(reading("M1", 112.5, "2025-03-02T08:00:00Z")).await.unwrap();
        assert_eq!(second.consumption, 12.5);

        let history = repo.readings_by_meter("M1").await.unwrap();
        assert_eq!(history[0].id, second.id);
        assert_eq!(history[1].id, first.id);
    }

    #[tokio::test]
    async fn reading_for_unknown_meter_is_rejected() {
        let repo = repo();
        let err = repo.add_reading(reading("ghost", 1.0, "2025-03-01T08:00:00Z")).await.unwrap_err();
        assert!(matches!(err, DomainError::EntityNotFound(_, _)));
        assert!(repo.get_readings().await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn deleting_a_reading_queues_its_table() {
        let repo = repo();
        repo.add_meter(meter("M1", "Gás")).await.unwrap();
        let stored = repo.add_reading(reading("M1", 5.0, "2025-03-01T08:00:00Z")).await.unwrap();

        assert!(repo.delete_reading(&stored.id).await.unwrap().is_deleted());
        let queued = repo.deletions.drain().await.unwrap();
        assert_eq!(queued.len(), 1);
        assert_eq!(queued[0].table, "meter_readings");
    }

    #[tokio::test]
    async fn deleting_a_meter_queues_one_remote_deletion_and_keeps_readings() {
        let repo = repo();
        repo.add_meter(meter("M1", "Energia Bloco A")).await.unwrap();
        repo.add_reading(reading("M1", 40.0, "2025-03-01T08:00:00Z")).await.unwrap();

        assert!(repo.delete_meter("M1").await.unwrap().is_deleted());
        assert!(repo.delete_meter("M1").await.unwrap().is_not_found());

        let queued = repo.deletions.drain().await.unwrap();
        assert_eq!(queued.len(), 1);
        assert_eq!((queued[0].id.as_str(), queued[0].table.as_str()), ("M1", "meters"));
        assert_eq!(repo.get_readings().await.unwrap().len(), 1);
    }
}
