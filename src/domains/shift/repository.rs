use crate::domains::audit::{AuditLog, LogModule};
use crate::domains::core::collection::{Change, CollectionStore};
use crate::domains::core::repository::{CollectionKey, SyncMeta};
use crate::domains::shift::types::{ClockEvent, WorkShift};
use crate::errors::{DomainResult, ValidationError};
use crate::utils::id::{needs_id, new_record_id};
use std::sync::Arc;

pub struct ShiftRepository {
    store: Arc<CollectionStore>,
    audit: Arc<AuditLog>,
}

impl ShiftRepository {
    pub fn new(store: Arc<CollectionStore>, audit: Arc<AuditLog>) -> Self {
        Self { store, audit }
    }

    pub async fn get_all(&self) -> DomainResult<Vec<WorkShift>> {
        self.store.get_all(CollectionKey::Shifts).await
    }

    /// Insert `shift`, or replace the stored one with the same id.
    pub async fn upsert_shift(&self, mut shift: WorkShift) -> DomainResult<WorkShift> {
        if needs_id(&shift.id) {
            shift.id = new_record_id();
        }
        let now = self.store.now();
        self.store
            .modify(CollectionKey::Shifts, move |shifts: &mut Vec<WorkShift>| {
                match shifts.iter().position(|s| s.id == shift.id) {
                    Some(index) => {
                        if shift.meta.created_at.is_none() {
                            shift.meta.created_at = shifts[index].meta.created_at;
                        }
                        shift.meta.stamp_updated(now);
                        shifts[index] = shift.clone();
                    }
                    None => {
                        shift.meta.stamp_created(now);
                        shifts.push(shift.clone());
                    }
                }
                Change::Write(shift)
            })
            .await
    }

    /// Stamp `event` on today's shift for `operator`, opening the shift when needed.
    pub async fn record_clock_event(&self, operator: &str, event: ClockEvent) -> DomainResult<WorkShift> {
        if operator.trim().is_empty() {
            return Err(ValidationError::required("operatorName").into());
        }
        let now = self.store.now();
        let today = self.store.clock().today();
        let operator_name = operator.to_string();

        let shift = self
            .store
            .modify(CollectionKey::Shifts, move |shifts: &mut Vec<WorkShift>| {
                if let Some(existing) = shifts
                    .iter_mut()
                    .find(|s| s.date == today && s.operator_name == operator_name)
                {
                    event.stamp(existing, now);
                    existing.meta.stamp_updated(now);
                    return Change::Write(existing.clone());
                }
                let mut created = WorkShift {
                    id: new_record_id(),
                    operator_name,
                    date: today,
                    clock_in: now,
                    lunch_start: None,
                    lunch_end: None,
                    clock_out: None,
                    meta: SyncMeta::default(),
                };
                event.stamp(&mut created, now);
                created.meta.stamp_created(now);
                shifts.push(created.clone());
                Change::Write(created)
            })
            .await?;

        self.audit
            .append(LogModule::TimeClock, event.label(), Some(&shift.id), Some(shift.operator_name.clone()))
            .await;
        Ok(shift)
    }
}
