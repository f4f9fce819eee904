use crate::domains::core::repository::SyncMeta;
use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};

/// An operator's clock events for one day. Kept on the device only.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct WorkShift {
    #[serde(default)]
    pub id: String,
    pub operator_name: String,
    pub date: NaiveDate,
    pub clock_in: DateTime<Utc>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub lunch_start: Option<DateTime<Utc>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub lunch_end: Option<DateTime<Utc>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub clock_out: Option<DateTime<Utc>>,
    #[serde(flatten)]
    pub meta: SyncMeta,
}

crate::impl_syncable!(WorkShift);

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum ClockEvent {
    ClockIn,
    LunchStart,
    LunchEnd,
    ClockOut,
}

impl ClockEvent {
    pub fn label(&self) -> &'static str {
        match self {
            ClockEvent::ClockIn => "Clock in",
            ClockEvent::LunchStart => "Lunch start",
            ClockEvent::LunchEnd => "Lunch end",
            ClockEvent::ClockOut => "Clock out",
        }
    }

    pub fn stamp(&self, shift: &mut WorkShift, at: DateTime<Utc>) {
        match self {
            ClockEvent::ClockIn => shift.clock_in = at,
            ClockEvent::LunchStart => shift.lunch_start = Some(at),
            ClockEvent::LunchEnd => shift.lunch_end = Some(at),
            ClockEvent::ClockOut => shift.clock_out = Some(at),
        }
    }
}
