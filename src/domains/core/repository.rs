use crate::errors::ValidationError;
use chrono::{DateTime, Utc};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Dirty-flag and timestamp metadata shared by every synchronized record.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SyncMeta {
    /// `false` until the remote side has confirmed the current local state.
    #[serde(default)]
    pub synced: bool,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub created_at: Option<DateTime<Utc>>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub updated_at: Option<DateTime<Utc>>,
}

impl SyncMeta {
    /// Mark as a fresh local creation.
    pub fn stamp_created(&mut self, now: DateTime<Utc>) {
        self.created_at = Some(now);
        self.updated_at = Some(now);
        self.synced = false;
    }

    /// Mark as locally modified.
    pub fn stamp_updated(&mut self, now: DateTime<Utc>) {
        self.updated_at = Some(now);
        self.synced = false;
    }
}

/// A record that lives in a collection and is pushed to the remote store.
pub trait Syncable: Serialize + DeserializeOwned + Clone + Send + Sync + 'static {
    fn id(&self) -> &str;

    fn set_id(&mut self, id: String);

    fn meta(&self) -> &SyncMeta;

    fn meta_mut(&mut self) -> &mut SyncMeta;

    fn is_synced(&self) -> bool {
        self.meta().synced
    }
}

/// Implements [`Syncable`] for a struct with `id: String` and `meta: SyncMeta` fields.
#[macro_export]
macro_rules! impl_syncable {
    ($($ty:ty),+ $(,)?) => {
        $(
            impl $crate::domains::core::repository::Syncable for $ty {
                fn id(&self) -> &str {
                    &self.id
                }

                fn set_id(&mut self, id: String) {
                    self.id = id;
                }

                fn meta(&self) -> &$crate::domains::core::repository::SyncMeta {
                    &self.meta
                }

                fn meta_mut(&mut self) -> &mut $crate::domains::core::repository::SyncMeta {
                    &mut self.meta
                }
            }
        )+
    };
}

/// Array-valued collections held in local storage.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CollectionKey {
    Entries,
    Breakfast,
    Packages,
    Meters,
    MeterReadings,
    Shifts,
    Patrols,
    Logs,
}

impl CollectionKey {
    pub const ALL: [CollectionKey; 8] = [
        CollectionKey::Entries,
        CollectionKey::Breakfast,
        CollectionKey::Packages,
        CollectionKey::Meters,
        CollectionKey::MeterReadings,
        CollectionKey::Shifts,
        CollectionKey::Patrols,
        CollectionKey::Logs,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            CollectionKey::Entries => "entries",
            CollectionKey::Breakfast => "breakfast",
            CollectionKey::Packages => "packages",
            CollectionKey::Meters => "meters",
            CollectionKey::MeterReadings => "meter_readings",
            CollectionKey::Shifts => "shifts",
            CollectionKey::Patrols => "patrols",
            CollectionKey::Logs => "logs",
        }
    }

    /// Key under which the collection is persisted.
    pub fn storage_key(&self) -> &'static str {
        match self {
            CollectionKey::Entries => "portaria_express_entries",
            CollectionKey::Breakfast => "portaria_express_breakfast",
            CollectionKey::Packages => "portaria_express_packages",
            CollectionKey::Meters => "portaria_express_meters",
            CollectionKey::MeterReadings => "portaria_express_meter_readings",
            CollectionKey::Shifts => "portaria_express_shifts",
            CollectionKey::Patrols => "portaria_express_patrols",
            CollectionKey::Logs => "portaria_express_logs",
        }
    }

    /// Remote table receiving this collection. Work shifts stay on the device.
    pub fn remote_table(&self) -> Option<&'static str> {
        match self {
            CollectionKey::Entries => Some("vehicle_entries"),
            CollectionKey::Breakfast => Some("breakfast_list"),
            CollectionKey::Packages => Some("packages"),
            CollectionKey::Meters => Some("meters"),
            CollectionKey::MeterReadings => Some("meter_readings"),
            CollectionKey::Shifts => None,
            CollectionKey::Patrols => Some("patrols"),
            CollectionKey::Logs => Some("app_logs"),
        }
    }
}

impl fmt::Display for CollectionKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for CollectionKey {
    type Err = ValidationError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        CollectionKey::ALL
            .iter()
            .copied()
            .find(|key| key.as_str() == s || key.storage_key() == s)
            .ok_or_else(|| ValidationError::invalid_value("collection", &format!("unknown collection '{}'", s)))
    }
}

/// Singleton and bookkeeping keys.
pub mod keys {
    pub const SETTINGS: &str = "portaria_express_settings";
    pub const SESSION: &str = "portaria_express_session";
    pub const DRAFT: &str = "portaria_express_draft";
    pub const DELETED_QUEUE: &str = "portaria_express_deleted_queue";
}

/// Result of an `add`
#[derive(Debug, Clone, PartialEq)]
pub enum AddOutcome<T> {
    /// The record was appended, as stored.
    Added(T),
    /// A record with the same id already existed and was left untouched.
    AlreadyExists(T),
}

impl<T> AddOutcome<T> {
    pub fn was_added(&self) -> bool {
        matches!(self, AddOutcome::Added(_))
    }

    pub fn into_record(self) -> T {
        match self {
            AddOutcome::Added(record) | AddOutcome::AlreadyExists(record) => record,
        }
    }
}

/// Result of an `update` or any in-place mutation
#[derive(Debug, Clone, PartialEq)]
pub enum UpdateOutcome<T> {
    Updated(T),
    NotFound,
}

impl<T> UpdateOutcome<T> {
    pub fn is_not_found(&self) -> bool {
        matches!(self, UpdateOutcome::NotFound)
    }

    pub fn into_option(self) -> Option<T> {
        match self {
            UpdateOutcome::Updated(record) => Some(record),
            UpdateOutcome::NotFound => None,
        }
    }
}

/// Result of a `delete`
#[derive(Debug, Clone, PartialEq)]
pub enum DeleteOutcome<T> {
    /// The removed record. Its id has been queued for remote deletion.
    Deleted(T),
    NotFound,
}

impl<T> DeleteOutcome<T> {
    pub fn is_deleted(&self) -> bool {
        matches!(self, DeleteOutcome::Deleted(_))
    }

    pub fn is_not_found(&self) -> bool {
        matches!(self, DeleteOutcome::NotFound)
    }
}
