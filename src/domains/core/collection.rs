use crate::domains::core::repository::{AddOutcome, CollectionKey, Syncable};
use crate::domains::core::storage::KeyValueStorage;
use crate::errors::{DomainError, DomainResult};
use crate::utils::clock::Clock;
use crate::utils::id::{needs_id, new_record_id};
use chrono::{DateTime, Utc};
use log::{debug, warn};
use serde::de::DeserializeOwned;
use serde::Serialize;
use serde_json::Value;
use std::collections::{HashMap, HashSet};
use std::sync::Arc;
use tokio::sync::Mutex;

/// Audit entries kept after every append.
pub const MAX_LOG_ENTRIES: usize = 2000;

/// Audit entries kept when storage runs out of space.
pub const LOG_TRIM_ON_QUOTA: usize = 500;

/// Whether a mutation closure changed the collection and it must be written back.
pub enum Change<R> {
    Write(R),
    Skip(R),
}

/// A dirty record together with the stored value it was decoded from.
#[derive(Debug, Clone)]
pub struct DirtyRecord<T> {
    pub record: T,
    pub stored: Value,
}

/// Dirty records of one collection as read before a push.
#[derive(Debug, Clone)]
pub struct DirtySnapshot<T> {
    pub records: Vec<DirtyRecord<T>>,
    /// Ids of dirty elements that do not decode and cannot be pushed.
    pub unreadable: Vec<String>,
}

/// Stored element that does not decode as the collection's record type.
struct Unreadable {
    position: usize,
    id: Option<String>,
    value: Value,
}

/// Typed access to the collections held in key-value storage.
///
/// Every read-modify-write runs under one store-wide lock so that the
/// collections behave as if accessed from a single thread.
pub struct CollectionStore {
    storage: Arc<dyn KeyValueStorage>,
    clock: Arc<dyn Clock>,
    write_lock: Mutex<()>,
}

impl CollectionStore {
    pub fn new(storage: Arc<dyn KeyValueStorage>, clock: Arc<dyn Clock>) -> Self {
        Self {
            storage,
            clock,
            write_lock: Mutex::new(()),
        }
    }

    pub fn now(&self) -> DateTime<Utc> {
        self.clock.now()
    }

    pub fn clock(&self) -> &dyn Clock {
        self.clock.as_ref()
    }

    // --- Reads ---

    /// Full collection contents. A missing or unparseable key reads as empty.
    pub async fn get_all<T: Syncable>(&self, key: CollectionKey) -> DomainResult<Vec<T>> {
        self.load_list(key.storage_key()).await
    }

    /// List stored under an arbitrary key, skipping unreadable elements.
    pub async fn load_list<T: DeserializeOwned>(&self, key: &str) -> DomainResult<Vec<T>> {
        let raw = self.storage.get(key).await?;
        Ok(decode_list(key, raw.as_deref()))
    }

    pub async fn find<T: Syncable>(&self, key: CollectionKey, id: &str) -> DomainResult<Option<T>> {
        Ok(self
            .get_all::<T>(key)
            .await?
            .into_iter()
            .find(|record| record.id() == id))
    }

    /// Records not yet confirmed by the remote store.
    pub async fn get_unsynced<T: Syncable>(&self, key: CollectionKey) -> DomainResult<Vec<T>> {
        Ok(self
            .get_all::<T>(key)
            .await?
            .into_iter()
            .filter(|record| !record.is_synced())
            .collect())
    }

    /// Dirty records of `key` with the exact stored values, for [`mark_pushed`](Self::mark_pushed).
    pub async fn dirty_snapshot<T: Syncable>(&self, key: CollectionKey) -> DomainResult<DirtySnapshot<T>> {
        let raw = self.storage.get(key.storage_key()).await?;
        let mut snapshot = DirtySnapshot {
            records: Vec::new(),
            unreadable: Vec::new(),
        };
        for stored in decode_values(key.storage_key(), raw.as_deref()) {
            if is_synced_value(&stored) {
                continue;
            }
            match serde_json::from_value::<T>(stored.clone()) {
                Ok(record) => snapshot.records.push(DirtyRecord { record, stored }),
                Err(e) => {
                    let id = value_id(&stored).unwrap_or_default().to_string();
                    warn!("Dirty record '{}' in '{}' cannot be decoded: {}", id, key.storage_key(), e);
                    snapshot.unreadable.push(id);
                }
            }
        }
        Ok(snapshot)
    }

    /// Stored JSON under `key`, `None` when absent or unparseable.
    pub async fn load_raw_value(&self, key: &str) -> DomainResult<Option<Value>> {
        self.load_value::<Value>(key).await
    }

    /// Singleton value stored under `key`, `None` when absent or unparseable.
    pub async fn load_value<T: DeserializeOwned>(&self, key: &str) -> DomainResult<Option<T>> {
        let raw = match self.storage.get(key).await? {
            Some(raw) => raw,
            None => return Ok(None),
        };
        match serde_json::from_str::<T>(&raw) {
            Ok(value) => Ok(Some(value)),
            Err(e) => {
                warn!("Ignoring unreadable value under '{}': {}", key, e);
                Ok(None)
            }
        }
    }

    // --- Writes ---

    pub async fn store_value<T: Serialize>(&self, key: &str, value: &T) -> DomainResult<()> {
        let json = to_json(value)?;
        let _guard = self.write_lock.lock().await;
        self.persist(key, &json).await
    }

    pub async fn remove_value(&self, key: &str) -> DomainResult<()> {
        let _guard = self.write_lock.lock().await;
        self.storage.remove(key).await?;
        Ok(())
    }

    /// Replace a whole collection.
    pub async fn write_all<T: Serialize>(&self, key: CollectionKey, records: &[T]) -> DomainResult<()> {
        let json = to_json(&records)?;
        let _guard = self.write_lock.lock().await;
        self.persist(key.storage_key(), &json).await
    }

    /// Run `f` over the typed collection and persist the result when it reports a change.
    ///
    /// Elements that do not decode as `T` are not shown to `f` and are written
    /// back unchanged at their original positions.
    pub async fn modify<T, R, F>(&self, key: CollectionKey, f: F) -> DomainResult<R>
    where
        T: Syncable,
        F: FnOnce(&mut Vec<T>) -> Change<R>,
    {
        self.modify_typed(key, |records: &mut Vec<T>, _: &HashSet<String>| f(records))
            .await
    }

    /// Like [`modify`](Self::modify), also passing the ids held by undecodable elements.
    pub async fn modify_typed<T, R, F>(&self, key: CollectionKey, f: F) -> DomainResult<R>
    where
        T: Syncable,
        F: FnOnce(&mut Vec<T>, &HashSet<String>) -> Change<R>,
    {
        let storage_key = key.storage_key();
        let _guard = self.write_lock.lock().await;
        let raw = self.storage.get(storage_key).await?;
        let (mut records, unreadable) = split_records::<T>(storage_key, decode_values(storage_key, raw.as_deref()));
        let readable_ids: HashSet<String> = records.iter().map(|r| r.id().to_string()).collect();
        let unreadable_ids: HashSet<String> = unreadable
            .iter()
            .filter_map(|u| u.id.clone())
            .filter(|id| !readable_ids.contains(id))
            .collect();

        match f(&mut records, &unreadable_ids) {
            Change::Write(result) => {
                let merged = merge_records(storage_key, records, unreadable, &readable_ids)?;
                let json = to_json(&merged)?;
                self.persist(storage_key, &json).await?;
                Ok(result)
            }
            Change::Skip(result) => Ok(result),
        }
    }

    /// Like [`modify`](Self::modify) but over untyped JSON values, preserving unknown fields.
    pub async fn modify_raw<R, F>(&self, key: &str, f: F) -> DomainResult<R>
    where
        F: FnOnce(&mut Vec<Value>) -> Change<R>,
    {
        let _guard = self.write_lock.lock().await;
        let raw = self.storage.get(key).await?;
        let mut values = decode_values(key, raw.as_deref());
        match f(&mut values) {
            Change::Write(result) => {
                let json = to_json(&values)?;
                self.persist(key, &json).await?;
                Ok(result)
            }
            Change::Skip(result) => Ok(result),
        }
    }

    // --- Syncable helpers ---

    /// Append `record` unless its id is already present.
    ///
    /// A blank id is replaced with a generated one; timestamps are set to now
    /// and the record is marked dirty.
    pub async fn add<T: Syncable>(&self, key: CollectionKey, mut record: T) -> DomainResult<AddOutcome<T>> {
        if needs_id(record.id()) {
            record.set_id(new_record_id());
        }
        let now = self.now();
        self.modify_typed(key, move |records: &mut Vec<T>, unreadable_ids: &HashSet<String>| {
            if let Some(existing) = records.iter().find(|r| r.id() == record.id()) {
                return Change::Skip(AddOutcome::AlreadyExists(existing.clone()));
            }
            if unreadable_ids.contains(record.id()) {
                warn!("Record '{}' already stored in a form that cannot be decoded, leaving it", record.id());
                return Change::Skip(AddOutcome::AlreadyExists(record));
            }
            record.meta_mut().stamp_created(now);
            records.push(record.clone());
            Change::Write(AddOutcome::Added(record))
        })
        .await
    }

    /// Replace the record sharing `record`'s id. Returns `(previous, stored)`.
    ///
    /// The stored copy keeps the previous `created_at` when the caller omitted it.
    pub async fn replace<T: Syncable>(&self, key: CollectionKey, mut record: T) -> DomainResult<Option<(T, T)>> {
        let now = self.now();
        self.modify(key, move |records: &mut Vec<T>| {
            let Some(slot) = records.iter_mut().find(|r| r.id() == record.id()) else {
                return Change::Skip(None);
            };
            if record.meta().created_at.is_none() {
                record.meta_mut().created_at = slot.meta().created_at;
            }
            record.meta_mut().stamp_updated(now);
            let previous = std::mem::replace(slot, record.clone());
            Change::Write(Some((previous, record)))
        })
        .await
    }

    /// Apply `f` to every record matching `predicate`, stamping each as dirty.
    pub async fn update_where<T, P, F>(&self, key: CollectionKey, predicate: P, mut f: F) -> DomainResult<Vec<T>>
    where
        T: Syncable,
        P: Fn(&T) -> bool,
        F: FnMut(&mut T),
    {
        let now = self.now();
        self.modify(key, move |records: &mut Vec<T>| {
            let mut updated = Vec::new();
            for record in records.iter_mut().filter(|r| predicate(&**r)) {
                f(record);
                record.meta_mut().stamp_updated(now);
                updated.push(record.clone());
            }
            if updated.is_empty() {
                Change::Skip(updated)
            } else {
                Change::Write(updated)
            }
        })
        .await
    }

    /// Remove every record matching `predicate`, returning the removed ones in collection order.
    pub async fn remove_where<T, P>(&self, key: CollectionKey, predicate: P) -> DomainResult<Vec<T>>
    where
        T: Syncable,
        P: Fn(&T) -> bool,
    {
        self.modify(key, move |records: &mut Vec<T>| {
            let (removed, kept): (Vec<T>, Vec<T>) = records.drain(..).partition(|r| predicate(r));
            *records = kept;
            if removed.is_empty() {
                Change::Skip(removed)
            } else {
                Change::Write(removed)
            }
        })
        .await
    }

    /// Set `synced=true` on exactly the listed ids. Returns how many records changed.
    pub async fn mark_as_synced(&self, key: CollectionKey, ids: &[String]) -> DomainResult<usize> {
        if ids.is_empty() {
            return Ok(0);
        }
        self.modify_raw(key.storage_key(), |values| {
            let mut changed = 0;
            for value in values.iter_mut() {
                let matches = value
                    .get("id")
                    .and_then(Value::as_str)
                    .map_or(false, |id| ids.iter().any(|wanted| wanted == id));
                if !matches {
                    continue;
                }
                if let Some(object) = value.as_object_mut() {
                    object.insert("synced".to_string(), Value::Bool(true));
                    changed += 1;
                }
            }
            if changed > 0 {
                Change::Write(changed)
            } else {
                Change::Skip(0)
            }
        })
        .await
    }

    /// Set `synced=true` on each stored record still equal to the value that was pushed.
    ///
    /// A record edited while the push was in flight differs from its pushed
    /// value and stays dirty. Returns how many records changed.
    pub async fn mark_pushed(&self, key: CollectionKey, pushed: &[Value]) -> DomainResult<usize> {
        if pushed.is_empty() {
            return Ok(0);
        }
        let by_id: HashMap<&str, &Value> = pushed.iter().filter_map(|v| value_id(v).map(|id| (id, v))).collect();
        self.modify_raw(key.storage_key(), |values| {
            let mut changed = 0;
            for value in values.iter_mut() {
                let Some(sent) = value_id(value).and_then(|id| by_id.get(id)) else {
                    continue;
                };
                if *sent != &*value {
                    debug!(
                        "Record '{}' changed during push, keeping it dirty",
                        value_id(value).unwrap_or_default()
                    );
                    continue;
                }
                if let Some(object) = value.as_object_mut() {
                    object.insert("synced".to_string(), Value::Bool(true));
                    changed += 1;
                }
            }
            if changed > 0 {
                Change::Write(changed)
            } else {
                Change::Skip(0)
            }
        })
        .await
    }

    /// Set `synced=true` on the singleton under `key` if it still equals `pushed`.
    pub async fn mark_value_pushed(&self, key: &str, pushed: &Value) -> DomainResult<bool> {
        let _guard = self.write_lock.lock().await;
        let Some(raw) = self.storage.get(key).await? else {
            return Ok(false);
        };
        let mut stored = match serde_json::from_str::<Value>(&raw) {
            Ok(stored) => stored,
            Err(e) => {
                warn!("Ignoring unreadable value under '{}': {}", key, e);
                return Ok(false);
            }
        };
        if &stored != pushed {
            debug!("Value under '{}' changed during push, keeping it dirty", key);
            return Ok(false);
        }
        let Some(object) = stored.as_object_mut() else {
            return Ok(false);
        };
        object.insert("synced".to_string(), Value::Bool(true));
        let json = to_json(&stored)?;
        self.persist(key, &json).await?;
        Ok(true)
    }

    // --- Persistence ---

    /// Write under the held lock, freeing audit-log space once if storage is full.
    async fn persist(&self, key: &str, json: &str) -> DomainResult<()> {
        match self.storage.set(key, json).await {
            Ok(()) => Ok(()),
            Err(e) if e.is_quota_exceeded() => {
                warn!("Storage full while writing '{}', trimming audit log and retrying", key);
                if key != CollectionKey::Logs.storage_key() {
                    self.trim_logs(LOG_TRIM_ON_QUOTA).await;
                }
                self.storage.set(key, json).await.map_err(|retry_err| {
                    if retry_err.is_quota_exceeded() {
                        DomainError::StorageCapacity(format!("could not write '{}'", key))
                    } else {
                        DomainError::Database(retry_err)
                    }
                })
            }
            Err(e) => Err(e.into()),
        }
    }

    async fn trim_logs(&self, keep: usize) {
        let key = CollectionKey::Logs.storage_key();
        let raw = match self.storage.get(key).await {
            Ok(raw) => raw,
            Err(e) => {
                warn!("Could not read audit log for trimming: {}", e);
                return;
            }
        };
        let mut logs = decode_values(key, raw.as_deref());
        if logs.len() <= keep {
            return;
        }
        let excess = logs.len() - keep;
        logs.drain(..excess);
        match to_json(&logs) {
            Ok(json) => {
                if let Err(e) = self.storage.set(key, &json).await {
                    warn!("Could not write trimmed audit log: {}", e);
                } else {
                    debug!("Trimmed {} audit entries to free storage", excess);
                }
            }
            Err(e) => warn!("Could not encode trimmed audit log: {}", e),
        }
    }
}

fn to_json<T: Serialize + ?Sized>(value: &T) -> DomainResult<String> {
    serde_json::to_string(value).map_err(|e| DomainError::Internal(format!("serialization failed: {}", e)))
}

fn decode_values(key: &str, raw: Option<&str>) -> Vec<Value> {
    let Some(raw) = raw else {
        return Vec::new();
    };
    match serde_json::from_str::<Value>(raw) {
        Ok(Value::Array(values)) => values,
        Ok(_) => {
            warn!("Storage key '{}' does not hold a list, treating as empty", key);
            Vec::new()
        }
        Err(e) => {
            warn!("Storage key '{}' is corrupt, treating as empty: {}", key, e);
            Vec::new()
        }
    }
}

fn value_id(value: &Value) -> Option<&str> {
    value.get("id").and_then(Value::as_str)
}

fn is_synced_value(value: &Value) -> bool {
    value.get("synced").and_then(Value::as_bool) == Some(true)
}

fn split_records<T: DeserializeOwned>(key: &str, values: Vec<Value>) -> (Vec<T>, Vec<Unreadable>) {
    let mut records = Vec::with_capacity(values.len());
    let mut unreadable = Vec::new();
    for (position, value) in values.into_iter().enumerate() {
        match serde_json::from_value::<T>(value.clone()) {
            Ok(record) => records.push(record),
            Err(e) => {
                warn!("Keeping undecodable record at {} in '{}' as stored: {}", position, key, e);
                unreadable.push(Unreadable {
                    position,
                    id: value_id(&value).map(str::to_string),
                    value,
                });
            }
        }
    }
    (records, unreadable)
}

/// Serialize `records` and put the undecodable elements back where they were.
///
/// A record that newly took the id of an undecodable element is dropped in
/// favour of the stored one.
fn merge_records<T: Syncable>(
    key: &str,
    records: Vec<T>,
    unreadable: Vec<Unreadable>,
    readable_ids: &HashSet<String>,
) -> DomainResult<Vec<Value>> {
    let taken: HashSet<&str> = unreadable.iter().filter_map(|u| u.id.as_deref()).collect();
    let mut merged = Vec::with_capacity(records.len() + unreadable.len());
    for record in records {
        if taken.contains(record.id()) && !readable_ids.contains(record.id()) {
            warn!("Not overwriting undecodable record '{}' in '{}'", record.id(), key);
            continue;
        }
        merged.push(
            serde_json::to_value(&record)
                .map_err(|e| DomainError::Internal(format!("serialization failed: {}", e)))?,
        );
    }
    for item in unreadable {
        let at = item.position.min(merged.len());
        merged.insert(at, item.value);
    }
    Ok(merged)
}

/// Decode a stored list, skipping elements that do not fit `T`.
fn decode_list<T: DeserializeOwned>(key: &str, raw: Option<&str>) -> Vec<T> {
    decode_values(key, raw)
        .into_iter()
        .filter_map(|value| match serde_json::from_value::<T>(value) {
            Ok(record) => Some(record),
            Err(e) => {
                warn!("Skipping unreadable record in '{}': {}", key, e);
                None
            }
        })
        .collect()
}

#[cfg(test)]
pub(crate) mod test_support {
    use super::*;
    use crate::domains::core::storage::MemoryKeyValueStorage;
    use crate::utils::clock::MockClock;

    pub const T0: &str = "2025-03-10T08:00:00Z";

    pub fn memory_store() -> (Arc<CollectionStore>, Arc<MemoryKeyValueStorage>, Arc<MockClock>) {
        let storage = Arc::new(MemoryKeyValueStorage::new());
        let clock = Arc::new(MockClock::at(T0));
        let store = Arc::new(CollectionStore::new(storage.clone(), clock.clone()));
        (store, storage, clock)
    }
}

#[cfg(test)]
mod tests {
    use super::test_support::memory_store;
    use super::*;
    use crate::domains::core::repository::SyncMeta;
    use crate::domains::core::storage::MemoryKeyValueStorage;
    use crate::utils::clock::MockClock;
    use serde::Deserialize;

    #[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
    struct Note {
        #[serde(default)]
        id: String,
        text: String,
        #[serde(flatten)]
        meta: SyncMeta,
    }

    crate::impl_syncable!(Note);

    fn note(id: &str, text: &str) -> Note {
        Note {
            id: id.to_string(),
            text: text.to_string(),
            meta: SyncMeta::default(),
        }
    }

    #[tokio::test]
    async fn corrupt_storage_reads_as_empty() {
        let (store, storage, _) = memory_store();
        storage.set(CollectionKey::Entries.storage_key(), "{not json").await.unwrap();
        let all: Vec<Note> = store.get_all(CollectionKey::Entries).await.unwrap();
        assert!(all.is_empty());
    }

    #[tokio::test]
    async fn malformed_elements_are_skipped() {
        let (store, storage, _) = memory_store();
        storage
            .set(
                CollectionKey::Entries.storage_key(),
                r#"[{"id":"A","text":"ok","synced":true},{"id":"B"}]"#,
            )
            .await
            .unwrap();
        let all: Vec<Note> = store.get_all(CollectionKey::Entries).await.unwrap();
        assert_eq!(all.len(), 1);
        assert!(all[0].meta.synced);
    }

    #[tokio::test]
    async fn add_assigns_id_and_is_idempotent() {
        let (store, _, _) = memory_store();
        let added = store.add(CollectionKey::Entries, note("", "first")).await.unwrap();
        let stored = added.into_record();
        assert!(!stored.id.is_empty());
        assert!(!stored.meta.synced);
        assert!(stored.meta.created_at.is_some());

        let again = store
            .add(CollectionKey::Entries, note(&stored.id, "second"))
            .await
            .unwrap();
        assert!(!again.was_added());
        let all: Vec<Note> = store.get_all(CollectionKey::Entries).await.unwrap();
        assert_eq!(all.len(), 1);
        assert_eq!(all[0].text, "first");
    }

    #[tokio::test]
    async fn replace_missing_id_is_none_and_writes_nothing() {
        let (store, storage, _) = memory_store();
        let result = store.replace(CollectionKey::Entries, note("X", "nope")).await.unwrap();
        assert!(result.is_none());
        assert_eq!(storage.get(CollectionKey::Entries.storage_key()).await.unwrap(), None);
    }

    #[tokio::test]
    async fn replace_keeps_created_at_and_marks_dirty() {
        let (store, _, clock) = memory_store();
        store.add(CollectionKey::Entries, note("A", "v1")).await.unwrap();
        store.mark_as_synced(CollectionKey::Entries, &["A".to_string()]).await.unwrap();

        clock.advance(chrono::Duration::minutes(5));
        let (previous, stored) = store
            .replace(CollectionKey::Entries, note("A", "v2"))
            .await
            .unwrap()
            .unwrap();
        assert!(previous.meta.synced);
        assert_eq!(stored.meta.created_at, previous.meta.created_at);
        assert!(stored.meta.updated_at > previous.meta.updated_at);
        assert!(!stored.meta.synced);
    }

    #[tokio::test]
    async fn mark_as_synced_touches_only_listed_ids_and_keeps_unknown_fields() {
        let (store, storage, _) = memory_store();
        storage
            .set(
                CollectionKey::Entries.storage_key(),
                r#"[{"id":"A","text":"a","extra":1},{"id":"B","text":"b"}]"#,
            )
            .await
            .unwrap();

        let changed = store.mark_as_synced(CollectionKey::Entries, &["A".to_string()]).await.unwrap();
        assert_eq!(changed, 1);

        let unsynced: Vec<Note> = store.get_unsynced(CollectionKey::Entries).await.unwrap();
        assert_eq!(unsynced.iter().map(|n| n.id.as_str()).collect::<Vec<_>>(), vec!["B"]);

        let raw = storage.get(CollectionKey::Entries.storage_key()).await.unwrap().unwrap();
        assert!(raw.contains("\"extra\":1"));
    }

    #[tokio::test]
    async fn typed_writes_keep_undecodable_elements_in_place() {
        let (store, storage, _) = memory_store();
        storage
            .set(
                CollectionKey::Entries.storage_key(),
                r#"[{"id":"X","text":3},{"id":"A","text":"a"}]"#,
            )
            .await
            .unwrap();

        store.add(CollectionKey::Entries, note("B", "b")).await.unwrap();
        store.remove_where(CollectionKey::Entries, |n: &Note| n.id == "A").await.unwrap();

        let raw = storage.get(CollectionKey::Entries.storage_key()).await.unwrap().unwrap();
        let stored: Vec<Value> = serde_json::from_str(&raw).unwrap();
        let ids: Vec<&str> = stored.iter().map(|v| v["id"].as_str().unwrap()).collect();
        assert_eq!(ids, vec!["X", "B"]);
        assert_eq!(stored[0]["text"], 3);
    }

    #[tokio::test]
    async fn add_does_not_shadow_an_undecodable_id() {
        let (store, storage, _) = memory_store();
        storage
            .set(CollectionKey::Entries.storage_key(), r#"[{"id":"X","text":3}]"#)
            .await
            .unwrap();

        let outcome = store.add(CollectionKey::Entries, note("X", "new")).await.unwrap();
        assert!(!outcome.was_added());

        let raw = storage.get(CollectionKey::Entries.storage_key()).await.unwrap().unwrap();
        assert_eq!(raw, r#"[{"id":"X","text":3}]"#);
    }

    #[tokio::test]
    async fn dirty_snapshot_reports_undecodable_dirty_ids() {
        let (store, storage, _) = memory_store();
        storage
            .set(
                CollectionKey::Entries.storage_key(),
                r#"[{"id":"X","text":3},{"id":"Y","text":4,"synced":true},{"id":"A","text":"a"}]"#,
            )
            .await
            .unwrap();

        let snapshot = store.dirty_snapshot::<Note>(CollectionKey::Entries).await.unwrap();
        assert_eq!(snapshot.records.len(), 1);
        assert_eq!(snapshot.records[0].record.id, "A");
        assert_eq!(snapshot.unreadable, vec!["X".to_string()]);
    }

    #[tokio::test]
    async fn mark_pushed_skips_records_edited_after_the_snapshot() {
        let (store, _, clock) = memory_store();
        store.add(CollectionKey::Entries, note("A", "a")).await.unwrap();
        store.add(CollectionKey::Entries, note("B", "b")).await.unwrap();
        let snapshot = store.dirty_snapshot::<Note>(CollectionKey::Entries).await.unwrap();
        let pushed: Vec<Value> = snapshot.records.into_iter().map(|dirty| dirty.stored).collect();

        clock.advance(chrono::Duration::seconds(1));
        store.replace(CollectionKey::Entries, note("B", "edited")).await.unwrap();

        let marked = store.mark_pushed(CollectionKey::Entries, &pushed).await.unwrap();
        assert_eq!(marked, 1);

        let unsynced: Vec<Note> = store.get_unsynced(CollectionKey::Entries).await.unwrap();
        assert_eq!(unsynced.len(), 1);
        assert_eq!(unsynced[0].text, "edited");
    }

    #[tokio::test]
    async fn quota_failure_trims_logs_then_retries() {
        let storage = Arc::new(MemoryKeyValueStorage::with_capacity(60_000));
        let clock = Arc::new(MockClock::at(super::test_support::T0));
        let store = CollectionStore::new(storage.clone(), clock);

        let logs: Vec<Value> = (0..1000)
            .map(|i| serde_json::json!({ "id": format!("L{:04}", i), "pad": "xxxxxxxxxxxxxxxxxxxxxxxxxxxx" }))
            .collect();
        storage
            .set(CollectionKey::Logs.storage_key(), &serde_json::to_string(&logs).unwrap())
            .await
            .unwrap();

        let big_text = "y".repeat(20_000);
        store.add(CollectionKey::Entries, note("A", &big_text)).await.unwrap();

        let raw_logs = storage.get(CollectionKey::Logs.storage_key()).await.unwrap().unwrap();
        let kept: Vec<Value> = serde_json::from_str(&raw_logs).unwrap();
        assert_eq!(kept.len(), LOG_TRIM_ON_QUOTA);
        assert_eq!(kept[0]["id"], "L0500");
    }

    #[tokio::test]
    async fn persistent_quota_failure_is_a_capacity_error() {
        let storage = Arc::new(MemoryKeyValueStorage::with_capacity(100));
        let clock = Arc::new(MockClock::at(super::test_support::T0));
        let store = CollectionStore::new(storage.clone(), clock);

        let err = store
            .add(CollectionKey::Entries, note("A", &"z".repeat(500)))
            .await
            .unwrap_err();
        assert!(matches!(err, DomainError::StorageCapacity(_)));
        assert_eq!(storage.get(CollectionKey::Entries.storage_key()).await.unwrap(), None);
    }
}
