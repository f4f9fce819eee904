use crate::domains::core::collection::{Change, CollectionStore};
use crate::domains::core::repository::{keys, CollectionKey};
use crate::domains::deletion_queue::types::DeletedItem;
use crate::errors::{DomainError, DomainResult};
use serde_json::Value;
use std::collections::BTreeMap;
use std::sync::Arc;

/// Durable ledger of remote deletions still owed.
pub struct DeletionQueue {
    store: Arc<CollectionStore>,
}

impl DeletionQueue {
    pub fn new(store: Arc<CollectionStore>) -> Self {
        Self { store }
    }

    /// Queue one remote deletion. Duplicates are allowed since remote deletes are idempotent.
    pub async fn enqueue(&self, id: &str, table: &str) -> DomainResult<()> {
        self.enqueue_many(&[id.to_string()], table).await
    }

    pub async fn enqueue_many(&self, ids: &[String], table: &str) -> DomainResult<()> {
        if ids.is_empty() {
            return Ok(());
        }
        let timestamp = self.store.now();
        let items = ids
            .iter()
            .map(|id| {
                serde_json::to_value(DeletedItem {
                    id: id.clone(),
                    table: table.to_string(),
                    timestamp,
                })
            })
            .collect::<Result<Vec<Value>, _>>()
            .map_err(|e| DomainError::Internal(format!("serialization failed: {}", e)))?;

        self.store
            .modify_raw(keys::DELETED_QUEUE, move |queue| {
                queue.extend(items);
                Change::Write(())
            })
            .await
    }

    /// Queue remote deletions for records removed from `key`. Local-only collections queue nothing.
    pub async fn enqueue_removed(&self, key: CollectionKey, ids: &[String]) -> DomainResult<()> {
        match key.remote_table() {
            Some(table) => self.enqueue_many(ids, table).await,
            None => Ok(()),
        }
    }

    /// Snapshot of the queue, oldest first.
    pub async fn drain(&self) -> DomainResult<Vec<DeletedItem>> {
        self.store.load_list(keys::DELETED_QUEUE).await
    }

    /// Queue contents grouped by destination table.
    pub async fn grouped_by_table(&self) -> DomainResult<BTreeMap<String, Vec<String>>> {
        let mut grouped: BTreeMap<String, Vec<String>> = BTreeMap::new();
        for item in self.drain().await? {
            grouped.entry(item.table).or_default().push(item.id);
        }
        Ok(grouped)
    }

    /// Remove every queued item whose id is listed, regardless of table.
    pub async fn acknowledge(&self, ids: &[String]) -> DomainResult<usize> {
        self.remove_matching(ids, None).await
    }

    /// Remove queued items for `table` whose id is listed.
    pub async fn acknowledge_in_table(&self, table: &str, ids: &[String]) -> DomainResult<usize> {
        self.remove_matching(ids, Some(table)).await
    }

    pub async fn len(&self) -> DomainResult<usize> {
        Ok(self.drain().await?.len())
    }

    async fn remove_matching(&self, ids: &[String], table: Option<&str>) -> DomainResult<usize> {
        if ids.is_empty() {
            return Ok(0);
        }
        self.store
            .modify_raw(keys::DELETED_QUEUE, |queue| {
                let before = queue.len();
                queue.retain(|item| {
                    let id_listed = item
                        .get("id")
                        .and_then(Value::as_str)
                        .map_or(false, |id| ids.iter().any(|wanted| wanted == id));
                    let table_matches = table.map_or(true, |wanted| {
                        item.get("table").and_then(Value::as_str) == Some(wanted)
                    });
                    !(id_listed && table_matches)
                });
                let removed = before - queue.len();
                if removed > 0 {
                    Change::Write(removed)
                } else {
                    Change::Skip(0)
                }
            })
            .await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domains::core::collection::test_support::memory_store;

    #[tokio::test]
    async fn enqueue_drain_acknowledge() {
        let (store, _, _) = memory_store();
        let queue = DeletionQueue::new(store);

        queue.enqueue("P1", "packages").await.unwrap();
        queue.enqueue("P2", "patrols").await.unwrap();
        queue.enqueue("P1", "packages").await.unwrap();

        let items = queue.drain().await.unwrap();
        assert_eq!(items.len(), 3);
        assert_eq!(items[0].id, "P1");
        assert_eq!(items[1].table, "patrols");

        let grouped = queue.grouped_by_table().await.unwrap();
        assert_eq!(grouped["packages"], vec!["P1".to_string(), "P1".to_string()]);
        assert_eq!(grouped["patrols"], vec!["P2".to_string()]);

        let removed = queue.acknowledge(&["P1".to_string()]).await.unwrap();
        assert_eq!(removed, 2);
        let left = queue.drain().await.unwrap();
        assert_eq!(left.len(), 1);
        assert_eq!(left[0].id, "P2");
    }

    #[tokio::test]
    async fn acknowledge_in_table_leaves_other_tables_alone() {
        let (store, _, _) = memory_store();
        let queue = DeletionQueue::new(store);
        queue.enqueue("X", "packages").await.unwrap();
        queue.enqueue("X", "meters").await.unwrap();

        queue.acknowledge_in_table("packages", &["X".to_string()]).await.unwrap();
        let left = queue.drain().await.unwrap();
        assert_eq!(left.len(), 1);
        assert_eq!(left[0].table, "meters");
    }

    #[tokio::test]
    async fn drain_does_not_consume() {
        let (store, _, _) = memory_store();
        let queue = DeletionQueue::new(store);
        queue.enqueue("A", "vehicle_entries").await.unwrap();
        queue.drain().await.unwrap();
        assert_eq!(queue.len().await.unwrap(), 1);
    }
}
