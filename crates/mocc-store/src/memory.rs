//! In-memory [`DocumentStore`] for local runs and tests.

use std::collections::HashMap;

use async_trait::async_trait;
use serde_json::Value;
use tokio::sync::RwLock;
use tracing::debug;

use crate::StoreError;
use crate::document::{DocumentStore, PatchOperation, Query};

type Key = (String, String);

/// Documents keyed by container, then by (partition key, id).
#[derive(Default)]
pub struct MemoryStore {
    containers: RwLock<HashMap<String, HashMap<Key, Value>>>,
    writes: RwLock<usize>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Seed a document without counting it as a write.
    pub async fn insert(&self, container: &str, partition_key: &str, document: Value) {
        let id = document_id(&document).unwrap_or_default();
        self.containers
            .write()
            .await
            .entry(container.to_string())
            .or_default()
            .insert((partition_key.to_string(), id), document);
    }

    pub async fn get(&self, container: &str, id: &str, partition_key: &str) -> Option<Value> {
        self.containers
            .read()
            .await
            .get(container)
            .and_then(|docs| docs.get(&(partition_key.to_string(), id.to_string())))
            .cloned()
    }

    /// All documents in `container`, in no particular order.
    pub async fn documents(&self, container: &str) -> Vec<Value> {
        self.containers
            .read()
            .await
            .get(container)
            .map(|docs| docs.values().cloned().collect())
            .unwrap_or_default()
    }

    /// Number of upserts and patches applied so far.
    pub async fn write_count(&self) -> usize {
        *self.writes.read().await
    }
}

fn document_id(document: &Value) -> Option<String> {
    document.get("id").and_then(Value::as_str).map(str::to_string)
}

/// Apply a `set` at a JSON pointer whose parent must already exist.
fn set_pointer(document: &mut Value, path: &str, value: Value) -> Result<(), StoreError> {
    let (parent_path, last) = path
        .rsplit_once('/')
        .ok_or_else(|| StoreError::Other(format!("invalid patch path: {path}")))?;
    let parent = document
        .pointer_mut(parent_path)
        .ok_or_else(|| StoreError::Other(format!("patch path not found: {path}")))?;

    match parent {
        Value::Object(map) => {
            map.insert(last.to_string(), value);
            Ok(())
        }
        Value::Array(items) => {
            let slot = last
                .parse::<usize>()
                .ok()
                .and_then(|i| items.get_mut(i))
                .ok_or_else(|| StoreError::Other(format!("patch index out of range: {path}")))?;
            *slot = value;
            Ok(())
        }
        _ => Err(StoreError::Other(format!("patch parent is not a container: {path}"))),
    }
}

#[async_trait]
impl DocumentStore for MemoryStore {
    async fn query(&self, container: &str, query: &Query) -> Result<Vec<Value>, StoreError> {
        let containers = self.containers.read().await;
        let mut results: Vec<Value> = containers
            .get(container)
            .map(|docs| {
                docs.values()
                    .filter(|d| query.matches(d))
                    .map(|d| query.project(d))
                    .collect()
            })
            .unwrap_or_default();
        results.sort_by(|a, b| {
            let a = a.get("id").and_then(Value::as_str);
            let b = b.get("id").and_then(Value::as_str);
            a.cmp(&b)
        });
        debug!(container, count = results.len(), "memory query");
        Ok(results)
    }

    async fn read(
        &self,
        container: &str,
        id: &str,
        partition_key: &str,
    ) -> Result<Option<Value>, StoreError> {
        Ok(self.get(container, id, partition_key).await)
    }

    async fn upsert(
        &self,
        container: &str,
        partition_key: &str,
        document: &Value,
    ) -> Result<(), StoreError> {
        let id = document_id(document)
            .ok_or_else(|| StoreError::Other("document has no id".to_string()))?;
        self.containers
            .write()
            .await
            .entry(container.to_string())
            .or_default()
            .insert((partition_key.to_string(), id), document.clone());
        *self.writes.write().await += 1;
        Ok(())
    }

    async fn patch(
        &self,
        container: &str,
        id: &str,
        partition_key: &str,
        operations: &[PatchOperation],
    ) -> Result<(), StoreError> {
        let mut containers = self.containers.write().await;
        let document = containers
            .get_mut(container)
            .and_then(|docs| docs.get_mut(&(partition_key.to_string(), id.to_string())))
            .ok_or_else(|| StoreError::NotFound(format!("{container}/{id}")))?;

        let mut updated = document.clone();
        for op in operations {
            set_pointer(&mut updated, &op.path, op.value.clone())?;
        }
        *document = updated;
        drop(containers);

        *self.writes.write().await += 1;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[tokio::test]
    async fn upsert_then_read_by_partition() {
        let store = MemoryStore::new();
        store
            .upsert("History", "u1", &json!({"id": "h1", "authorId": "u1"}))
            .await
            .unwrap();

        assert!(store.read("History", "h1", "u1").await.unwrap().is_some());
        assert!(store.read("History", "h1", "u2").await.unwrap().is_none());
        assert_eq!(store.write_count().await, 1);
    }

    #[tokio::test]
    async fn upsert_without_id_is_rejected() {
        let store = MemoryStore::new();
        let err = store.upsert("History", "u1", &json!({"x": 1})).await.unwrap_err();
        assert!(matches!(err, StoreError::Other(_)));
    }

    #[tokio::test]
    async fn query_filters_and_projects() {
        let store = MemoryStore::new();
        store.insert("Users", "b", json!({"id": "b", "dietaryRestrictions": ""})).await;
        store.insert("Users", "a", json!({"id": "a"})).await;
        store.insert("Users", "x", json!({"name": "no id"})).await;

        let ids = store
            .query("Users", &Query::select(&["id"]).where_defined("id"))
            .await
            .unwrap();
        assert_eq!(ids, vec![json!({"id": "a"}), json!({"id": "b"})]);
    }

    #[tokio::test]
    async fn patch_sets_nested_fields() {
        let store = MemoryStore::new();
        store
            .insert(
                "Social",
                "post",
                json!({"id": "p1", "comments": [{"id": "c1", "text": "ciao"}]}),
            )
            .await;

        store
            .patch(
                "Social",
                "p1",
                "post",
                &[
                    PatchOperation::set("/comments/0/removed", true),
                    PatchOperation::set("/comments/0/text", "Removed"),
                ],
            )
            .await
            .unwrap();

        let post = store.get("Social", "p1", "post").await.unwrap();
        assert_eq!(post["comments"][0], json!({"id": "c1", "text": "Removed", "removed": true}));
    }

    #[tokio::test]
    async fn patch_is_all_or_nothing() {
        let store = MemoryStore::new();
        store.insert("Social", "post", json!({"id": "p1", "comments": []})).await;

        let err = store
            .patch(
                "Social",
                "p1",
                "post",
                &[
                    PatchOperation::set("/flag", true),
                    PatchOperation::set("/comments/3/text", "Removed"),
                ],
            )
            .await
            .unwrap_err();
        assert!(matches!(err, StoreError::Other(_)));
        assert_eq!(
            store.get("Social", "p1", "post").await.unwrap(),
            json!({"id": "p1", "comments": []})
        );
        assert_eq!(store.write_count().await, 0);
    }

    #[tokio::test]
    async fn patch_missing_document() {
        let store = MemoryStore::new();
        let err = store.patch("Social", "nope", "post", &[]).await.unwrap_err();
        assert!(matches!(err, StoreError::NotFound(_)));
    }
}
