use async_trait::async_trait;
use serde_json::{Map, Value};
use std::collections::HashMap;
use tokio::sync::RwLock;
use uuid::Uuid;

use super::store::{Document, DocumentStore, StoreError};
use crate::filter::{fold_constraints, Constraint, DocumentQuery};
use crate::registry::CollectionPath;

/// In-process document store. Collections keep insertion order.
#[derive(Default)]
pub struct MemoryStore {
    collections: RwLock<HashMap<String, Vec<Document>>>,
    max_limit: Option<i32>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_max_limit(mut self, max_limit: Option<i32>) -> Self {
        self.max_limit = max_limit;
        self
    }

    /// Insert a document under a caller-chosen id, replacing any existing one
    pub async fn seed(&self, path: &CollectionPath, id: impl Into<String>, data: Value) -> Result<(), StoreError> {
        let Value::Object(mut data) = data else {
            return Err(StoreError::InvalidDocument("expected JSON object".to_string()));
        };
        data.remove("id");
        let id = id.into();
        let mut collections = self.collections.write().await;
        let documents = collections.entry(path.to_string()).or_default();
        documents.retain(|doc| doc.id != id);
        documents.push(Document { id, data });
        Ok(())
    }

    pub async fn len(&self, path: &CollectionPath) -> usize {
        let collections = self.collections.read().await;
        collections.get(path.as_str()).map_or(0, Vec::len)
    }
}

#[async_trait]
impl DocumentStore for MemoryStore {
    fn name(&self) -> &'static str {
        "memory"
    }

    async fn list(&self, path: &CollectionPath, constraints: &[Constraint]) -> Result<Vec<Document>, StoreError> {
        let filter_data = fold_constraints(constraints)?;
        let query = DocumentQuery::from_filter(&filter_data, self.max_limit)?;

        let collections = self.collections.read().await;
        let Some(documents) = collections.get(path.as_str()) else {
            return Ok(vec![]);
        };
        let results = query
            .apply(documents.iter().map(|doc| (doc.id.as_str(), &doc.data)))
            .into_iter()
            .map(|(id, data)| Document { id, data })
            .collect::<Vec<_>>();

        tracing::debug!("memory list {} -> {} documents", path, results.len());
        Ok(results)
    }

    async fn get(&self, path: &CollectionPath, id: &str) -> Result<Option<Document>, StoreError> {
        let collections = self.collections.read().await;
        Ok(collections
            .get(path.as_str())
            .and_then(|docs| docs.iter().find(|doc| doc.id == id))
            .cloned())
    }

    async fn create(&self, path: &CollectionPath, mut data: Map<String, Value>) -> Result<String, StoreError> {
        data.remove("id");
        let id = Uuid::new_v4().to_string();
        let mut collections = self.collections.write().await;
        collections
            .entry(path.to_string())
            .or_default()
            .push(Document { id: id.clone(), data });
        tracing::debug!("memory create {}/{}", path, id);
        Ok(id)
    }

    async fn update(&self, path: &CollectionPath, id: &str, data: Map<String, Value>) -> Result<(), StoreError> {
        let mut collections = self.collections.write().await;
        let document = collections
            .get_mut(path.as_str())
            .and_then(|docs| docs.iter_mut().find(|doc| doc.id == id))
            .ok_or_else(|| StoreError::not_found(path, id))?;
        for (key, value) in data {
            if key != "id" {
                document.data.insert(key, value);
            }
        }
        tracing::debug!("memory update {}/{}", path, id);
        Ok(())
    }

    async fn delete(&self, path: &CollectionPath, id: &str) -> Result<(), StoreError> {
        let mut collections = self.collections.write().await;
        let documents = collections
            .get_mut(path.as_str())
            .ok_or_else(|| StoreError::not_found(path, id))?;
        let before = documents.len();
        documents.retain(|doc| doc.id != id);
        if documents.len() == before {
            return Err(StoreError::not_found(path, id));
        }
        tracing::debug!("memory delete {}/{}", path, id);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::filter::SortDirection;
    use serde_json::json;

    fn path(raw: &str) -> CollectionPath {
        CollectionPath::parse(raw).unwrap()
    }

    #[tokio::test]
    async fn create_assigns_unique_ids() {
        let store = MemoryStore::new();
        let employees = path("hr/employees");
        let a = store.create(&employees, Map::new()).await.unwrap();
        let b = store.create(&employees, Map::new()).await.unwrap();
        assert_ne!(a, b);
        assert_eq!(store.len(&employees).await, 2);
    }

    #[tokio::test]
    async fn update_merges_and_keeps_id() {
        let store = MemoryStore::new();
        let employees = path("hr/employees");
        store.seed(&employees, "e1", json!({ "firstName": "Jean", "age": 40 })).await.unwrap();

        let patch = json!({ "age": 41, "id": "other" }).as_object().cloned().unwrap();
        store.update(&employees, "e1", patch).await.unwrap();

        let doc = store.get(&employees, "e1").await.unwrap().unwrap();
        assert_eq!(doc.id, "e1");
        assert_eq!(doc.data, json!({ "firstName": "Jean", "age": 41 }).as_object().cloned().unwrap());
    }

    #[tokio::test]
    async fn missing_documents_are_not_found() {
        let store = MemoryStore::new();
        let employees = path("hr/employees");
        assert!(matches!(
            store.update(&employees, "nope", Map::new()).await,
            Err(StoreError::NotFound { .. })
        ));
        assert!(matches!(store.delete(&employees, "nope").await, Err(StoreError::NotFound { .. })));
        assert!(store.get(&employees, "nope").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn list_applies_constraints() {
        let store = MemoryStore::new();
        let services = path("garage/services");
        store.seed(&services, "s1", json!({ "name": "Oil change", "price": 80 })).await.unwrap();
        store.seed(&services, "s2", json!({ "name": "Brakes", "price": 250 })).await.unwrap();
        store.seed(&services, "s3", json!({ "name": "Tyres", "price": 400 })).await.unwrap();

        let docs = store
            .list(
                &services,
                &[
                    Constraint::where_clause(json!({ "price": { "$gte": 100 } })),
                    Constraint::order_by("price", SortDirection::Desc),
                    Constraint::limit(1),
                ],
            )
            .await
            .unwrap();
        assert_eq!(docs.len(), 1);
        assert_eq!(docs[0].id, "s3");
    }

    #[tokio::test]
    async fn invalid_constraints_fail_before_reading() {
        let store = MemoryStore::new();
        let result = store.list(&path("hr/employees"), &[Constraint::limit(-5)]).await;
        assert!(matches!(result, Err(StoreError::Constraint(_))));
    }
}
