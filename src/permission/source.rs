use async_trait::async_trait;
use serde_json::Value;
use std::collections::HashMap;
use std::sync::Arc;

use super::{PermissionDocument, PermissionError};
use crate::database::DocumentStore;
use crate::registry::CollectionPath;
use crate::types::Action;

/// Where per-user permission documents come from
#[async_trait]
pub trait PermissionSource: Send + Sync {
    /// `Ok(None)` when the user has no document at all
    async fn load(&self, user_id: &str) -> Result<Option<PermissionDocument>, PermissionError>;
}

/// Fixed in-memory table, for tests and local tooling
#[derive(Debug, Clone, Default)]
pub struct StaticPermissions {
    users: HashMap<String, PermissionDocument>,
}

impl StaticPermissions {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn grant(mut self, user_id: &str, module: &str, action: Action, allowed: bool) -> Self {
        self.users
            .entry(user_id.to_string())
            .or_default()
            .modules
            .entry(module.to_string())
            .or_default()
            .insert(action, allowed);
        self
    }
}

#[async_trait]
impl PermissionSource for StaticPermissions {
    async fn load(&self, user_id: &str) -> Result<Option<PermissionDocument>, PermissionError> {
        Ok(self.users.get(user_id).cloned())
    }
}

/// Reads document `<user id>` from the permissions collection
pub struct StorePermissions {
    store: Arc<dyn DocumentStore>,
    path: CollectionPath,
}

impl StorePermissions {
    pub fn new(store: Arc<dyn DocumentStore>, path: CollectionPath) -> Self {
        Self { store, path }
    }

    pub fn path(&self) -> &CollectionPath {
        &self.path
    }
}

#[async_trait]
impl PermissionSource for StorePermissions {
    async fn load(&self, user_id: &str) -> Result<Option<PermissionDocument>, PermissionError> {
        let Some(document) = self.store.get(&self.path, user_id).await? else {
            return Ok(None);
        };
        serde_json::from_value(Value::Object(document.data))
            .map(Some)
            .map_err(|source| PermissionError::Malformed {
                user_id: user_id.to_string(),
                source,
            })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::database::MemoryStore;
    use serde_json::json;

    #[tokio::test]
    async fn store_source_reads_user_document() {
        let store = Arc::new(MemoryStore::new());
        let path = CollectionPath::parse("system/permissions").unwrap();
        store
            .seed(&path, "u1", json!({ "modules": { "hr-employees": { "view": true } } }))
            .await
            .unwrap();
        store.seed(&path, "u2", json!({ "modules": "nonsense" })).await.unwrap();

        let source = StorePermissions::new(store, path);
        let doc = source.load("u1").await.unwrap().unwrap();
        assert!(doc.allows("hr-employees", Action::View));
        assert!(source.load("nobody").await.unwrap().is_none());
        assert!(matches!(source.load("u2").await, Err(PermissionError::Malformed { .. })));
    }

    #[tokio::test]
    async fn static_grants_accumulate() {
        let source = StaticPermissions::new()
            .grant("u1", "crm-clients", Action::View, true)
            .grant("u1", "crm-clients", Action::Export, false);
        let doc = source.load("u1").await.unwrap().unwrap();
        assert!(doc.allows("crm-clients", Action::View));
        assert!(!doc.allows("crm-clients", Action::Export));
    }
}
