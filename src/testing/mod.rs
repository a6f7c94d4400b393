use serde_json::Value;
use std::sync::Arc;

use crate::database::MemoryStore;
use crate::notify::{ChannelNotifier, NotificationFeed};
use crate::permission::{Authorization, PermissionSource};
use crate::registry::CollectionPath;
use crate::session::Session;

/// Session over an in-memory store with a captured notification feed
pub struct TestContext {
    pub store: Arc<MemoryStore>,
    pub session: Session,
    pub feed: NotificationFeed,
}

impl TestContext {
    pub fn new(authorization: Authorization) -> Self {
        Self::build(authorization, None)
    }

    /// Permission enforcement on, backed by `source`
    pub fn guarded(authorization: Authorization, source: Arc<dyn PermissionSource>) -> Self {
        Self::build(authorization, Some(source))
    }

    fn build(authorization: Authorization, source: Option<Arc<dyn PermissionSource>>) -> Self {
        let store = Arc::new(MemoryStore::new());
        let (notifier, feed) = ChannelNotifier::new();
        let mut builder = Session::builder(store.clone(), authorization).notifier(Arc::new(notifier));
        if let Some(source) = source {
            builder = builder.permission_source(source).enforce_permissions(true);
        }
        let session = builder.build().expect("test session");
        Self { store, session, feed }
    }

    /// Seed a document under a logical collection name
    pub async fn seed(&self, name: &str, id: &str, data: Value) {
        let path = self.path(name);
        self.store.seed(&path, id, data).await.expect("seed document");
    }

    pub fn path(&self, name: &str) -> CollectionPath {
        self.session
            .registry()
            .resolve_path(name)
            .cloned()
            .unwrap_or_else(|| panic!("unregistered collection {}", name))
    }
}
