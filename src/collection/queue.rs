use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::{Mutex, RwLock};

use crate::registry::CollectionPath;

/// Session-wide mutation locks, one per physical collection path.
///
/// Every handle on the same path shares one lock, so a mutation and its
/// follow-up refresh finish before the next mutation on that path starts.
#[derive(Default)]
pub struct MutationQueues {
    locks: RwLock<HashMap<String, Arc<Mutex<()>>>>,
}

impl MutationQueues {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn lock_for(&self, path: &CollectionPath) -> Arc<Mutex<()>> {
        // Fast path: lock already exists
        {
            let locks = self.locks.read().await;
            if let Some(lock) = locks.get(path.as_str()) {
                return Arc::clone(lock);
            }
        }

        let mut locks = self.locks.write().await;
        Arc::clone(locks.entry(path.to_string()).or_default())
    }

    pub async fn len(&self) -> usize {
        self.locks.read().await.len()
    }
}
