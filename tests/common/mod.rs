#![allow(dead_code)]

use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use serde_json::{Map, Value};
use tokio::sync::{oneshot, Mutex};

use erp_data_layer::database::{Document, DocumentStore, MemoryStore, StoreError};
use erp_data_layer::filter::Constraint;
use erp_data_layer::notify::{ChannelNotifier, NotificationFeed};
use erp_data_layer::permission::{Authorization, PermissionSource};
use erp_data_layer::registry::CollectionPath;
use erp_data_layer::session::Session;

/// Memory store wrapper that counts calls, can be switched into failure,
/// and can hold a list call open after it has read its documents.
#[derive(Default)]
pub struct FlakyStore {
    inner: MemoryStore,
    calls: AtomicUsize,
    list_calls: AtomicUsize,
    failing: AtomicBool,
    held_list: Mutex<Option<oneshot::Receiver<()>>>,
    parked: AtomicBool,
    mutation_delay: Mutex<Option<Duration>>,
    active_mutations: AtomicUsize,
    max_active_mutations: AtomicUsize,
}

impl FlakyStore {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub fn inner(&self) -> &MemoryStore {
        &self.inner
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    pub fn list_calls(&self) -> usize {
        self.list_calls.load(Ordering::SeqCst)
    }

    /// True while a held list call is waiting for release
    pub fn is_parked(&self) -> bool {
        self.parked.load(Ordering::SeqCst)
    }

    pub fn set_failing(&self, failing: bool) {
        self.failing.store(failing, Ordering::SeqCst);
    }

    /// The next list call reads its documents, then waits for the returned sender
    pub async fn hold_next_list(&self) -> oneshot::Sender<()> {
        let (tx, rx) = oneshot::channel();
        *self.held_list.lock().await = Some(rx);
        tx
    }

    /// Stretch every mutation so overlapping ones would be observable
    pub async fn slow_mutations(&self, delay: Duration) {
        *self.mutation_delay.lock().await = Some(delay);
    }

    pub fn max_active_mutations(&self) -> usize {
        self.max_active_mutations.load(Ordering::SeqCst)
    }

    fn enter(&self) -> Result<(), StoreError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        if self.failing.load(Ordering::SeqCst) {
            return Err(StoreError::Connection("connection refused".to_string()));
        }
        Ok(())
    }

    async fn mutation<T>(&self, op: impl std::future::Future<Output = Result<T, StoreError>>) -> Result<T, StoreError> {
        self.enter()?;
        let active = self.active_mutations.fetch_add(1, Ordering::SeqCst) + 1;
        self.max_active_mutations.fetch_max(active, Ordering::SeqCst);
        let delay = *self.mutation_delay.lock().await;
        if let Some(delay) = delay {
            tokio::time::sleep(delay).await;
        }
        let result = op.await;
        self.active_mutations.fetch_sub(1, Ordering::SeqCst);
        result
    }
}

#[async_trait]
impl DocumentStore for FlakyStore {
    fn name(&self) -> &'static str {
        "flaky"
    }

    async fn list(&self, path: &CollectionPath, constraints: &[Constraint]) -> Result<Vec<Document>, StoreError> {
        self.enter()?;
        self.list_calls.fetch_add(1, Ordering::SeqCst);
        let result = self.inner.list(path, constraints).await;
        let held = self.held_list.lock().await.take();
        if let Some(release) = held {
            self.parked.store(true, Ordering::SeqCst);
            let _ = release.await;
            self.parked.store(false, Ordering::SeqCst);
        }
        result
    }

    async fn get(&self, path: &CollectionPath, id: &str) -> Result<Option<Document>, StoreError> {
        self.enter()?;
        self.inner.get(path, id).await
    }

    async fn create(&self, path: &CollectionPath, data: Map<String, Value>) -> Result<String, StoreError> {
        self.mutation(self.inner.create(path, data)).await
    }

    async fn update(&self, path: &CollectionPath, id: &str, data: Map<String, Value>) -> Result<(), StoreError> {
        self.mutation(self.inner.update(path, id, data)).await
    }

    async fn delete(&self, path: &CollectionPath, id: &str) -> Result<(), StoreError> {
        self.mutation(self.inner.delete(path, id)).await
    }
}

pub struct Harness {
    pub store: Arc<FlakyStore>,
    pub session: Session,
    pub feed: NotificationFeed,
}

pub fn harness(authorization: Authorization) -> Harness {
    build(authorization, None)
}

pub fn guarded_harness(authorization: Authorization, source: Arc<dyn PermissionSource>) -> Harness {
    build(authorization, Some(source))
}

fn build(authorization: Authorization, source: Option<Arc<dyn PermissionSource>>) -> Harness {
    let store = FlakyStore::new();
    let (notifier, feed) = ChannelNotifier::new();
    let mut builder = Session::builder(store.clone(), authorization).notifier(Arc::new(notifier));
    if let Some(source) = source {
        builder = builder.permission_source(source).enforce_permissions(true);
    }
    let session = builder.build().expect("session");
    Harness { store, session, feed }
}

pub fn path(raw: &str) -> CollectionPath {
    CollectionPath::parse(raw).expect("valid path")
}

/// Yield until `condition` holds; panics after a bounded number of turns
pub async fn wait_until(mut condition: impl FnMut() -> bool) {
    for _ in 0..1000 {
        if condition() {
            return;
        }
        tokio::task::yield_now().await;
    }
    panic!("condition not reached");
}
