//! Per-feature collection handles.
//!
//! A [`Collection`] caches the records of one physical collection in a watch
//! channel and exposes mutations that write through to the store and then
//! re-fetch. Mutations on the same path are serialized through the session's
//! [`MutationQueues`]; refreshes are ticketed so an older fetch that resolves
//! late never overwrites a newer snapshot.

pub mod queue;

use serde::de::DeserializeOwned;
use std::sync::atomic::{AtomicU64, AtomicUsize, Ordering};
use std::sync::Arc;
use tokio::sync::{watch, Mutex};
use tracing::{debug, warn};

use crate::database::{Partial, Record, RecordError};
use crate::error::{DataError, DataResult};
use crate::fetch::Fetcher;
use crate::filter::Constraint;
use crate::permission::PermissionGate;
use crate::registry::{CollectionEntry, CollectionPath};
use crate::types::Operation;

pub use queue::MutationQueues;

/// Point-in-time view of a collection's local state
#[derive(Debug, Clone, Default, PartialEq)]
pub struct CollectionSnapshot {
    pub records: Vec<Record>,
    pub is_loading: bool,
    /// User-facing message of the last failed refresh, cleared by a successful one
    pub error: Option<String>,
    /// Ticket of the successful refresh that produced `records`; 0 until one succeeds.
    /// A failed refresh sets `error` and leaves this untouched.
    pub revision: u64,
}

impl CollectionSnapshot {
    pub fn is_loaded(&self) -> bool {
        self.revision > 0
    }
}

#[derive(Clone)]
pub struct Collection {
    name: String,
    entry: CollectionEntry,
    constraints: Vec<Constraint>,
    fetcher: Fetcher,
    queue: Arc<Mutex<()>>,
    guard: Option<Arc<PermissionGate>>,
    local: Arc<LocalState>,
}

/// Shared by every clone of a handle
struct LocalState {
    state: watch::Sender<CollectionSnapshot>,
    tickets: AtomicU64,
    /// Newest ticket whose outcome, records or error, reached the snapshot
    settled: AtomicU64,
    in_flight: AtomicUsize,
}

impl Collection {
    pub fn new(
        name: impl Into<String>,
        entry: CollectionEntry,
        fetcher: Fetcher,
        queue: Arc<Mutex<()>>,
    ) -> Self {
        let (state, _) = watch::channel(CollectionSnapshot::default());
        Self {
            name: name.into(),
            entry,
            constraints: Vec::new(),
            fetcher,
            queue,
            guard: None,
            local: Arc::new(LocalState {
                state,
                tickets: AtomicU64::new(0),
                settled: AtomicU64::new(0),
                in_flight: AtomicUsize::new(0),
            }),
        }
    }

    /// Require permission checks on every operation against this handle
    pub fn with_guard(mut self, gate: Arc<PermissionGate>) -> Self {
        self.guard = Some(gate);
        self
    }

    /// Constraints applied to every refresh
    pub fn with_constraints(mut self, constraints: Vec<Constraint>) -> Self {
        self.constraints = constraints;
        self
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn path(&self) -> &CollectionPath {
        &self.entry.path
    }

    pub fn module(&self) -> &str {
        &self.entry.module
    }

    /// Records as of the last applied refresh
    pub fn data(&self) -> Vec<Record> {
        self.local.state.borrow().records.clone()
    }

    /// Apply a caller-side typed view to the cached records
    pub fn data_as<T: DeserializeOwned>(&self) -> Result<Vec<T>, RecordError> {
        self.local.state.borrow().records.iter().map(Record::cast).collect()
    }

    pub fn is_loading(&self) -> bool {
        self.local.state.borrow().is_loading
    }

    pub fn snapshot(&self) -> CollectionSnapshot {
        self.local.state.borrow().clone()
    }

    pub fn subscribe(&self) -> watch::Receiver<CollectionSnapshot> {
        self.local.state.subscribe()
    }

    /// Re-fetch the collection and replace the cached records
    pub async fn refresh(&self) -> DataResult<usize> {
        self.authorize(Operation::Select).await?;
        self.reload().await
    }

    /// Create a record; returns the store-assigned id
    pub async fn add(&self, partial: Partial) -> DataResult<String> {
        partial.validate()?;
        self.authorize(Operation::Create).await?;

        let _turn = self.queue.lock().await;
        let store = self.fetcher.store();
        match store.create(self.path(), partial.into_map()).await {
            Ok(id) => {
                self.fetcher.notifier().success(Operation::Create.success_message());
                self.resync(Operation::Create).await;
                Ok(id)
            }
            Err(err) => Err(self.fetcher.report(self.path(), Operation::Create, err)),
        }
    }

    /// Shallow-merge `partial` into the record with `id`
    pub async fn update(&self, id: &str, partial: Partial) -> DataResult<()> {
        partial.validate()?;
        self.authorize(Operation::Update).await?;

        let _turn = self.queue.lock().await;
        let store = self.fetcher.store();
        match store.update(self.path(), id, partial.into_map()).await {
            Ok(()) => {
                self.fetcher.notifier().success(Operation::Update.success_message());
                self.resync(Operation::Update).await;
                Ok(())
            }
            Err(err) => Err(self.fetcher.report(self.path(), Operation::Update, err)),
        }
    }

    pub async fn remove(&self, id: &str) -> DataResult<()> {
        self.authorize(Operation::Delete).await?;

        let _turn = self.queue.lock().await;
        let store = self.fetcher.store();
        match store.delete(self.path(), id).await {
            Ok(()) => {
                self.fetcher.notifier().success(Operation::Delete.success_message());
                self.resync(Operation::Delete).await;
                Ok(())
            }
            Err(err) => Err(self.fetcher.report(self.path(), Operation::Delete, err)),
        }
    }

    async fn authorize(&self, operation: Operation) -> DataResult<()> {
        let Some(gate) = &self.guard else {
            return Ok(());
        };
        let action = operation.required_action();
        if gate.check(self.module(), action).await {
            return Ok(());
        }
        let err = DataError::forbidden(self.module(), action);
        warn!("{} on {} denied: {}", operation, self.path(), err);
        self.fetcher.notifier().error(&err.user_message());
        Err(err)
    }

    /// Refresh after a committed mutation. The mutation already succeeded, so a
    /// failed refresh only shows up in the snapshot.
    async fn resync(&self, operation: Operation) {
        if let Err(err) = self.reload().await {
            warn!("{} on {} committed but refresh failed: {}", operation, self.path(), err);
        }
    }

    async fn reload(&self) -> DataResult<usize> {
        let local = &self.local;
        let ticket = local.tickets.fetch_add(1, Ordering::SeqCst) + 1;
        // in_flight only changes under the watch lock, together with is_loading
        local.state.send_modify(|snapshot| {
            local.in_flight.fetch_add(1, Ordering::SeqCst);
            snapshot.is_loading = true;
        });

        let result = self.fetcher.fetch_path(self.path(), &self.constraints).await;

        let count = result.as_ref().map(Vec::len).unwrap_or(0);
        let mut applied = false;

        local.state.send_if_modified(|snapshot| {
            let remaining = local.in_flight.fetch_sub(1, Ordering::SeqCst) - 1;
            let was_loading = snapshot.is_loading;
            snapshot.is_loading = remaining > 0;
            if ticket <= local.settled.load(Ordering::SeqCst) {
                return was_loading != snapshot.is_loading;
            }
            local.settled.store(ticket, Ordering::SeqCst);
            applied = true;
            match &result {
                Ok(records) => {
                    snapshot.records = records.clone();
                    snapshot.error = None;
                    snapshot.revision = ticket;
                }
                Err(err) => snapshot.error = Some(err.user_message()),
            }
            true
        });

        if applied {
            debug!("{} refresh #{} applied ({} records)", self.path(), ticket, count);
        } else {
            debug!("{} refresh #{} superseded, discarded", self.path(), ticket);
        }
        result.map(|records| records.len())
    }
}
