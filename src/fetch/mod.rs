use std::sync::Arc;
use tracing::{debug, error, warn};

use crate::database::{DocumentStore, Record, StoreError};
use crate::error::{DataError, DataResult};
use crate::filter::Constraint;
use crate::notify::Notifier;
use crate::registry::CollectionPath;
use crate::types::Operation;

/// Bulk reads against the document store.
///
/// Each call is one store round trip. Nothing is cached between calls and
/// there is no pagination beyond what the constraints ask for.
#[derive(Clone)]
pub struct Fetcher {
    store: Arc<dyn DocumentStore>,
    notifier: Arc<dyn Notifier>,
}

impl Fetcher {
    pub fn new(store: Arc<dyn DocumentStore>, notifier: Arc<dyn Notifier>) -> Self {
        Self { store, notifier }
    }

    /// Fetch every record at `path` matching `constraints`.
    ///
    /// An empty or malformed path fails before the store is contacted.
    pub async fn fetch_all(&self, path: &str, constraints: &[Constraint]) -> DataResult<Vec<Record>> {
        let path = self.parse_path(path)?;
        self.fetch_path(&path, constraints).await
    }

    pub async fn fetch_path(&self, path: &CollectionPath, constraints: &[Constraint]) -> DataResult<Vec<Record>> {
        debug!("fetch {} ({} constraints) via {}", path, constraints.len(), self.store.name());

        let documents = match self.store.list(path, constraints).await {
            Ok(documents) => documents,
            Err(err) => return Err(self.report(path, Operation::Select, err)),
        };

        let mut records = Vec::with_capacity(documents.len());
        for document in documents {
            let id = document.id.clone();
            match Record::from_document(document) {
                Ok(record) => records.push(record),
                Err(err) => warn!("Dropping document '{}' from {}: {}", id, path, err),
            }
        }
        Ok(records)
    }

    /// Fetch a single record by id; `Ok(None)` when it does not exist
    pub async fn fetch_one(&self, path: &str, id: &str) -> DataResult<Option<Record>> {
        let path = self.parse_path(path)?;

        let document = match self.store.get(&path, id).await {
            Ok(document) => document,
            Err(err) => return Err(self.report(&path, Operation::Select, err)),
        };

        match document.map(Record::from_document).transpose() {
            Ok(record) => Ok(record),
            Err(err) => {
                warn!("Dropping document '{}' from {}: {}", id, path, err);
                Ok(None)
            }
        }
    }

    pub fn store(&self) -> &Arc<dyn DocumentStore> {
        &self.store
    }

    pub fn notifier(&self) -> &Arc<dyn Notifier> {
        &self.notifier
    }

    fn parse_path(&self, raw: &str) -> DataResult<CollectionPath> {
        CollectionPath::parse(raw).map_err(|err| {
            let err = DataError::from(err);
            error!("Refusing fetch with invalid collection path '{}': {}", raw, err);
            self.notifier.error(&err.user_message());
            err
        })
    }

    /// Log the technical detail, notify once with a generic message
    pub(crate) fn report(&self, path: &CollectionPath, operation: Operation, err: StoreError) -> DataError {
        error!("{} on {} failed: {}", operation, path, err);
        self.notifier.error(operation.failure_message());
        classify(err)
    }
}

/// Constraint problems surface as filter errors, everything else as store errors
pub(crate) fn classify(err: StoreError) -> DataError {
    match err {
        StoreError::Constraint(err) => DataError::Filter(err),
        other => DataError::Store(other),
    }
}
