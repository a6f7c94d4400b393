use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use thiserror::Error;

use crate::filter::{Constraint, FilterError};
use crate::registry::CollectionPath;

/// Errors from document store backends
#[derive(Debug, Error)]
pub enum StoreError {
    #[error("Document {id} not found in {path}")]
    NotFound { path: String, id: String },

    #[error("Connection error: {0}")]
    Connection(String),

    #[error("Backend error: {0}")]
    Backend(String),

    #[error("Invalid constraint: {0}")]
    Constraint(#[from] FilterError),

    #[error("Invalid document: {0}")]
    InvalidDocument(String),

    #[error(transparent)]
    Sqlx(#[from] sqlx::Error),
}

impl StoreError {
    pub fn not_found(path: &CollectionPath, id: &str) -> Self {
        StoreError::NotFound {
            path: path.to_string(),
            id: id.to_string(),
        }
    }
}

/// Raw stored payload plus its identity key
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Document {
    pub id: String,
    pub data: Map<String, Value>,
}

/// Remote document store seam. Every method is one independent round trip;
/// nothing is cached or coordinated between calls.
#[async_trait]
pub trait DocumentStore: Send + Sync {
    /// Backend name for logging
    fn name(&self) -> &'static str;

    /// Bulk read. Constraints are applied by the backend in list order.
    async fn list(&self, path: &CollectionPath, constraints: &[Constraint]) -> Result<Vec<Document>, StoreError>;

    async fn get(&self, path: &CollectionPath, id: &str) -> Result<Option<Document>, StoreError>;

    /// Insert a new document; the store assigns and returns its id
    async fn create(&self, path: &CollectionPath, data: Map<String, Value>) -> Result<String, StoreError>;

    /// Shallow-merge fields into an existing document
    async fn update(&self, path: &CollectionPath, id: &str, data: Map<String, Value>) -> Result<(), StoreError>;

    async fn delete(&self, path: &CollectionPath, id: &str) -> Result<(), StoreError>;

    async fn health_check(&self) -> Result<(), StoreError> {
        Ok(())
    }
}
