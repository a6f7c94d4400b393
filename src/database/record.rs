use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use super::store::Document;

/// System fields that are assigned by the store, never by caller input
const SYSTEM_FIELDS: &[&str] = &["id"];

/// Errors that can occur during Record operations
#[derive(Debug, thiserror::Error)]
pub enum RecordError {
    #[error("System field '{0}' cannot be set on a record")]
    SystemFieldNotAllowed(&'static str),
    #[error("Invalid record data: {0}")]
    InvalidJson(String),
    #[error("Record id cannot be empty")]
    EmptyId,
    #[error("Record does not match expected shape: {0}")]
    Shape(#[source] serde_json::Error),
}

/// A stored document merged with its identity key.
///
/// Records are schemaless; typed shapes are applied with [`Record::cast`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Record {
    id: String,
    #[serde(flatten)]
    fields: Map<String, Value>,
}

impl Record {
    /// Merge a store document with its key; the key wins over any payload `id`
    pub fn from_document(document: Document) -> Result<Self, RecordError> {
        if document.id.trim().is_empty() {
            return Err(RecordError::EmptyId);
        }
        let mut fields = document.data;
        fields.remove("id");
        Ok(Self { id: document.id, fields })
    }

    pub fn id(&self) -> &str {
        &self.id
    }

    pub fn get(&self, field: &str) -> Option<&Value> {
        if field == "id" {
            return None;
        }
        self.fields.get(field)
    }

    pub fn fields(&self) -> &Map<String, Value> {
        &self.fields
    }

    /// Full JSON object including `id`
    pub fn to_value(&self) -> Value {
        let mut map = self.fields.clone();
        map.insert("id".to_string(), Value::String(self.id.clone()));
        Value::Object(map)
    }

    /// Apply a caller-side typed view; nothing is validated on write
    pub fn cast<T: DeserializeOwned>(&self) -> Result<T, RecordError> {
        serde_json::from_value(self.to_value()).map_err(RecordError::Shape)
    }

    /// True when every field of the partial is present with an equal value
    pub fn contains(&self, partial: &Partial) -> bool {
        partial
            .fields()
            .iter()
            .all(|(key, value)| self.fields.get(key) == Some(value))
    }
}

/// Field map supplied to create/update calls
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct Partial(Map<String, Value>);

impl Partial {
    pub fn new() -> Self {
        Self::default()
    }

    /// Create partial from caller JSON, rejecting system fields
    pub fn from_json(json: Value) -> Result<Self, RecordError> {
        match json {
            Value::Object(map) => {
                for key in map.keys() {
                    if let Some(field) = SYSTEM_FIELDS.iter().find(|&&f| f == key.as_str()) {
                        return Err(RecordError::SystemFieldNotAllowed(*field));
                    }
                }
                Ok(Self(map))
            }
            _ => Err(RecordError::InvalidJson("Expected JSON object".to_string())),
        }
    }

    /// Serialize any caller value (typically a struct) into a partial
    pub fn from_serialize<T: Serialize>(value: &T) -> Result<Self, RecordError> {
        let json = serde_json::to_value(value).map_err(|e| RecordError::InvalidJson(e.to_string()))?;
        Self::from_json(json)
    }

    /// Re-check system fields; `set` does not
    pub fn validate(&self) -> Result<(), RecordError> {
        match SYSTEM_FIELDS.iter().find(|&&f| self.0.contains_key(f)) {
            Some(field) => Err(RecordError::SystemFieldNotAllowed(*field)),
            None => Ok(()),
        }
    }

    pub fn set(mut self, field: impl Into<String>, value: impl Into<Value>) -> Self {
        self.0.insert(field.into(), value.into());
        self
    }

    pub fn fields(&self) -> &Map<String, Value> {
        &self.0
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn into_map(self) -> Map<String, Value> {
        self.0
    }
}

impl TryFrom<Value> for Partial {
    type Error = RecordError;

    fn try_from(value: Value) -> Result<Self, Self::Error> {
        Self::from_json(value)
    }
}
