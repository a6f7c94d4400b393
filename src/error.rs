// Data access error types
use serde_json::{json, Value};
use std::path::PathBuf;
use thiserror::Error;

use crate::database::record::RecordError;
use crate::database::store::StoreError;
use crate::filter::error::FilterError;
use crate::types::Action;

/// Configuration errors: invalid paths, unknown collections, bad settings
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Collection path is empty")]
    EmptyPath,

    #[error("Invalid collection path: {0}")]
    InvalidPath(String),

    #[error("Unknown collection: {0}")]
    UnknownCollection(String),

    #[error("Missing configuration: {0}")]
    Missing(&'static str),

    #[error("Invalid database URL: {0}")]
    InvalidDatabaseUrl(String),

    #[error("Failed to read {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Invalid collection registry file: {0}")]
    Yaml(#[from] serde_yaml::Error),
}

/// Top-level error surfaced by fetches, mutations and permission-gated calls
#[derive(Debug, Error)]
pub enum DataError {
    #[error(transparent)]
    Configuration(#[from] ConfigError),

    #[error(transparent)]
    Store(#[from] StoreError),

    #[error(transparent)]
    Record(#[from] RecordError),

    #[error(transparent)]
    Filter(#[from] FilterError),

    #[error("Permission denied: {action} on {module}")]
    Forbidden { module: String, action: Action },
}

pub type DataResult<T> = Result<T, DataError>;

impl DataError {
    pub fn forbidden(module: impl Into<String>, action: Action) -> Self {
        DataError::Forbidden {
            module: module.into(),
            action,
        }
    }

    /// Get error code for client handling
    pub fn code(&self) -> &'static str {
        match self {
            DataError::Configuration(_) => "CONFIGURATION_ERROR",
            DataError::Store(StoreError::NotFound { .. }) => "NOT_FOUND",
            DataError::Store(StoreError::Connection(_)) => "SERVICE_UNAVAILABLE",
            DataError::Store(_) => "TRANSPORT_ERROR",
            DataError::Record(_) => "VALIDATION_ERROR",
            DataError::Filter(_) => "INVALID_CONSTRAINT",
            DataError::Forbidden { .. } => "FORBIDDEN",
        }
    }

    /// Generic message safe to show to the user; technical detail goes to the log
    pub fn user_message(&self) -> String {
        match self {
            DataError::Configuration(ConfigError::UnknownCollection(name)) => {
                format!("Collection '{}' is not configured", name)
            }
            DataError::Configuration(ConfigError::EmptyPath) => {
                "Collection path is not configured".to_string()
            }
            DataError::Configuration(_) => "Data source is misconfigured".to_string(),
            DataError::Store(StoreError::NotFound { .. }) => "Record not found".to_string(),
            DataError::Store(StoreError::Connection(_)) => {
                "Data service temporarily unavailable".to_string()
            }
            DataError::Store(_) => "An error occurred while contacting the data service".to_string(),
            DataError::Record(err) => err.to_string(),
            DataError::Filter(_) => "Invalid query".to_string(),
            DataError::Forbidden { module, action } => {
                format!("You do not have permission to {} {}", action, module)
            }
        }
    }

    pub fn is_configuration(&self) -> bool {
        matches!(self, DataError::Configuration(_))
    }

    pub fn is_forbidden(&self) -> bool {
        matches!(self, DataError::Forbidden { .. })
    }

    /// Convert to JSON body for CLI output
    pub fn to_json(&self) -> Value {
        json!({
            "error": true,
            "message": self.user_message(),
            "code": self.code(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn codes_follow_taxonomy() {
        let err = DataError::from(ConfigError::EmptyPath);
        assert_eq!(err.code(), "CONFIGURATION_ERROR");
        assert!(err.is_configuration());

        let err = DataError::from(StoreError::Backend("boom".to_string()));
        assert_eq!(err.code(), "TRANSPORT_ERROR");

        let err = DataError::forbidden("garage-services", Action::Delete);
        assert_eq!(err.code(), "FORBIDDEN");
        assert_eq!(
            err.user_message(),
            "You do not have permission to delete garage-services"
        );
    }

    #[test]
    fn transport_detail_stays_out_of_user_message() {
        let err = DataError::from(StoreError::Backend("relation \"documents\" does not exist".to_string()));
        assert!(!err.user_message().contains("documents"));
        assert_eq!(err.to_json()["code"], "TRANSPORT_ERROR");
    }
}
