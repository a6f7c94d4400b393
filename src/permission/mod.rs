//! Permission gate: `(module, action)` checks keyed by the caller's authorization.
//!
//! Admins are allowed everything without a lookup. Scoped users are checked
//! against a [`PermissionSource`]; a missing entry or a failed lookup denies.

pub mod gate;
pub mod source;

use serde::{Deserialize, Deserializer, Serialize};
use std::collections::HashMap;
use thiserror::Error;
use tracing::warn;

use crate::database::StoreError;
use crate::types::Action;

pub use gate::PermissionGate;
pub use source::{PermissionSource, StaticPermissions, StorePermissions};

/// Who is asking: the explicit two-way authorization decision
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Authorization {
    Admin,
    Scoped { user_id: String },
}

impl Authorization {
    pub fn scoped(user_id: impl Into<String>) -> Self {
        Authorization::Scoped { user_id: user_id.into() }
    }

    pub fn is_admin(&self) -> bool {
        matches!(self, Authorization::Admin)
    }

    pub fn user_id(&self) -> Option<&str> {
        match self {
            Authorization::Admin => None,
            Authorization::Scoped { user_id } => Some(user_id),
        }
    }
}

/// Lifecycle of a single check. `Loading` is treated as a denial.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PermissionState {
    Loading,
    Resolved(bool),
}

impl PermissionState {
    pub fn is_allowed(&self) -> bool {
        matches!(self, PermissionState::Resolved(true))
    }

    pub fn is_loading(&self) -> bool {
        matches!(self, PermissionState::Loading)
    }
}

/// Per-user permission document: module id -> action -> allowed
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct PermissionDocument {
    #[serde(rename = "isAdmin", default)]
    pub is_admin: bool,
    #[serde(default, alias = "permissions", deserialize_with = "lenient_modules")]
    pub modules: HashMap<String, HashMap<Action, bool>>,
}

/// Unknown action keys are dropped so one stray entry does not void the document
fn lenient_modules<'de, D>(deserializer: D) -> Result<HashMap<String, HashMap<Action, bool>>, D::Error>
where
    D: Deserializer<'de>,
{
    let raw: HashMap<String, HashMap<String, bool>> = HashMap::deserialize(deserializer)?;
    Ok(raw
        .into_iter()
        .map(|(module, actions)| {
            let actions = actions
                .into_iter()
                .filter_map(|(key, allowed)| match key.parse::<Action>() {
                    Ok(action) => Some((action, allowed)),
                    Err(_) => {
                        warn!("Ignoring unknown permission action '{}' on {}", key, module);
                        None
                    }
                })
                .collect();
            (module, actions)
        })
        .collect())
}

impl PermissionDocument {
    /// Stored admin flag wins; otherwise only an explicit `true` allows
    pub fn allows(&self, module: &str, action: Action) -> bool {
        if self.is_admin {
            return true;
        }
        self.modules
            .get(module)
            .and_then(|actions| actions.get(&action))
            .copied()
            .unwrap_or(false)
    }
}

#[derive(Debug, Error)]
pub enum PermissionError {
    #[error("Permission store error: {0}")]
    Store(#[from] StoreError),

    #[error("Malformed permission document for {user_id}: {source}")]
    Malformed {
        user_id: String,
        #[source]
        source: serde_json::Error,
    },

    #[error("Permission lookup failed: {0}")]
    Lookup(String),
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn document_parses_stored_shape() {
        let doc: PermissionDocument = serde_json::from_value(json!({
            "modules": { "garage-services": { "view": true, "delete": false } }
        }))
        .unwrap();
        assert!(doc.allows("garage-services", Action::View));
        assert!(!doc.allows("garage-services", Action::Delete));
        assert!(!doc.allows("garage-services", Action::Edit));
        assert!(!doc.allows("hr-employees", Action::View));
    }

    #[test]
    fn unknown_action_keys_are_ignored() {
        let doc: PermissionDocument = serde_json::from_value(json!({
            "modules": {
                "accounting-invoices": { "view": true, "approve": true },
                "hr-employees": { "edit": true }
            }
        }))
        .unwrap();
        assert!(doc.allows("accounting-invoices", Action::View));
        assert!(!doc.allows("accounting-invoices", Action::Edit));
        assert!(doc.allows("hr-employees", Action::Edit));
        assert_eq!(doc.modules["accounting-invoices"].len(), 1);
    }

    #[test]
    fn non_boolean_grant_is_still_malformed() {
        let parsed = serde_json::from_value::<PermissionDocument>(json!({
            "modules": { "hr-employees": { "view": "yes" } }
        }));
        assert!(parsed.is_err());
    }

    #[test]
    fn stored_admin_flag_allows_everything() {
        let doc: PermissionDocument = serde_json::from_value(json!({ "isAdmin": true })).unwrap();
        assert!(Action::ALL.iter().all(|a| doc.allows("anything", *a)));
    }

    #[test]
    fn loading_denies() {
        assert!(!PermissionState::Loading.is_allowed());
        assert!(!PermissionState::Resolved(false).is_allowed());
        assert!(PermissionState::Resolved(true).is_allowed());
    }
}
