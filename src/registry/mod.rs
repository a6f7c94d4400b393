//! Collection path registry: logical names such as `HR.EMPLOYEES` mapped to
//! physical storage paths such as `hr/employees`.
//!
//! A lookup miss is a configuration error. Callers must not issue a store request
//! for a name that did not resolve.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;
use std::path::Path;

use crate::error::ConfigError;

/// A validated physical storage path: `/`-separated segments of `[A-Za-z0-9_-]`
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct CollectionPath(String);

impl CollectionPath {
    pub fn parse(raw: &str) -> Result<Self, ConfigError> {
        let trimmed = raw.trim().trim_matches('/');
        if trimmed.is_empty() {
            return Err(ConfigError::EmptyPath);
        }
        for segment in trimmed.split('/') {
            if segment.is_empty() {
                return Err(ConfigError::InvalidPath(format!("empty segment in '{}'", raw)));
            }
            if !segment
                .chars()
                .all(|c| c.is_ascii_alphanumeric() || c == '_' || c == '-')
            {
                return Err(ConfigError::InvalidPath(raw.to_string()));
            }
        }
        Ok(Self(trimmed.to_string()))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Permission module id derived from the path (`garage/services` -> `garage-services`)
    pub fn module_id(&self) -> String {
        self.0.replace('/', "-")
    }
}

impl fmt::Display for CollectionPath {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl TryFrom<String> for CollectionPath {
    type Error = ConfigError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Self::parse(&value)
    }
}

impl From<CollectionPath> for String {
    fn from(path: CollectionPath) -> Self {
        path.0
    }
}

impl AsRef<str> for CollectionPath {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct CollectionEntry {
    pub path: CollectionPath,
    pub module: String,
}

impl CollectionEntry {
    pub fn new(path: CollectionPath) -> Self {
        let module = path.module_id();
        Self { path, module }
    }
}

#[derive(Debug, Deserialize)]
struct RegistryFile {
    #[serde(default)]
    collections: BTreeMap<String, EntrySpec>,
}

#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum EntrySpec {
    Path(String),
    Full { path: String, module: Option<String> },
}

/// Built-in logical collection names for every ERP module
const BUILTIN: &[(&str, &str)] = &[
    ("HR.EMPLOYEES", "hr/employees"),
    ("HR.DEPARTMENTS", "hr/departments"),
    ("HR.LEAVES", "hr/leaves"),
    ("HR.PAYROLL", "hr/payroll"),
    ("HR.EVALUATIONS", "hr/evaluations"),
    ("GARAGE.SERVICES", "garage/services"),
    ("GARAGE.VEHICLES", "garage/vehicles"),
    ("GARAGE.REPAIRS", "garage/repairs"),
    ("GARAGE.INVENTORY", "garage/inventory"),
    ("GARAGE.MECHANICS", "garage/mechanics"),
    ("FREIGHT.SHIPMENTS", "freight/shipments"),
    ("FREIGHT.CARRIERS", "freight/carriers"),
    ("FREIGHT.ROUTES", "freight/routes"),
    ("CRM.CLIENTS", "crm/clients"),
    ("CRM.LEADS", "crm/leads"),
    ("CRM.OPPORTUNITIES", "crm/opportunities"),
    ("CRM.ACTIVITIES", "crm/activities"),
    ("RENTALS.VEHICLES", "rentals/vehicles"),
    ("RENTALS.BOOKINGS", "rentals/bookings"),
    ("RENTALS.CONTRACTS", "rentals/contracts"),
    ("ACCOUNTING.ACCOUNTS", "accounting/accounts"),
    ("ACCOUNTING.INVOICES", "accounting/invoices"),
    ("ACCOUNTING.TRANSACTIONS", "accounting/transactions"),
    ("ACCOUNTING.EXPENSES", "accounting/expenses"),
    ("WEBSITE.PAGES", "website/pages"),
    ("WEBSITE.TEMPLATES", "website/templates"),
    ("WEBSITE.MEDIA", "website/media"),
    ("SYSTEM.USERS", "system/users"),
    ("SYSTEM.PERMISSIONS", "system/permissions"),
];

#[derive(Debug, Clone, Default)]
pub struct CollectionRegistry {
    entries: BTreeMap<String, CollectionEntry>,
}

impl CollectionRegistry {
    /// Empty registry
    pub fn new() -> Self {
        Self::default()
    }

    pub fn builtin() -> Self {
        let mut registry = Self::new();
        for (name, path) in BUILTIN {
            // Built-in paths are literals that always validate
            if let Ok(path) = CollectionPath::parse(path) {
                registry.insert(*name, CollectionEntry::new(path));
            }
        }
        registry
    }

    pub fn insert(&mut self, name: impl Into<String>, entry: CollectionEntry) -> &mut Self {
        self.entries.insert(name.into(), entry);
        self
    }

    pub fn resolve(&self, name: &str) -> Option<&CollectionEntry> {
        self.entries.get(name.trim())
    }

    pub fn resolve_path(&self, name: &str) -> Option<&CollectionPath> {
        self.resolve(name).map(|entry| &entry.path)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &CollectionEntry)> {
        self.entries.iter().map(|(name, entry)| (name.as_str(), entry))
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Merge entries from YAML; later entries replace built-ins with the same name
    pub fn merge_yaml(&mut self, yaml: &str) -> Result<&mut Self, ConfigError> {
        let file: RegistryFile = serde_yaml::from_str(yaml)?;
        for (name, spec) in file.collections {
            let entry = match spec {
                EntrySpec::Path(path) => CollectionEntry::new(CollectionPath::parse(&path)?),
                EntrySpec::Full { path, module } => {
                    let path = CollectionPath::parse(&path)?;
                    let module = module.unwrap_or_else(|| path.module_id());
                    CollectionEntry { path, module }
                }
            };
            tracing::debug!("Registry entry {} -> {}", name, entry.path);
            self.insert(name, entry);
        }
        Ok(self)
    }

    pub fn load_overrides(&mut self, file: &Path) -> Result<&mut Self, ConfigError> {
        let content = std::fs::read_to_string(file).map_err(|source| ConfigError::Io {
            path: file.to_path_buf(),
            source,
        })?;
        self.merge_yaml(&content)
    }
}
