use once_cell::sync::Lazy;
use serde::{Deserialize, Serialize};
use std::env;
use std::path::PathBuf;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AppConfig {
    pub environment: Environment,
    pub project_id: String,
    pub store: StoreConfig,
    pub filter: FilterConfig,
    pub permissions: PermissionConfig,
    pub registry: RegistryConfig,
    pub security: SecurityConfig,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Environment {
    Development,
    Staging,
    Production,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum StoreBackend {
    Memory,
    Postgres,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StoreConfig {
    pub backend: StoreBackend,
    pub database_url: Option<String>,
    pub documents_table: String,
    pub max_connections: u32,
    pub connection_timeout: u64,
    pub auto_migrate: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FilterConfig {
    pub max_limit: Option<i32>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PermissionConfig {
    pub collection: String,
    pub enforce: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RegistryConfig {
    pub overrides_file: Option<PathBuf>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SecurityConfig {
    pub jwt_secret: String,
}

impl AppConfig {
    pub fn from_env() -> Self {
        Self::from_lookup(|key| env::var(key).ok())
    }

    /// Build configuration from an arbitrary key lookup (environment in production)
    pub fn from_lookup<F>(lookup: F) -> Self
    where
        F: Fn(&str) -> Option<String>,
    {
        let environment = match lookup("APP_ENV").as_deref() {
            Some("production") | Some("prod") => Environment::Production,
            Some("staging") | Some("stage") => Environment::Staging,
            _ => Environment::Development,
        };

        // Set defaults based on environment, then override with specific vars
        match environment {
            Environment::Production => Self::production(),
            Environment::Staging => Self::staging(),
            Environment::Development => Self::development(),
        }
        .with_overrides(lookup)
    }

    fn with_overrides<F>(mut self, lookup: F) -> Self
    where
        F: Fn(&str) -> Option<String>,
    {
        if let Some(v) = lookup("ERP_PROJECT_ID") {
            self.project_id = v;
        }

        // Store overrides
        if let Some(v) = lookup("ERP_STORE_BACKEND") {
            match v.to_ascii_lowercase().as_str() {
                "memory" => self.store.backend = StoreBackend::Memory,
                "postgres" | "pg" => self.store.backend = StoreBackend::Postgres,
                other => tracing::warn!("Unknown ERP_STORE_BACKEND '{}', keeping {:?}", other, self.store.backend),
            }
        }
        if let Some(v) = lookup("DATABASE_URL") {
            if !v.trim().is_empty() {
                self.store.database_url = Some(v);
            }
        }
        if let Some(v) = lookup("ERP_DOCUMENTS_TABLE") {
            self.store.documents_table = v;
        }
        if let Some(v) = lookup("DATABASE_MAX_CONNECTIONS") {
            self.store.max_connections = v.parse().unwrap_or(self.store.max_connections);
        }
        if let Some(v) = lookup("DATABASE_CONNECTION_TIMEOUT") {
            self.store.connection_timeout = v.parse().unwrap_or(self.store.connection_timeout);
        }
        if let Some(v) = lookup("ERP_AUTO_MIGRATE") {
            self.store.auto_migrate = v.parse().unwrap_or(self.store.auto_migrate);
        }

        // Filter overrides
        if let Some(v) = lookup("FILTER_MAX_LIMIT") {
            self.filter.max_limit = v.parse().ok();
        }

        // Permission overrides
        if let Some(v) = lookup("ERP_PERMISSIONS_COLLECTION") {
            self.permissions.collection = v;
        }
        if let Some(v) = lookup("ERP_ENFORCE_PERMISSIONS") {
            self.permissions.enforce = v.parse().unwrap_or(self.permissions.enforce);
        }

        if let Some(v) = lookup("ERP_COLLECTIONS_FILE") {
            self.registry.overrides_file = Some(PathBuf::from(v));
        }

        if let Some(v) = lookup("JWT_SECRET") {
            self.security.jwt_secret = v;
        }

        self
    }

    fn development() -> Self {
        Self {
            environment: Environment::Development,
            project_id: "erp-dev".to_string(),
            store: StoreConfig {
                backend: StoreBackend::Memory,
                database_url: None,
                documents_table: "documents".to_string(),
                max_connections: 5,
                connection_timeout: 30,
                auto_migrate: true,
            },
            filter: FilterConfig {
                max_limit: Some(1000),
            },
            permissions: PermissionConfig {
                collection: "system/permissions".to_string(),
                enforce: true,
            },
            registry: RegistryConfig { overrides_file: None },
            security: SecurityConfig {
                jwt_secret: String::new(),
            },
        }
    }

    fn staging() -> Self {
        Self {
            environment: Environment::Staging,
            project_id: "erp-staging".to_string(),
            store: StoreConfig {
                backend: StoreBackend::Postgres,
                database_url: None,
                documents_table: "documents".to_string(),
                max_connections: 10,
                connection_timeout: 10,
                auto_migrate: true,
            },
            filter: FilterConfig {
                max_limit: Some(500),
            },
            permissions: PermissionConfig {
                collection: "system/permissions".to_string(),
                enforce: true,
            },
            registry: RegistryConfig { overrides_file: None },
            security: SecurityConfig {
                jwt_secret: String::new(),
            },
        }
    }

    fn production() -> Self {
        Self {
            environment: Environment::Production,
            project_id: "erp".to_string(),
            store: StoreConfig {
                backend: StoreBackend::Postgres,
                database_url: None,
                documents_table: "documents".to_string(),
                max_connections: 20,
                connection_timeout: 5,
                auto_migrate: false,
            },
            filter: FilterConfig {
                max_limit: Some(200),
            },
            permissions: PermissionConfig {
                collection: "system/permissions".to_string(),
                enforce: true,
            },
            registry: RegistryConfig { overrides_file: None },
            security: SecurityConfig {
                jwt_secret: String::new(),
            },
        }
    }
}

// Global singleton config for the binary - initialized once at startup
pub static CONFIG: Lazy<AppConfig> = Lazy::new(AppConfig::from_env);

pub fn config() -> &'static AppConfig {
    &CONFIG
}
