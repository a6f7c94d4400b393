//! Application session context.
//!
//! Owns the store, notifier, registry, permission gate and mutation queues
//! for one signed-in user. Everything that used to be ambient global state is
//! reached through a [`Session`].

use std::sync::Arc;
use tracing::{error, info};

use crate::collection::{Collection, MutationQueues};
use crate::config::{AppConfig, StoreBackend};
use crate::database::{DocumentStore, MemoryStore, PgStore, Record};
use crate::error::{ConfigError, DataError, DataResult};
use crate::fetch::Fetcher;
use crate::filter::Constraint;
use crate::notify::{Notifier, TracingNotifier};
use crate::permission::{Authorization, PermissionGate, PermissionSource, StorePermissions};
use crate::registry::{CollectionEntry, CollectionPath, CollectionRegistry};
use crate::types::Action;

const DEFAULT_PERMISSIONS_PATH: &str = "system/permissions";

#[derive(Clone)]
pub struct Session {
    inner: Arc<SessionInner>,
}

struct SessionInner {
    fetcher: Fetcher,
    registry: CollectionRegistry,
    gate: Arc<PermissionGate>,
    queues: MutationQueues,
    enforce_permissions: bool,
}

pub struct SessionBuilder {
    store: Arc<dyn DocumentStore>,
    authorization: Authorization,
    notifier: Option<Arc<dyn Notifier>>,
    registry: Option<CollectionRegistry>,
    permission_source: Option<Arc<dyn PermissionSource>>,
    permissions_path: Option<CollectionPath>,
    enforce_permissions: bool,
}

impl SessionBuilder {
    pub fn notifier(mut self, notifier: Arc<dyn Notifier>) -> Self {
        self.notifier = Some(notifier);
        self
    }

    pub fn registry(mut self, registry: CollectionRegistry) -> Self {
        self.registry = Some(registry);
        self
    }

    pub fn permission_source(mut self, source: Arc<dyn PermissionSource>) -> Self {
        self.permission_source = Some(source);
        self
    }

    /// Collection holding per-user permission documents (store-backed source only)
    pub fn permissions_path(mut self, path: CollectionPath) -> Self {
        self.permissions_path = Some(path);
        self
    }

    pub fn enforce_permissions(mut self, enforce: bool) -> Self {
        self.enforce_permissions = enforce;
        self
    }

    pub fn build(self) -> DataResult<Session> {
        let notifier = self.notifier.unwrap_or_else(|| Arc::new(TracingNotifier));
        let registry = self.registry.unwrap_or_else(CollectionRegistry::builtin);

        let source = match self.permission_source {
            Some(source) => source,
            None => {
                let path = match self.permissions_path {
                    Some(path) => path,
                    None => CollectionPath::parse(DEFAULT_PERMISSIONS_PATH)?,
                };
                Arc::new(StorePermissions::new(Arc::clone(&self.store), path))
            }
        };

        Ok(Session {
            inner: Arc::new(SessionInner {
                fetcher: Fetcher::new(self.store, notifier),
                registry,
                gate: Arc::new(PermissionGate::new(self.authorization, source)),
                queues: MutationQueues::new(),
                enforce_permissions: self.enforce_permissions,
            }),
        })
    }
}

impl Session {
    pub fn builder(store: Arc<dyn DocumentStore>, authorization: Authorization) -> SessionBuilder {
        SessionBuilder {
            store,
            authorization,
            notifier: None,
            registry: None,
            permission_source: None,
            permissions_path: None,
            enforce_permissions: false,
        }
    }

    /// Build the store, registry and permission source described by `config`
    pub async fn from_config(
        config: &AppConfig,
        authorization: Authorization,
        notifier: Arc<dyn Notifier>,
    ) -> DataResult<Session> {
        let store = open_store(config).await?;

        let mut registry = CollectionRegistry::builtin();
        if let Some(file) = &config.registry.overrides_file {
            registry.load_overrides(file)?;
            info!("Loaded collection overrides from {}", file.display());
        }

        Session::builder(store, authorization)
            .notifier(notifier)
            .registry(registry)
            .permissions_path(CollectionPath::parse(&config.permissions.collection)?)
            .enforce_permissions(config.permissions.enforce)
            .build()
    }

    pub fn fetcher(&self) -> &Fetcher {
        &self.inner.fetcher
    }

    pub fn store(&self) -> &Arc<dyn DocumentStore> {
        self.inner.fetcher.store()
    }

    pub fn notifier(&self) -> &Arc<dyn Notifier> {
        self.inner.fetcher.notifier()
    }

    pub fn registry(&self) -> &CollectionRegistry {
        &self.inner.registry
    }

    pub fn permissions(&self) -> &Arc<PermissionGate> {
        &self.inner.gate
    }

    pub fn authorization(&self) -> &Authorization {
        self.inner.gate.authorization()
    }

    pub async fn check(&self, module: &str, action: Action) -> bool {
        self.inner.gate.check(module, action).await
    }

    /// Fetch by physical path
    pub async fn fetch_all(&self, path: &str, constraints: &[Constraint]) -> DataResult<Vec<Record>> {
        self.inner.fetcher.fetch_all(path, constraints).await
    }

    /// Fetch by logical name (`HR.EMPLOYEES`)
    pub async fn fetch_named(&self, name: &str, constraints: &[Constraint]) -> DataResult<Vec<Record>> {
        let entry = self.resolve(name)?;
        self.inner.fetcher.fetch_path(&entry.path, constraints).await
    }

    /// Collection handle for a logical name. Nothing is fetched until `refresh`.
    pub async fn collection(&self, name: &str) -> DataResult<Collection> {
        let entry = self.resolve(name)?.clone();
        let queue = self.inner.queues.lock_for(&entry.path).await;
        let collection = Collection::new(name, entry, self.inner.fetcher.clone(), queue);
        Ok(self.guarded(collection))
    }

    /// Collection handle for a physical path that has no registry name
    pub async fn collection_at(&self, path: &str) -> DataResult<Collection> {
        let path = CollectionPath::parse(path).map_err(|err| {
            let err = DataError::from(err);
            self.notifier().error(&err.user_message());
            err
        })?;
        let entry = CollectionEntry::new(path);
        let queue = self.inner.queues.lock_for(&entry.path).await;
        let collection = Collection::new(entry.path.to_string(), entry, self.inner.fetcher.clone(), queue);
        Ok(self.guarded(collection))
    }

    pub fn enforces_permissions(&self) -> bool {
        self.inner.enforce_permissions
    }

    fn guarded(&self, collection: Collection) -> Collection {
        if self.inner.enforce_permissions {
            collection.with_guard(Arc::clone(&self.inner.gate))
        } else {
            collection
        }
    }

    /// Collection handle with its first load already applied
    pub async fn open(&self, name: &str, constraints: Vec<Constraint>) -> DataResult<Collection> {
        let collection = self.collection(name).await?.with_constraints(constraints);
        collection.refresh().await?;
        Ok(collection)
    }

    fn resolve(&self, name: &str) -> DataResult<&CollectionEntry> {
        self.inner.registry.resolve(name).ok_or_else(|| {
            let err = DataError::from(ConfigError::UnknownCollection(name.to_string()));
            error!("No collection registered as '{}'", name);
            self.notifier().error(&err.user_message());
            err
        })
    }
}

async fn open_store(config: &AppConfig) -> DataResult<Arc<dyn DocumentStore>> {
    let max_limit = config.filter.max_limit;
    match config.store.backend {
        StoreBackend::Memory => {
            info!("Using in-memory document store");
            Ok(Arc::new(MemoryStore::new().with_max_limit(max_limit)))
        }
        StoreBackend::Postgres => {
            let store = PgStore::connect(&config.store, &config.project_id, max_limit).await?;
            if config.store.auto_migrate {
                store.migrate().await?;
            }
            Ok(Arc::new(store))
        }
    }
}
