use async_trait::async_trait;
use serde_json::{Map, Value};
use sqlx::postgres::{PgArguments, PgConnectOptions, PgPoolOptions};
use sqlx::{PgPool, Row};
use std::str::FromStr;
use std::time::Duration;
use tracing::info;
use uuid::Uuid;

use super::store::{Document, DocumentStore, StoreError};
use crate::config::StoreConfig;
use crate::error::ConfigError;
use crate::filter::{fold_constraints, Constraint, Filter};
use crate::registry::CollectionPath;

/// PostgreSQL document store: one JSONB row per document, keyed by
/// `(collection, id)`. Constraints are translated to SQL by [`Filter`].
pub struct PgStore {
    pool: PgPool,
    table: String,
    max_limit: Option<i32>,
}

impl PgStore {
    /// Connect using store configuration; `project_id` tags the connections
    pub async fn connect(config: &StoreConfig, project_id: &str, max_limit: Option<i32>) -> Result<Self, StoreError> {
        let url = config
            .database_url
            .as_deref()
            .ok_or_else(|| StoreError::Connection(ConfigError::Missing("DATABASE_URL").to_string()))?;
        let url = Self::validate_connection_string(url)
            .map_err(|e| StoreError::Connection(e.to_string()))?;

        let options = PgConnectOptions::from_str(&url)?.application_name(project_id);
        let pool = PgPoolOptions::new()
            .max_connections(config.max_connections)
            .acquire_timeout(Duration::from_secs(config.connection_timeout))
            .connect_with(options)
            .await
            .map_err(|e| StoreError::Connection(e.to_string()))?;

        info!("Created document store pool for project: {}", project_id);
        Self::from_pool(pool, &config.documents_table, max_limit)
    }

    pub fn from_pool(pool: PgPool, table: &str, max_limit: Option<i32>) -> Result<Self, StoreError> {
        // Reuse Filter table name validation
        Filter::new(table)?;
        Ok(Self {
            pool,
            table: table.to_string(),
            max_limit,
        })
    }

    fn validate_connection_string(raw: &str) -> Result<String, ConfigError> {
        let url = url::Url::parse(raw).map_err(|_| ConfigError::InvalidDatabaseUrl(redact(raw)))?;
        match url.scheme() {
            "postgres" | "postgresql" => Ok(url.into()),
            other => Err(ConfigError::InvalidDatabaseUrl(format!("unsupported scheme '{}'", other))),
        }
    }

    /// Create the documents table if it does not exist
    pub async fn migrate(&self) -> Result<(), StoreError> {
        let create_table = format!(
            "CREATE TABLE IF NOT EXISTS \"{table}\" (
                \"collection\" TEXT NOT NULL,
                \"id\" UUID NOT NULL,
                \"data\" JSONB NOT NULL DEFAULT '{{}}'::jsonb,
                \"created_at\" TIMESTAMPTZ NOT NULL DEFAULT now(),
                \"updated_at\" TIMESTAMPTZ NOT NULL DEFAULT now(),
                PRIMARY KEY (\"collection\", \"id\")
            )",
            table = self.table
        );
        sqlx::query(&create_table).execute(&self.pool).await?;

        let create_index = format!(
            "CREATE INDEX IF NOT EXISTS \"{table}_data_gin\" ON \"{table}\" USING GIN (\"data\")",
            table = self.table
        );
        sqlx::query(&create_index).execute(&self.pool).await?;

        info!("Document table ready: {}", self.table);
        Ok(())
    }

    pub async fn close(&self) {
        self.pool.close().await;
        info!("Closed document store pool");
    }

    /// Document ids are UUIDs; anything else cannot exist in this backend
    fn parse_id(path: &CollectionPath, id: &str) -> Result<Uuid, StoreError> {
        Uuid::parse_str(id).map_err(|_| StoreError::not_found(path, id))
    }

    fn row_to_document(row: &sqlx::postgres::PgRow) -> Result<Document, StoreError> {
        let id: String = row.try_get("id")?;
        let data: Value = row.try_get("data")?;
        match data {
            Value::Object(data) => Ok(Document { id, data }),
            other => Err(StoreError::InvalidDocument(format!(
                "document {} holds non-object data: {}",
                id, other
            ))),
        }
    }
}

#[async_trait]
impl DocumentStore for PgStore {
    fn name(&self) -> &'static str {
        "postgres"
    }

    async fn list(&self, path: &CollectionPath, constraints: &[Constraint]) -> Result<Vec<Document>, StoreError> {
        let mut filter = Filter::new(&self.table)?.with_max_limit(self.max_limit);
        filter.assign(fold_constraints(constraints)?)?;
        let sql_result = filter.to_sql()?;

        tracing::debug!("pg list {}: {}", path, sql_result.query);

        let mut q = sqlx::query(&sql_result.query).bind(path.as_str());
        for p in sql_result.params.iter() {
            q = bind_param(q, p);
        }
        let rows = q.fetch_all(&self.pool).await?;
        rows.iter().map(Self::row_to_document).collect()
    }

    async fn get(&self, path: &CollectionPath, id: &str) -> Result<Option<Document>, StoreError> {
        let Ok(uuid) = Uuid::parse_str(id) else {
            return Ok(None);
        };
        let sql = format!(
            "SELECT \"id\"::text AS \"id\", \"data\" FROM \"{}\" WHERE \"collection\" = $1 AND \"id\" = $2",
            self.table
        );
        let row = sqlx::query(&sql)
            .bind(path.as_str())
            .bind(uuid)
            .fetch_optional(&self.pool)
            .await?;
        row.as_ref().map(Self::row_to_document).transpose()
    }

    async fn create(&self, path: &CollectionPath, mut data: Map<String, Value>) -> Result<String, StoreError> {
        data.remove("id");
        let id = Uuid::new_v4();
        let sql = format!(
            "INSERT INTO \"{}\" (\"collection\", \"id\", \"data\") VALUES ($1, $2, $3)",
            self.table
        );
        sqlx::query(&sql)
            .bind(path.as_str())
            .bind(id)
            .bind(Value::Object(data))
            .execute(&self.pool)
            .await?;
        Ok(id.to_string())
    }

    async fn update(&self, path: &CollectionPath, id: &str, mut data: Map<String, Value>) -> Result<(), StoreError> {
        let uuid = Self::parse_id(path, id)?;
        data.remove("id");
        let sql = format!(
            "UPDATE \"{}\" SET \"data\" = \"data\" || $3, \"updated_at\" = now() WHERE \"collection\" = $1 AND \"id\" = $2",
            self.table
        );
        let result = sqlx::query(&sql)
            .bind(path.as_str())
            .bind(uuid)
            .bind(Value::Object(data))
            .execute(&self.pool)
            .await?;
        if result.rows_affected() == 0 {
            return Err(StoreError::not_found(path, id));
        }
        Ok(())
    }

    async fn delete(&self, path: &CollectionPath, id: &str) -> Result<(), StoreError> {
        let uuid = Self::parse_id(path, id)?;
        let sql = format!(
            "DELETE FROM \"{}\" WHERE \"collection\" = $1 AND \"id\" = $2",
            self.table
        );
        let result = sqlx::query(&sql)
            .bind(path.as_str())
            .bind(uuid)
            .execute(&self.pool)
            .await?;
        if result.rows_affected() == 0 {
            return Err(StoreError::not_found(path, id));
        }
        Ok(())
    }

    async fn health_check(&self) -> Result<(), StoreError> {
        sqlx::query("SELECT 1")
            .execute(&self.pool)
            .await
            .map_err(|e| StoreError::Connection(e.to_string()))?;
        Ok(())
    }
}

/// Every filter parameter is bound as JSONB
fn bind_param<'q>(
    q: sqlx::query::Query<'q, sqlx::Postgres, PgArguments>,
    v: &Value,
) -> sqlx::query::Query<'q, sqlx::Postgres, PgArguments> {
    q.bind(v.clone())
}

/// Strip credentials before a URL reaches logs or error messages
fn redact(raw: &str) -> String {
    match raw.split_once('@') {
        Some((_, host)) => format!("***@{}", host),
        None => raw.to_string(),
    }
}
