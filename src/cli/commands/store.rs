use clap::Subcommand;
use serde_json::json;

use crate::cli::utils::output_success;
use crate::cli::OutputFormat;
use crate::config::{AppConfig, StoreBackend};
use crate::database::{DocumentStore, PgStore};

#[derive(Subcommand)]
pub enum StoreCommands {
    #[command(about = "Create the documents table if missing")]
    Migrate,

    #[command(about = "Check store connectivity")]
    Health,
}

pub async fn handle(cmd: StoreCommands, config: &AppConfig, output_format: OutputFormat) -> anyhow::Result<()> {
    if config.store.backend == StoreBackend::Memory {
        return output_success(
            &output_format,
            "In-memory store needs no maintenance",
            Some(json!({ "backend": "memory" })),
        );
    }

    let store = PgStore::connect(&config.store, &config.project_id, config.filter.max_limit).await?;
    maintain(store, cmd, config, &output_format).await
}

/// Run one maintenance command, closing the pool whether or not it succeeds
async fn maintain(
    store: PgStore,
    cmd: StoreCommands,
    config: &AppConfig,
    output_format: &OutputFormat,
) -> anyhow::Result<()> {
    let result: anyhow::Result<()> = async {
        match cmd {
            StoreCommands::Migrate => {
                store.migrate().await?;
                output_success(
                    output_format,
                    &format!("Table '{}' ready", config.store.documents_table),
                    Some(json!({ "backend": store.name(), "table": config.store.documents_table })),
                )
            }
            StoreCommands::Health => {
                store.health_check().await?;
                output_success(output_format, "Store reachable", Some(json!({ "backend": store.name() })))
            }
        }
    }
    .await;
    store.close().await;
    result
}

#[cfg(test)]
mod tests {
    use super::*;
    use sqlx::postgres::PgPoolOptions;
    use std::time::Duration;

    #[tokio::test]
    async fn failed_command_still_closes_the_pool() {
        let config = AppConfig::from_lookup(|_| None);
        let pool = PgPoolOptions::new()
            .acquire_timeout(Duration::from_millis(200))
            .connect_lazy("postgres://erp@127.0.0.1:1/erp")
            .unwrap();
        let store = PgStore::from_pool(pool.clone(), "documents", None).unwrap();

        let result = maintain(store, StoreCommands::Health, &config, &OutputFormat::Json).await;
        assert!(result.is_err());
        assert!(pool.is_closed());
    }
}
