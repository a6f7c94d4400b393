use clap::Subcommand;
use serde_json::json;

use crate::cli::utils::output_success;
use crate::cli::OutputFormat;
use crate::config::AppConfig;
use crate::registry::CollectionRegistry;

#[derive(Subcommand)]
pub enum CollectionsCommands {
    #[command(about = "List registered collections")]
    List {
        #[arg(long, help = "Only names starting with this module prefix (HR, GARAGE, ...)")]
        module: Option<String>,
    },

    #[command(about = "Resolve a logical collection name to its path")]
    Resolve {
        #[arg(help = "Logical name, e.g. HR.EMPLOYEES")]
        name: String,
    },
}

pub async fn handle(cmd: CollectionsCommands, config: &AppConfig, output_format: OutputFormat) -> anyhow::Result<()> {
    let mut registry = CollectionRegistry::builtin();
    if let Some(file) = &config.registry.overrides_file {
        registry.load_overrides(file)?;
    }

    match cmd {
        CollectionsCommands::List { module } => {
            let prefix = module.map(|m| format!("{}.", m.to_ascii_uppercase()));
            let entries: Vec<_> = registry
                .iter()
                .filter(|(name, _)| prefix.as_deref().map_or(true, |p| name.starts_with(p)))
                .map(|(name, entry)| json!({ "name": name, "path": entry.path, "module": entry.module }))
                .collect();

            match output_format {
                OutputFormat::Json => output_success(
                    &output_format,
                    &format!("{} collection(s)", entries.len()),
                    Some(json!({ "collections": entries })),
                ),
                OutputFormat::Text => {
                    for entry in &entries {
                        let field = |key: &str| entry[key].as_str().unwrap_or_default().to_string();
                        println!("{:<28} {:<28} {}", field("name"), field("path"), field("module"));
                    }
                    Ok(())
                }
            }
        }
        CollectionsCommands::Resolve { name } => match registry.resolve(&name) {
            Some(entry) => output_success(
                &output_format,
                &format!("{} -> {}", name, entry.path),
                Some(json!({ "name": name, "path": entry.path, "module": entry.module })),
            ),
            None => anyhow::bail!("Collection '{}' is not configured", name),
        },
    }
}
