pub mod commands;
pub mod utils;

use clap::{Parser, Subcommand};
use serde::{Deserialize, Serialize};
use std::sync::Arc;

use crate::auth;
use crate::config::{self, AppConfig};
use crate::permission::Authorization;
use crate::session::Session;

#[derive(Parser)]
#[command(name = "erp")]
#[command(about = "ERP CLI - Command-line access to the ERP data layer")]
#[command(version)]
pub struct Cli {
    #[arg(long, global = true, help = "Output in human-readable text format")]
    pub text: bool,

    #[arg(long, global = true, help = "Output in JSON format")]
    pub json: bool,

    #[arg(long, global = true, env = "ERP_TOKEN", help = "Session token (JWT) issued by the auth service")]
    pub token: Option<String>,

    #[arg(long, global = true, help = "Act as an administrator")]
    pub admin: bool,

    #[arg(long, global = true, help = "Act as the given user id")]
    pub user: Option<String>,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    #[command(about = "Collection registry lookup")]
    Collections {
        #[command(subcommand)]
        cmd: commands::collections::CollectionsCommands,
    },

    #[command(about = "Data operations on collections")]
    Data {
        #[command(subcommand)]
        cmd: commands::data::DataCommands,
    },

    #[command(about = "Permission checks")]
    Permission {
        #[command(subcommand)]
        cmd: commands::permission::PermissionCommands,
    },

    #[command(about = "Document store maintenance")]
    Store {
        #[command(subcommand)]
        cmd: commands::store::StoreCommands,
    },
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum OutputFormat {
    Text,
    Json,
}

impl OutputFormat {
    pub fn from_cli(cli: &Cli) -> Self {
        if cli.json {
            OutputFormat::Json
        } else {
            OutputFormat::Text
        }
    }
}

/// Who the CLI acts as. A token wins over `--admin`/`--user`.
pub fn resolve_authorization(
    token: Option<&str>,
    admin: bool,
    user: Option<&str>,
    config: &AppConfig,
) -> anyhow::Result<Authorization> {
    if let Some(token) = token {
        let claims = auth::decode_token(token, &config.security.jwt_secret)?;
        return Ok(claims.authorization());
    }
    if admin {
        return Ok(Authorization::Admin);
    }
    match user {
        Some(user_id) => Ok(Authorization::scoped(user_id)),
        None => {
            tracing::warn!("No --token, --admin or --user given; acting as anonymous");
            Ok(Authorization::scoped("anonymous"))
        }
    }
}

async fn open_session(config: &AppConfig, authorization: Authorization, output_format: &OutputFormat) -> anyhow::Result<Session> {
    let notifier = Arc::new(utils::ConsoleNotifier::new(output_format.clone()));
    Ok(Session::from_config(config, authorization, notifier).await?)
}

pub async fn run(cli: Cli) -> anyhow::Result<()> {
    let output_format = OutputFormat::from_cli(&cli);
    let config = config::config();
    let Cli { token, admin, user, command, .. } = cli;
    let authorization = || resolve_authorization(token.as_deref(), admin, user.as_deref(), config);

    match command {
        Commands::Collections { cmd } => commands::collections::handle(cmd, config, output_format).await,
        Commands::Store { cmd } => commands::store::handle(cmd, config, output_format).await,
        Commands::Data { cmd } => {
            let session = open_session(config, authorization()?, &output_format).await?;
            commands::data::handle(cmd, &session, output_format).await
        }
        Commands::Permission { cmd } => {
            let session = open_session(config, authorization()?, &output_format).await?;
            commands::permission::handle(cmd, &session, output_format).await
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn token_decides_authorization() {
        let config = AppConfig::from_lookup(|key| (key == "JWT_SECRET").then(|| "secret".to_string()));
        let token = auth::issue_token(&auth::Claims::new("u-9", false, 1), "secret").unwrap();

        let authorization = resolve_authorization(Some(&token), true, None, &config).unwrap();
        assert_eq!(authorization, Authorization::scoped("u-9"));
        assert_eq!(resolve_authorization(None, true, None, &config).unwrap(), Authorization::Admin);
        assert_eq!(
            resolve_authorization(None, false, Some("u-1"), &config).unwrap(),
            Authorization::scoped("u-1")
        );
        assert!(resolve_authorization(Some("garbage"), false, None, &config).is_err());
    }

    #[test]
    fn parses_global_flags() {
        let cli = Cli::try_parse_from(["erp", "--json", "--user", "u-1", "collections", "list"]).unwrap();
        assert!(cli.json);
        assert_eq!(cli.user.as_deref(), Some("u-1"));
    }
}
