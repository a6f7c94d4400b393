use clap::Subcommand;
use serde_json::json;

use crate::cli::utils::{output_error, output_success};
use crate::cli::OutputFormat;
use crate::session::Session;
use crate::types::Action;

#[derive(Subcommand)]
pub enum PermissionCommands {
    #[command(about = "Check a single (module, action) pair")]
    Check {
        #[arg(help = "Module id, e.g. garage-services")]
        module: String,
        #[arg(help = "Action: view, create, edit, delete, export")]
        action: String,
    },

    #[command(about = "Show every action for a module")]
    Show {
        #[arg(help = "Module id")]
        module: String,
    },
}

pub async fn handle(cmd: PermissionCommands, session: &Session, output_format: OutputFormat) -> anyhow::Result<()> {
    match cmd {
        PermissionCommands::Check { module, action } => {
            let action: Action = action.parse().map_err(anyhow::Error::msg)?;
            let allowed = session.check(&module, action).await;
            let data = json!({ "module": module, "action": action, "allowed": allowed });
            if allowed {
                output_success(&output_format, &format!("{} {} allowed", action, module), Some(data))
            } else {
                output_error(&output_format, &format!("{} {} denied", action, module), Some("FORBIDDEN"))
            }
        }
        PermissionCommands::Show { module } => {
            let checks: Vec<(&str, Action)> = Action::ALL.iter().map(|a| (module.as_str(), *a)).collect();
            let results = session.permissions().check_all(&checks).await;
            let actions: serde_json::Map<String, serde_json::Value> = Action::ALL
                .iter()
                .zip(results)
                .map(|(action, allowed)| (action.to_string(), json!(allowed)))
                .collect();
            output_success(
                &output_format,
                &format!("Permissions for {}", module),
                Some(json!({ "module": module, "actions": actions })),
            )
        }
    }
}
