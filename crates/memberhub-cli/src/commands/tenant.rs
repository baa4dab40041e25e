//! Tenant management CLI commands.

use clap::{Args, Subcommand};
use serde::Serialize;
use tabled::Tabled;

use crate::output::{self, OutputFormat};
use memberhub_core::config::AppConfig;
use memberhub_core::error::AppError;
use memberhub_entity::tenant::Tenant;

/// Arguments for tenant commands
#[derive(Debug, Args)]
pub struct TenantArgs {
    /// Tenant subcommand
    #[command(subcommand)]
    pub command: TenantCommand,
}

/// Tenant subcommands
#[derive(Debug, Subcommand)]
pub enum TenantCommand {
    /// List tenants
    List,
    /// Create a tenant and provision its schema
    Create {
        /// Schema name (lowercase letters, digits and underscores)
        schema: String,
        /// Display name
        #[arg(short, long)]
        name: String,
    },
}

/// Tenant display row
#[derive(Debug, Serialize, Tabled)]
struct TenantRow {
    id: String,
    schema: String,
    name: String,
    created_on: String,
}

impl From<&Tenant> for TenantRow {
    fn from(t: &Tenant) -> Self {
        Self {
            id: t.id.to_string(),
            schema: t.schema_name.clone(),
            name: t.name.clone(),
            created_on: t.created_on.format("%Y-%m-%d %H:%M").to_string(),
        }
    }
}

/// Execute tenant commands
pub async fn execute(
    args: &TenantArgs,
    config: &AppConfig,
    format: OutputFormat,
) -> Result<(), AppError> {
    let runtime = super::connect(config).await?;

    match &args.command {
        TenantCommand::List => {
            let tenants = runtime.tenants.list().await?;
            let rows: Vec<TenantRow> = tenants.iter().map(TenantRow::from).collect();
            output::print_list(&rows, format);
        }
        TenantCommand::Create { schema, name } => {
            let tenant = runtime.tenants.create(schema, name).await?;
            output::print_success(&format!(
                "Tenant '{}' created (schema: {}, id: {})",
                tenant.name, tenant.schema_name, tenant.id
            ));
        }
    }

    Ok(())
}
