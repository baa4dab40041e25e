//! Database migration management commands.

use clap::{Args, Subcommand};

use crate::output;
use memberhub_core::config::AppConfig;
use memberhub_core::error::AppError;
use memberhub_database::TenantScope;
use memberhub_database::migration::{
    applied_tenant_migrations, migrate_tenant, pending_tenant_migrations, run_migrations,
};

/// Arguments for the migrate command
#[derive(Debug, Args)]
pub struct MigrateArgs {
    /// Migration subcommand
    #[command(subcommand)]
    pub command: MigrateCommand,
}

/// Migration subcommands
#[derive(Debug, Subcommand)]
pub enum MigrateCommand {
    /// Apply pending shared migrations, then bring every tenant schema up to date
    Run,
    /// Show pending tenant migrations per tenant
    Status,
}

/// Execute migration commands
pub async fn execute(args: &MigrateArgs, config: &AppConfig) -> Result<(), AppError> {
    let runtime = super::connect(config).await?;
    let scope = TenantScope::new(runtime.pool.pool().clone());

    match &args.command {
        MigrateCommand::Run => {
            println!("Running database migrations...");
            run_migrations(runtime.pool.pool()).await?;
            for tenant in runtime.tenants.list().await? {
                let ctx = tenant.context()?;
                let ran = migrate_tenant(&scope, &ctx).await?;
                if ran > 0 {
                    output::print_kv(&tenant.schema_name, &format!("{ran} migration(s) applied"));
                }
            }
            output::print_success("All migrations applied successfully.");
        }
        MigrateCommand::Status => {
            for tenant in runtime.tenants.list().await? {
                let applied = applied_tenant_migrations(&scope, &tenant.context()?).await?;
                let pending = pending_tenant_migrations(&applied);
                let status = if pending.is_empty() {
                    "up to date".to_string()
                } else {
                    pending
                        .iter()
                        .map(|(version, description)| format!("{version} ({description})"))
                        .collect::<Vec<_>>()
                        .join(", ")
                };
                output::print_kv(&tenant.schema_name, &status);
            }
        }
    }

    Ok(())
}
