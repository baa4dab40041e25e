//! CLI command definitions and dispatch.

pub mod docs;
pub mod migrate;
pub mod task;
pub mod tenant;

use std::sync::Arc;

use clap::{Parser, Subcommand};

use memberhub_core::config::AppConfig;
use memberhub_core::error::AppError;
use memberhub_core::types::id::NodeId;
use memberhub_core::types::tenant::TenantContext;
use memberhub_database::{DatabasePool, Stores};
use memberhub_service::{DocumentService, TenantService};
use memberhub_worker::WorkerServices;

use crate::output::OutputFormat;

/// MemberHub administration
#[derive(Debug, Parser)]
#[command(name = "memberhub", version, about, long_about = None)]
pub struct Cli {
    /// Directory holding default.toml and the environment overlays
    #[arg(short, long, default_value = "config")]
    pub config_dir: String,

    /// Configuration environment overlay
    #[arg(short, long, default_value = "development")]
    pub env: String,

    /// Output format
    #[arg(short, long, value_enum, default_value = "table")]
    pub format: OutputFormat,

    /// Subcommand to execute
    #[command(subcommand)]
    pub command: Commands,
}

/// Top-level commands
#[derive(Debug, Subcommand)]
pub enum Commands {
    /// Shared and tenant schema migrations
    Migrate(migrate::MigrateArgs),
    /// Tenant management
    Tenant(tenant::TenantArgs),
    /// A tenant's document tree
    Docs(docs::DocsArgs),
    /// Background task queue
    Task(task::TaskArgs),
}

impl Cli {
    /// Execute the CLI command
    pub async fn execute(&self) -> Result<(), AppError> {
        let config = load_config(&self.config_dir, &self.env)?;
        match &self.command {
            Commands::Migrate(args) => migrate::execute(args, &config).await,
            Commands::Tenant(args) => tenant::execute(args, &config, self.format).await,
            Commands::Docs(args) => docs::execute(args, &config, self.format).await,
            Commands::Task(args) => task::execute(args, &config, self.format).await,
        }
    }
}

/// Everything a command needs, connected to the configured database.
pub struct Runtime {
    pub pool: DatabasePool,
    pub tenants: TenantService,
    pub documents: Arc<DocumentService>,
    pub worker: WorkerServices,
}

impl Runtime {
    /// Resolve a tenant by id or schema name.
    pub async fn tenant(&self, key: &str) -> Result<TenantContext, AppError> {
        self.tenants.resolve(key).await
    }
}

/// Helper: load configuration
pub fn load_config(dir: &str, env: &str) -> Result<AppConfig, AppError> {
    AppConfig::load_from(dir, env)
}

/// Helper: create database pool from config
pub async fn create_db_pool(config: &AppConfig) -> Result<DatabasePool, AppError> {
    DatabasePool::connect(&config.database.for_application("memberhub-cli")).await
}

/// Helper: connect and wire the services
pub async fn connect(config: &AppConfig) -> Result<Runtime, AppError> {
    let pool = create_db_pool(config).await?;
    let stores = Stores::postgres(pool.pool().clone());
    let blobs = memberhub_storage::from_config(&config.storage).await?;
    let documents = Arc::new(DocumentService::new(
        stores.nodes.clone(),
        blobs,
        config.storage.clone(),
    ));
    let worker = WorkerServices::from_stores(config, &stores, documents.clone())?;
    Ok(Runtime {
        pool,
        tenants: TenantService::new(stores.tenants.clone()),
        documents,
        worker,
    })
}

/// Helper: parse an optional node id argument
pub fn parse_node(raw: Option<&str>) -> Result<Option<NodeId>, AppError> {
    raw.map(node_id).transpose()
}

/// Helper: parse a node id argument
pub fn node_id(raw: &str) -> Result<NodeId, AppError> {
    raw.parse::<NodeId>()
        .map_err(|e| AppError::validation(format!("Invalid node id '{raw}': {e}")))
}
