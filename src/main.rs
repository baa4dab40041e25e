//! MemberHub worker daemon.
//!
//! Wires the crates together, migrates the shared and tenant schemas, and
//! runs a task worker until interrupted.

use std::sync::Arc;
use std::time::Duration;

use clap::Parser;
use tokio::sync::watch;
use tracing_subscriber::{EnvFilter, fmt};

use memberhub_core::config::AppConfig;
use memberhub_core::error::AppError;
use memberhub_database::migration::{migrate_tenant, run_migrations};
use memberhub_database::{DatabasePool, Stores, TenantScope};
use memberhub_service::DocumentService;
use memberhub_worker::{PgWakeup, WorkerServices};

/// MemberHub background task worker
#[derive(Debug, Parser)]
#[command(name = "memberhubd", version, about, long_about = None)]
struct Args {
    /// Directory holding default.toml and the environment overlays
    #[arg(long, default_value = "config")]
    config_dir: String,

    /// Configuration environment overlay
    #[arg(long, default_value = "development")]
    env: String,

    /// Tasks claimed per batch (overrides the configuration)
    #[arg(long)]
    batch_size: Option<u32>,

    /// Skip migrations on startup
    #[arg(long)]
    skip_migrations: bool,
}

#[tokio::main]
async fn main() {
    let args = Args::parse();

    let mut config = match AppConfig::load_from(&args.config_dir, &args.env) {
        Ok(c) => c,
        Err(e) => {
            eprintln!("Failed to load configuration: {e}");
            std::process::exit(1);
        }
    };
    if let Some(batch_size) = args.batch_size {
        config.worker.batch_size = batch_size;
    }

    init_logging(&config);

    if let Err(e) = run(config, args.skip_migrations).await {
        tracing::error!("Worker error: {}", e);
        std::process::exit(1);
    }
}

/// Initialize tracing/logging
fn init_logging(config: &AppConfig) {
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&config.logging.level));

    match config.logging.format.as_str() {
        "json" => {
            fmt()
                .json()
                .with_env_filter(filter)
                .with_target(true)
                .with_thread_ids(true)
                .init();
        }
        _ => {
            fmt()
                .pretty()
                .with_env_filter(filter)
                .with_target(true)
                .init();
        }
    }
}

async fn run(config: AppConfig, skip_migrations: bool) -> Result<(), AppError> {
    tracing::info!("Starting MemberHub worker v{}", env!("CARGO_PKG_VERSION"));

    tracing::info!("Connecting to database...");
    let db = DatabasePool::connect(&config.database.for_application("memberhubd")).await?;
    let stores = Stores::postgres(db.pool().clone());

    if !skip_migrations {
        run_migrations(db.pool()).await?;
        let scope = TenantScope::new(db.pool().clone());
        for tenant in stores.tenants.list().await? {
            migrate_tenant(&scope, &tenant.context()?).await?;
        }
    }

    let blobs = memberhub_storage::from_config(&config.storage).await?;
    let documents = Arc::new(DocumentService::new(
        stores.nodes.clone(),
        blobs,
        config.storage.clone(),
    ));
    let services = WorkerServices::from_stores(&config, &stores, documents)?;
    tracing::info!(tasks = ?services.registry.names(), "Task registry ready");

    let listener = db.listen(&config.worker.notify_channel).await?;
    let runner = services.runner();

    let (shutdown_tx, shutdown_rx) = watch::channel(false);
    let worker = tokio::spawn(async move { runner.run(PgWakeup::new(listener), shutdown_rx).await });

    shutdown_signal().await;
    tracing::info!("Shutdown signal received, finishing the current batch...");
    let _ = shutdown_tx.send(true);

    match tokio::time::timeout(Duration::from_secs(300), worker).await {
        Ok(Ok(result)) => result?,
        Ok(Err(e)) => tracing::error!("Worker task panicked: {}", e),
        Err(_) => tracing::warn!("Worker did not stop in time"),
    }

    db.close().await;
    tracing::info!("MemberHub worker stopped");
    Ok(())
}

async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            tracing::error!("Failed to install Ctrl+C handler: {}", e);
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut signal) => {
                signal.recv().await;
            }
            Err(e) => {
                tracing::error!("Failed to install SIGTERM handler: {}", e);
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }
}
