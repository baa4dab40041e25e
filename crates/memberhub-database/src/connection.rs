//! PostgreSQL connection pool and notification listener.

use std::str::FromStr;
use std::time::Duration;

use sqlx::postgres::{PgConnectOptions, PgListener, PgPool, PgPoolOptions};
use tracing::info;

use memberhub_core::config::DatabaseConfig;
use memberhub_core::error::{AppError, ErrorKind};

/// The connection pool shared by the tenant stores and the task queue.
#[derive(Debug, Clone)]
pub struct DatabasePool {
    pool: PgPool,
}

impl DatabasePool {
    /// Connect using the configured URL and pool limits.
    pub async fn connect(config: &DatabaseConfig) -> Result<Self, AppError> {
        let options = PgConnectOptions::from_str(&config.url)
            .map_err(|e| {
                AppError::with_source(
                    ErrorKind::Configuration,
                    format!("Invalid database URL '{}'", redact_url(&config.url)),
                    e,
                )
            })?
            .application_name(&config.application_name);

        info!(
            url = %redact_url(&config.url),
            application = %config.application_name,
            max_connections = config.max_connections,
            "Connecting to PostgreSQL"
        );

        let pool = PgPoolOptions::new()
            .max_connections(config.max_connections)
            .min_connections(config.min_connections)
            .acquire_timeout(Duration::from_secs(config.connect_timeout_seconds))
            .idle_timeout(Duration::from_secs(config.idle_timeout_seconds))
            .connect_with(options)
            .await
            .map_err(|e| {
                AppError::with_source(
                    ErrorKind::Database,
                    format!("Failed to connect to database: {e}"),
                    e,
                )
            })?;

        Ok(Self { pool })
    }

    /// The underlying sqlx pool.
    pub fn pool(&self) -> &PgPool {
        &self.pool
    }

    /// Open a dedicated LISTEN connection subscribed to `channel`.
    ///
    /// The listener reconnects on its own after a dropped connection;
    /// notifications sent while it was away are lost, which the worker's
    /// polling covers.
    pub async fn listen(&self, channel: &str) -> Result<PgListener, AppError> {
        let mut listener = PgListener::connect_with(&self.pool).await.map_err(|e| {
            AppError::with_source(ErrorKind::Database, "Failed to open LISTEN connection", e)
        })?;
        listener.listen(channel).await.map_err(|e| {
            AppError::with_source(
                ErrorKind::Database,
                format!("Failed to LISTEN on channel '{channel}'"),
                e,
            )
        })?;
        info!(channel, "Listening for task notifications");
        Ok(listener)
    }

    /// Close all connections, waiting for checked-out ones to return.
    pub async fn close(&self) {
        self.pool.close().await;
        info!("Database pool closed");
    }
}

/// Replace the password of a connection URL with `****` for logging.
fn redact_url(url: &str) -> String {
    let Some((scheme, rest)) = url.split_once("://") else {
        return url.to_string();
    };
    let Some((credentials, host)) = rest.rsplit_once('@') else {
        return url.to_string();
    };
    match credentials.split_once(':') {
        Some((user, _)) => format!("{scheme}://{user}:****@{host}"),
        None => url.to_string(),
    }
}
