//! Database migration runner.
//!
//! Shared tables are migrated with `sqlx::migrate!`. Tenant tables are
//! created inside each tenant schema from the embedded scripts below; every
//! schema records what it has applied in its own `tenant_migrations` table.

use sqlx::{Executor, PgPool, Postgres, Transaction};
use tracing::info;

use memberhub_core::error::{AppError, ErrorKind};
use memberhub_core::result::AppResult;
use memberhub_core::types::tenant::TenantContext;

use crate::tenant_scope::{self, TenantScope};

/// Per-tenant migrations, applied in order.
pub const TENANT_MIGRATIONS: &[(i64, &str, &str)] = &[
    (
        1,
        "documents",
        include_str!("../../../migrations/tenant/0001_documents.sql"),
    ),
    (
        2,
        "theme_versions",
        include_str!("../../../migrations/tenant/0002_theme_versions.sql"),
    ),
];

const TENANT_LEDGER_DDL: &str = "CREATE TABLE IF NOT EXISTS tenant_migrations ( \
    version BIGINT PRIMARY KEY, \
    description TEXT NOT NULL, \
    applied_at TIMESTAMPTZ NOT NULL DEFAULT NOW())";

/// Run all pending migrations of the shared schema.
pub async fn run_migrations(pool: &PgPool) -> Result<(), AppError> {
    info!("Running database migrations...");

    sqlx::migrate!("../../migrations/public")
        .run(pool)
        .await
        .map_err(|e| {
            AppError::with_source(
                ErrorKind::Database,
                format!("Failed to run migrations: {e}"),
                e,
            )
        })?;

    info!("Database migrations completed successfully");
    Ok(())
}

/// Apply pending tenant migrations inside a transaction already routed to the
/// tenant schema. Returns how many scripts ran.
pub async fn apply_tenant_migrations(tx: &mut Transaction<'static, Postgres>) -> AppResult<usize> {
    (&mut **tx)
        .execute(sqlx::raw_sql(TENANT_LEDGER_DDL))
        .await
        .map_err(|e| {
            AppError::with_source(ErrorKind::Database, "Failed to create migration ledger", e)
        })?;

    let applied: Vec<i64> = sqlx::query_scalar("SELECT version FROM tenant_migrations")
        .fetch_all(&mut **tx)
        .await
        .map_err(|e| {
            AppError::with_source(ErrorKind::Database, "Failed to read migration ledger", e)
        })?;

    let mut ran = 0;
    for (version, description, script) in pending(&applied) {
        (&mut **tx).execute(sqlx::raw_sql(script)).await.map_err(|e| {
            AppError::with_source(
                ErrorKind::Database,
                format!("Tenant migration {version} ({description}) failed"),
                e,
            )
        })?;
        sqlx::query("INSERT INTO tenant_migrations (version, description) VALUES ($1, $2)")
            .bind(version)
            .bind(description)
            .execute(&mut **tx)
            .await
            .map_err(|e| {
                AppError::with_source(ErrorKind::Database, "Failed to record tenant migration", e)
            })?;
        ran += 1;
    }
    Ok(ran)
}

/// Bring one existing tenant schema up to date.
pub async fn migrate_tenant(scope: &TenantScope, tenant: &TenantContext) -> AppResult<usize> {
    let mut tx = scope.begin(tenant).await?;
    let ran = apply_tenant_migrations(&mut tx).await?;
    tenant_scope::commit(tx).await?;
    if ran > 0 {
        info!(tenant_id = %tenant.tenant_id, schema = %tenant.schema, applied = ran, "Tenant schema migrated");
    }
    Ok(ran)
}

/// Versions of the tenant migrations a schema has applied, ascending.
pub async fn applied_tenant_migrations(
    scope: &TenantScope,
    tenant: &TenantContext,
) -> AppResult<Vec<i64>> {
    let mut tx = scope.begin(tenant).await?;
    let has_ledger: bool =
        sqlx::query_scalar("SELECT to_regclass('tenant_migrations') IS NOT NULL")
            .fetch_one(&mut *tx)
            .await
            .map_err(|e| {
                AppError::with_source(ErrorKind::Database, "Failed to look up migration ledger", e)
            })?;
    let versions = if has_ledger {
        sqlx::query_scalar("SELECT version FROM tenant_migrations ORDER BY version")
            .fetch_all(&mut *tx)
            .await
            .map_err(|e| {
                AppError::with_source(ErrorKind::Database, "Failed to read migration ledger", e)
            })?
    } else {
        Vec::new()
    };
    tenant_scope::commit(tx).await?;
    Ok(versions)
}

/// Tenant migrations not yet in `applied`, as `(version, description)`.
pub fn pending_tenant_migrations(applied: &[i64]) -> Vec<(i64, &'static str)> {
    pending(applied).map(|(v, d, _)| (v, d)).collect()
}

fn pending(applied: &[i64]) -> impl Iterator<Item = (i64, &'static str, &'static str)> + '_ {
    TENANT_MIGRATIONS
        .iter()
        .copied()
        .filter(move |(version, _, _)| !applied.contains(version))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_tenant_migrations_are_ordered() {
        let versions: Vec<i64> = TENANT_MIGRATIONS.iter().map(|(v, _, _)| *v).collect();
        let mut sorted = versions.clone();
        sorted.sort_unstable();
        sorted.dedup();
        assert_eq!(versions, sorted);
    }

    #[test]
    fn test_pending_skips_applied() {
        let left: Vec<i64> = pending(&[1]).map(|(v, _, _)| v).collect();
        assert_eq!(left, vec![2]);
        assert_eq!(pending(&[1, 2]).count(), 0);
    }

    #[test]
    fn test_documents_script_has_sibling_index() {
        let (_, _, script) = TENANT_MIGRATIONS[0];
        assert!(script.contains("file_nodes_live_sibling_name_key"));
        assert!(script.contains("ON DELETE CASCADE"));
    }
}
