//! Tenant routing through the PostgreSQL `search_path`.
//!
//! Tenant tables live in one schema per tenant. A [`TenantScope`] opens a
//! transaction and points its `search_path` at the tenant schema (with
//! `public` as fallback for shared types), so unqualified table names inside
//! the transaction resolve to that tenant only. `SET LOCAL` ends with the
//! transaction; a pooled connection never leaks a tenant to its next user.

use sqlx::{PgPool, Postgres, Transaction};
use tracing::trace;

use memberhub_core::error::{AppError, ErrorKind};
use memberhub_core::result::AppResult;
use memberhub_core::types::tenant::{SchemaName, TenantContext};

/// Opens tenant-scoped transactions.
#[derive(Debug, Clone)]
pub struct TenantScope {
    pool: PgPool,
}

impl TenantScope {
    /// Create a scope factory over a pool.
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    /// The underlying pool, for queries against shared tables.
    pub fn pool(&self) -> &PgPool {
        &self.pool
    }

    /// Begin a transaction routed to the tenant's schema.
    pub async fn begin(&self, tenant: &TenantContext) -> AppResult<Transaction<'static, Postgres>> {
        let mut tx = self.pool.begin().await.map_err(|e| {
            AppError::with_source(ErrorKind::Database, "Failed to begin transaction", e)
        })?;
        enter_schema(&mut tx, &tenant.schema).await?;
        trace!(tenant_id = %tenant.tenant_id, schema = %tenant.schema, "Entered tenant scope");
        Ok(tx)
    }
}

/// Point the transaction's `search_path` at `schema`.
pub async fn enter_schema(tx: &mut Transaction<'static, Postgres>, schema: &SchemaName) -> AppResult<()> {
    sqlx::query(&search_path_statement(schema))
        .execute(&mut **tx)
        .await
        .map_err(|e| {
            AppError::with_source(
                ErrorKind::Database,
                format!("Failed to enter schema '{schema}'"),
                e,
            )
        })?;
    Ok(())
}

/// Commit a tenant transaction.
pub async fn commit(tx: Transaction<'static, Postgres>) -> AppResult<()> {
    tx.commit()
        .await
        .map_err(|e| AppError::with_source(ErrorKind::Database, "Failed to commit transaction", e))
}

fn search_path_statement(schema: &SchemaName) -> String {
    format!("SET LOCAL search_path TO {}, public", schema.quoted())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_search_path_statement_quotes_schema() {
        let schema = SchemaName::parse("afdeling_noord").expect("valid");
        assert_eq!(
            search_path_statement(&schema),
            "SET LOCAL search_path TO \"afdeling_noord\", public"
        );
    }
}
