//! Tenant repository implementation.

use async_trait::async_trait;
use tracing::info;

use memberhub_core::error::{AppError, ErrorKind};
use memberhub_core::result::AppResult;
use memberhub_core::types::id::TenantId;
use memberhub_core::types::tenant::SchemaName;
use memberhub_entity::tenant::{CreateTenant, Tenant};

use crate::migration::apply_tenant_migrations;
use crate::store::TenantStore;
use crate::tenant_scope::{self, TenantScope, enter_schema};

/// Repository for the shared `tenants` table and tenant schemas.
#[derive(Debug, Clone)]
pub struct TenantRepository {
    scope: TenantScope,
}

impl TenantRepository {
    /// Create a new tenant repository.
    pub fn new(scope: TenantScope) -> Self {
        Self { scope }
    }
}

#[async_trait]
impl TenantStore for TenantRepository {
    async fn create(&self, data: CreateTenant) -> AppResult<Tenant> {
        let schema = data.schema_name.clone();
        let mut tx = self.scope.pool().begin().await.map_err(|e| {
            AppError::with_source(ErrorKind::Database, "Failed to begin transaction", e)
        })?;

        let tenant = sqlx::query_as::<_, Tenant>(
            "INSERT INTO tenants (id, schema_name, name, created_on) \
             VALUES ($1, $2, $3, $4) RETURNING *",
        )
        .bind(TenantId::new())
        .bind(schema.as_str())
        .bind(&data.name)
        .bind(chrono::Utc::now())
        .fetch_one(&mut *tx)
        .await
        .map_err(|e| match e {
            sqlx::Error::Database(ref db_err)
                if db_err.constraint() == Some("tenants_schema_name_key") =>
            {
                AppError::conflict(format!("Tenant schema '{schema}' already exists"))
            }
            _ => AppError::with_source(ErrorKind::Database, "Failed to create tenant", e),
        })?;

        sqlx::query(&format!("CREATE SCHEMA {}", schema.quoted()))
            .execute(&mut *tx)
            .await
            .map_err(|e| {
                AppError::with_source(
                    ErrorKind::Database,
                    format!("Failed to create schema '{schema}'"),
                    e,
                )
            })?;
        enter_schema(&mut tx, &schema).await?;
        let applied = apply_tenant_migrations(&mut tx).await?;
        tenant_scope::commit(tx).await?;

        info!(tenant_id = %tenant.id, schema = %schema, migrations = applied, "Tenant provisioned");
        Ok(tenant)
    }

    async fn find_by_id(&self, id: TenantId) -> AppResult<Option<Tenant>> {
        sqlx::query_as::<_, Tenant>("SELECT * FROM tenants WHERE id = $1")
            .bind(id)
            .fetch_optional(self.scope.pool())
            .await
            .map_err(|e| AppError::with_source(ErrorKind::Database, "Failed to find tenant", e))
    }

    async fn find_by_schema(&self, schema: &SchemaName) -> AppResult<Option<Tenant>> {
        sqlx::query_as::<_, Tenant>("SELECT * FROM tenants WHERE schema_name = $1")
            .bind(schema.as_str())
            .fetch_optional(self.scope.pool())
            .await
            .map_err(|e| {
                AppError::with_source(ErrorKind::Database, "Failed to find tenant by schema", e)
            })
    }

    async fn list(&self) -> AppResult<Vec<Tenant>> {
        sqlx::query_as::<_, Tenant>("SELECT * FROM tenants ORDER BY created_on ASC")
            .fetch_all(self.scope.pool())
            .await
            .map_err(|e| AppError::with_source(ErrorKind::Database, "Failed to list tenants", e))
    }
}
