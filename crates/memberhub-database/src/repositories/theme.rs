//! Theme version repository implementation.

use async_trait::async_trait;

use memberhub_core::error::{AppError, ErrorKind};
use memberhub_core::result::AppResult;
use memberhub_core::types::tenant::TenantContext;
use memberhub_entity::theme::ThemeVersion;

use crate::store::ThemeVersionStore;
use crate::tenant_scope::{self, TenantScope};

/// Repository for a tenant's `theme_versions` table.
#[derive(Debug, Clone)]
pub struct ThemeVersionRepository {
    scope: TenantScope,
}

impl ThemeVersionRepository {
    /// Create a new theme version repository.
    pub fn new(scope: TenantScope) -> Self {
        Self { scope }
    }
}

#[async_trait]
impl ThemeVersionStore for ThemeVersionRepository {
    async fn record(&self, tenant: &TenantContext, version: &ThemeVersion) -> AppResult<()> {
        let mut tx = self.scope.begin(tenant).await?;
        sqlx::query("INSERT INTO theme_versions (id, version, created_at) VALUES ($1, $2, $3)")
            .bind(version.id)
            .bind(version.version)
            .bind(version.created_at)
            .execute(&mut *tx)
            .await
            .map_err(|e| {
                AppError::with_source(ErrorKind::Database, "Failed to record theme version", e)
            })?;
        tenant_scope::commit(tx).await
    }

    async fn latest(&self, tenant: &TenantContext) -> AppResult<Option<ThemeVersion>> {
        let mut tx = self.scope.begin(tenant).await?;
        let version = sqlx::query_as::<_, ThemeVersion>(
            "SELECT * FROM theme_versions ORDER BY version DESC LIMIT 1",
        )
        .fetch_optional(&mut *tx)
        .await
        .map_err(|e| AppError::with_source(ErrorKind::Database, "Failed to find theme version", e))?;
        tenant_scope::commit(tx).await?;
        Ok(version)
    }
}
