//! Tenant creation and lookup.

use std::sync::Arc;

use tracing::info;

use memberhub_core::error::AppError;
use memberhub_core::result::AppResult;
use memberhub_core::types::id::TenantId;
use memberhub_core::types::tenant::{SchemaName, TenantContext};
use memberhub_database::TenantStore;
use memberhub_entity::tenant::{CreateTenant, Tenant};

/// Creates tenants and resolves them into execution contexts.
#[derive(Debug, Clone)]
pub struct TenantService {
    /// Tenant persistence.
    tenants: Arc<dyn TenantStore>,
}

impl TenantService {
    /// Creates a new tenant service.
    pub fn new(tenants: Arc<dyn TenantStore>) -> Self {
        Self { tenants }
    }

    /// Creates a tenant with its own schema.
    pub async fn create(&self, schema_name: &str, name: &str) -> AppResult<Tenant> {
        let schema_name = SchemaName::parse(schema_name)?;
        let name = name.trim();
        if name.is_empty() {
            return Err(AppError::validation("Tenant name cannot be empty"));
        }

        let tenant = self
            .tenants
            .create(CreateTenant {
                schema_name,
                name: name.to_string(),
            })
            .await?;

        info!(tenant_id = %tenant.id, schema = %tenant.schema_name, "Tenant created");
        Ok(tenant)
    }

    /// Lists all tenants.
    pub async fn list(&self) -> AppResult<Vec<Tenant>> {
        self.tenants.list().await
    }

    /// Resolves a tenant id into its execution context.
    pub async fn context(&self, id: TenantId) -> AppResult<TenantContext> {
        self.tenants
            .find_by_id(id)
            .await?
            .ok_or_else(|| AppError::not_found(format!("Tenant {id} not found")))?
            .context()
    }

    /// Resolves a tenant given by id or schema name.
    pub async fn resolve(&self, key: &str) -> AppResult<TenantContext> {
        if let Ok(id) = key.parse::<TenantId>() {
            return self.context(id).await;
        }
        let schema = SchemaName::parse(key)?;
        self.tenants
            .find_by_schema(&schema)
            .await?
            .ok_or_else(|| AppError::not_found(format!("Tenant '{schema}' not found")))?
            .context()
    }
}
