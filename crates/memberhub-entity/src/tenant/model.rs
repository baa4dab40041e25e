//! Tenant entity model.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;

use memberhub_core::error::AppError;
use memberhub_core::types::id::TenantId;
use memberhub_core::types::tenant::{SchemaName, TenantContext};

/// An organisation with its own database schema.
#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct Tenant {
    /// Unique tenant identifier.
    pub id: TenantId,
    /// PostgreSQL schema holding the tenant's tables.
    pub schema_name: String,
    /// Display name.
    pub name: String,
    /// When the tenant was created.
    pub created_on: DateTime<Utc>,
}

impl Tenant {
    /// Build the execution context for this tenant.
    pub fn context(&self) -> Result<TenantContext, AppError> {
        Ok(TenantContext::new(
            self.id,
            SchemaName::parse(self.schema_name.clone())?,
        ))
    }
}

/// Data required to create a tenant.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CreateTenant {
    /// Schema name (validated on creation).
    pub schema_name: SchemaName,
    /// Display name.
    pub name: String,
}

impl CreateTenant {
    /// Materialize a tenant row.
    pub fn into_tenant(self) -> Tenant {
        Tenant {
            id: TenantId::new(),
            schema_name: self.schema_name.into(),
            name: self.name,
            created_on: Utc::now(),
        }
    }
}
