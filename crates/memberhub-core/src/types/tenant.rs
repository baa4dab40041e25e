//! Tenant execution context.
//!
//! Every tenant owns an isolated PostgreSQL schema. A [`TenantContext`] names
//! that schema and is threaded through repositories and task handlers so no
//! query runs without a resolved tenant.

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::error::AppError;
use crate::types::id::TenantId;

/// Maximum length of a PostgreSQL identifier.
const MAX_IDENTIFIER_LEN: usize = 63;

/// A validated PostgreSQL schema name.
///
/// Only lowercase ASCII letters, digits and underscores are accepted and the
/// first character must be a letter, so the value can be quoted into
/// `SET search_path` statements.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct SchemaName(String);

impl SchemaName {
    /// Validate and wrap a schema name.
    pub fn parse(raw: impl Into<String>) -> Result<Self, AppError> {
        let raw = raw.into();
        let mut chars = raw.chars();
        let valid_start = chars.next().is_some_and(|c| c.is_ascii_lowercase());
        let valid_rest = chars.all(|c| c.is_ascii_lowercase() || c.is_ascii_digit() || c == '_');

        if !valid_start || !valid_rest || raw.len() > MAX_IDENTIFIER_LEN {
            return Err(AppError::validation(format!(
                "Invalid tenant schema name '{raw}'"
            )));
        }
        if raw == "public" || raw == "information_schema" || raw.starts_with("pg_") {
            return Err(AppError::validation(format!(
                "Schema name '{raw}' is reserved"
            )));
        }
        Ok(Self(raw))
    }

    /// The raw schema name.
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// The schema name as a double-quoted SQL identifier.
    pub fn quoted(&self) -> String {
        format!("\"{}\"", self.0)
    }
}

impl TryFrom<String> for SchemaName {
    type Error = AppError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Self::parse(value)
    }
}

impl From<SchemaName> for String {
    fn from(value: SchemaName) -> Self {
        value.0
    }
}

impl fmt::Display for SchemaName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// The tenant a request or task executes for.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct TenantContext {
    /// Tenant identifier.
    pub tenant_id: TenantId,
    /// Schema holding the tenant's tables.
    pub schema: SchemaName,
}

impl TenantContext {
    /// Create a new tenant context.
    pub fn new(tenant_id: TenantId, schema: SchemaName) -> Self {
        Self { tenant_id, schema }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_schema_name_validation() {
        assert!(SchemaName::parse("afdeling_utrecht").is_ok());
        assert!(SchemaName::parse("t2024").is_ok());
        assert!(SchemaName::parse("").is_err());
        assert!(SchemaName::parse("2024t").is_err());
        assert!(SchemaName::parse("Upper").is_err());
        assert!(SchemaName::parse("evil\"; DROP").is_err());
        assert!(SchemaName::parse("public").is_err());
        assert!(SchemaName::parse("pg_catalog").is_err());
        assert!(SchemaName::parse("information_schema").is_err());
        assert!(SchemaName::parse("a".repeat(64)).is_err());
    }

    #[test]
    fn test_quoted() {
        let schema = SchemaName::parse("demo").expect("valid");
        assert_eq!(schema.quoted(), "\"demo\"");
    }

    #[test]
    fn test_deserialize_validates() {
        let ok: Result<SchemaName, _> = serde_json::from_str("\"demo\"");
        assert!(ok.is_ok());
        let bad: Result<SchemaName, _> = serde_json::from_str("\"DROP TABLE\"");
        assert!(bad.is_err());
    }
}
