//! Theme version entity model.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use uuid::Uuid;

/// A successfully built stylesheet for a tenant.
#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct ThemeVersion {
    /// Unique identifier.
    pub id: Uuid,
    /// Version number (milliseconds since the epoch at build time).
    pub version: i64,
    /// When the version was recorded.
    pub created_at: DateTime<Utc>,
}

impl ThemeVersion {
    /// A new version stamped with the current time.
    pub fn now() -> Self {
        let created_at = Utc::now();
        Self {
            id: Uuid::new_v4(),
            version: created_at.timestamp_millis(),
            created_at,
        }
    }

    /// File name of the stylesheet built for this version.
    pub fn stylesheet_name(&self) -> String {
        format!("theme-{}.css", self.version)
    }
}
