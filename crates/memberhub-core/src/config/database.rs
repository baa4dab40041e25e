//! Database configuration.

use serde::{Deserialize, Serialize};

/// PostgreSQL settings shared by the daemon and the admin CLI.
///
/// Tenant schemas and the shared task table live in the same database, so a
/// single pool serves both.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DatabaseConfig {
    /// PostgreSQL connection URL.
    pub url: String,
    /// Pool ceiling. The worker holds one extra connection for LISTEN.
    #[serde(default = "default_max_connections")]
    pub max_connections: u32,
    /// Connections kept open while idle.
    #[serde(default = "default_min_connections")]
    pub min_connections: u32,
    /// Seconds to wait for a free pooled connection.
    #[serde(default = "default_acquire_timeout")]
    pub connect_timeout_seconds: u64,
    /// Seconds before an idle pooled connection is closed.
    #[serde(default = "default_idle_timeout")]
    pub idle_timeout_seconds: u64,
    /// `application_name` reported to the server (visible in
    /// `pg_stat_activity`).
    #[serde(default = "default_application_name")]
    pub application_name: String,
}

impl DatabaseConfig {
    /// The same settings reporting a different application name.
    pub fn for_application(&self, name: &str) -> Self {
        Self {
            application_name: name.to_string(),
            ..self.clone()
        }
    }
}

fn default_max_connections() -> u32 {
    20
}

fn default_min_connections() -> u32 {
    1
}

fn default_acquire_timeout() -> u64 {
    10
}

fn default_idle_timeout() -> u64 {
    300
}

fn default_application_name() -> String {
    "memberhub".to_string()
}
