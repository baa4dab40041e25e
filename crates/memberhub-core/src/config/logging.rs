//! Logging configuration.

use serde::{Deserialize, Serialize};

/// Process logging, plus how task output reaches it.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoggingConfig {
    /// `EnvFilter` directives, e.g. `"info,sqlx=warn"`. `RUST_LOG` wins when set.
    #[serde(default = "default_level")]
    pub level: String,
    /// `"json"` or `"pretty"`.
    #[serde(default = "default_format")]
    pub format: String,
    /// Also write events captured from task handlers to the process log.
    /// They always end up in the task's stored output.
    #[serde(default = "default_echo")]
    pub echo_task_logs: bool,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_level(),
            format: default_format(),
            echo_task_logs: default_echo(),
        }
    }
}

fn default_level() -> String {
    "info".to_string()
}

fn default_format() -> String {
    "pretty".to_string()
}

fn default_echo() -> bool {
    true
}
