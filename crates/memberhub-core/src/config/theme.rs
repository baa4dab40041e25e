//! Theme build configuration.

use serde::{Deserialize, Serialize};

/// Settings for the Tailwind theme rebuild task.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ThemeConfig {
    /// The npm executable to invoke.
    #[serde(default = "default_npm")]
    pub npm_command: String,
    /// Directory containing `package.json` and `src/styles.css`.
    #[serde(default = "default_source_dir")]
    pub source_dir: String,
    /// Directory where compiled theme stylesheets are written.
    #[serde(default = "default_output_dir")]
    pub output_dir: String,
}

impl Default for ThemeConfig {
    fn default() -> Self {
        Self {
            npm_command: default_npm(),
            source_dir: default_source_dir(),
            output_dir: default_output_dir(),
        }
    }
}

fn default_npm() -> String {
    "npm".to_string()
}

fn default_source_dir() -> String {
    "./theme/static_src".to_string()
}

fn default_output_dir() -> String {
    "./data/theme".to_string()
}
