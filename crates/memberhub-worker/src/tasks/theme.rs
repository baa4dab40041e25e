//! Theme stylesheet rebuild.

use std::path::Path;
use std::process::Stdio;
use std::sync::Arc;

use anyhow::Context as _;
use async_trait::async_trait;
use tokio::io::{AsyncBufReadExt, AsyncRead, BufReader};
use tokio::process::Command;
use tracing::{error, info};

use memberhub_core::config::ThemeConfig;
use memberhub_database::ThemeVersionStore;
use memberhub_entity::theme::ThemeVersion;

use crate::context::TaskContext;
use crate::registry::TaskHandler;

/// Builds a tenant's stylesheet with the npm `tailwindcss` script and
/// records the new version on success.
///
/// A build that exits non-zero is logged and the task still completes; the
/// previous version stays current. Failing to start the build at all is a
/// task error.
#[derive(Debug)]
pub struct RebuildTheme {
    config: ThemeConfig,
    versions: Arc<dyn ThemeVersionStore>,
}

impl RebuildTheme {
    pub const NAME: &'static str = "rebuild_theme";

    pub fn new(config: ThemeConfig, versions: Arc<dyn ThemeVersionStore>) -> Self {
        Self { config, versions }
    }
}

#[async_trait]
impl TaskHandler for RebuildTheme {
    fn name(&self) -> &str {
        Self::NAME
    }

    async fn run(&self, ctx: &TaskContext) -> anyhow::Result<()> {
        let tenant = ctx.tenant()?;
        let version = ThemeVersion::now();

        let source_dir = Path::new(&self.config.source_dir);
        let output_dir = Path::new(&self.config.output_dir).join(tenant.schema.as_str());
        tokio::fs::create_dir_all(&output_dir)
            .await
            .with_context(|| format!("Creating theme output directory {}", output_dir.display()))?;
        let input = source_dir.join("src").join("styles.css");
        let output = output_dir.join(version.stylesheet_name());

        info!("Rebuilding theme version {}", version.version);
        let mut child = Command::new(&self.config.npm_command)
            .args(["run", "tailwindcss", "--", "--postcss", "--minify", "-i"])
            .arg(&input)
            .arg("-o")
            .arg(&output)
            .current_dir(source_dir)
            .env("NODE_ENV", "production")
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true)
            .spawn()
            .with_context(|| format!("Starting theme build with '{}'", self.config.npm_command))?;

        let stdout = child.stdout.take();
        let stderr = child.stderr.take();
        let (_, _, status) = tokio::join!(log_lines(stdout), log_lines(stderr), child.wait());
        let status = status.context("Waiting for the theme build")?;

        if !status.success() {
            error!(code = status.code(), "Rebuilding theme failed");
            return Ok(());
        }

        self.versions.record(tenant, &version).await?;
        info!("Theme version {} built at {}", version.version, output.display());
        Ok(())
    }
}

async fn log_lines<R: AsyncRead + Unpin>(reader: Option<R>) {
    let Some(reader) = reader else {
        return;
    };
    let mut lines = BufReader::new(reader).lines();
    while let Ok(Some(line)) = lines.next_line().await {
        info!("{line}");
    }
}
