//! Document housekeeping tasks.

use std::sync::Arc;

use async_trait::async_trait;
use tracing::info;

use memberhub_service::DocumentService;

use crate::context::TaskContext;
use crate::registry::TaskHandler;

/// Default age below which an unreferenced blob is kept.
const DEFAULT_GRACE_MINUTES: i64 = 60;

/// Removes a tenant's blobs that no file node refers to.
///
/// Keyword `grace_minutes` overrides the default grace period.
#[derive(Debug)]
pub struct SweepOrphanedBlobs {
    documents: Arc<DocumentService>,
}

impl SweepOrphanedBlobs {
    pub const NAME: &'static str = "sweep_orphaned_blobs";

    pub fn new(documents: Arc<DocumentService>) -> Self {
        Self { documents }
    }
}

#[async_trait]
impl TaskHandler for SweepOrphanedBlobs {
    fn name(&self) -> &str {
        Self::NAME
    }

    async fn run(&self, ctx: &TaskContext) -> anyhow::Result<()> {
        let tenant = ctx.tenant()?;
        let grace = ctx
            .kwarg_opt::<i64>("grace_minutes")?
            .unwrap_or(DEFAULT_GRACE_MINUTES);
        let removed = self
            .documents
            .sweep_orphaned_blobs(tenant, chrono::Duration::minutes(grace))
            .await?;
        info!("Removed {removed} orphaned blobs");
        Ok(())
    }
}
