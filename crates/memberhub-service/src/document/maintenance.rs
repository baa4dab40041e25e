//! Blob store housekeeping.

use std::collections::HashSet;

use chrono::{Duration, Utc};
use tracing::{info, warn};

use memberhub_core::result::AppResult;
use memberhub_core::types::id::NodeId;
use memberhub_core::types::tenant::TenantContext;
use memberhub_entity::node::blob_prefix;

use super::service::DocumentService;

impl DocumentService {
    /// Removes blobs of the tenant that no file node refers to.
    ///
    /// Blobs younger than `grace` are kept, since an upload writes its blob
    /// before inserting the row. Keys that are not node ids are ignored.
    pub async fn sweep_orphaned_blobs(
        &self,
        tenant: &TenantContext,
        grace: Duration,
    ) -> AppResult<usize> {
        let known: HashSet<NodeId> = self.nodes.all_file_ids(tenant).await?.into_iter().collect();
        let cutoff = Utc::now() - grace;

        let mut removed = 0;
        for blob in self.blobs.list(&blob_prefix(&tenant.schema)).await? {
            let Some(id) = blob
                .key
                .rsplit('/')
                .next()
                .and_then(|name| name.parse::<NodeId>().ok())
            else {
                continue;
            };
            let settled = blob.last_modified.is_none_or(|at| at < cutoff);
            if known.contains(&id) || !settled {
                continue;
            }
            match self.blobs.delete(&blob.key).await {
                Ok(()) => removed += 1,
                Err(e) => warn!(key = %blob.key, error = %e, "Failed to remove orphaned blob"),
            }
        }

        info!(tenant = %tenant.schema, removed, "Orphaned blob sweep finished");
        Ok(removed)
    }
}
