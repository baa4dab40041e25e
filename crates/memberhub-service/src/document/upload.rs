//! File uploads into the document tree.

use bytes::Bytes;
use tracing::{info, warn};

use memberhub_core::error::AppError;
use memberhub_core::result::AppResult;
use memberhub_core::types::id::NodeId;
use memberhub_core::types::tenant::TenantContext;
use memberhub_entity::node::{DEFAULT_CONTENT_TYPE, FileNode};

use super::service::DocumentService;
use super::tree;

/// One file to upload.
#[derive(Debug, Clone)]
pub struct UploadItem {
    /// File name.
    pub name: String,
    /// File content.
    pub content: Bytes,
    /// MIME type reported by the client, if any.
    pub content_type: Option<String>,
}

impl UploadItem {
    /// Creates an upload item without a declared content type.
    pub fn new(name: impl Into<String>, content: impl Into<Bytes>) -> Self {
        Self {
            name: name.into(),
            content: content.into(),
            content_type: None,
        }
    }
}

/// A file that could not be uploaded.
#[derive(Debug, Clone)]
pub struct FailedUpload {
    /// Name of the rejected file.
    pub name: String,
    /// Why it was rejected.
    pub error: AppError,
}

/// Outcome of a batch upload.
#[derive(Debug, Clone, Default)]
pub struct UploadSummary {
    /// Files stored successfully.
    pub uploaded: Vec<FileNode>,
    /// Files that failed, in submission order.
    pub failed: Vec<FailedUpload>,
}

impl UploadSummary {
    /// Names of the failed files.
    pub fn failed_names(&self) -> Vec<&str> {
        self.failed.iter().map(|f| f.name.as_str()).collect()
    }
}

/// Content type from the client, else guessed from the name, else the
/// generic binary type.
pub fn resolve_content_type(name: &str, declared: Option<&str>) -> String {
    declared
        .map(str::trim)
        .filter(|ct| !ct.is_empty())
        .map(str::to_string)
        .or_else(|| mime_guess::from_path(name).first().map(|m| m.essence_str().to_string()))
        .unwrap_or_else(|| DEFAULT_CONTENT_TYPE.to_string())
}

impl DocumentService {
    /// Uploads one file below `parent` (top level for `None`).
    ///
    /// The content is written first and the row inserted afterwards; when the
    /// insert fails the content is removed again.
    pub async fn upload_file(
        &self,
        tenant: &TenantContext,
        parent: Option<NodeId>,
        item: UploadItem,
    ) -> AppResult<FileNode> {
        let name = tree::validate_name(&item.name)?;
        if item.content.len() as u64 > self.config.max_upload_size_bytes {
            return Err(AppError::validation(format!(
                "'{name}' exceeds the maximum upload size of {} bytes",
                self.config.max_upload_size_bytes
            )));
        }
        self.require_directory(tenant, parent).await?;
        self.ensure_name_free(tenant, parent, &name, None).await?;

        let content_type = resolve_content_type(&name, item.content_type.as_deref());
        let node = FileNode::file(name, parent, item.content.len() as i64, content_type);
        let key = node.blob_key(&tenant.schema);

        self.blobs.write(&key, item.content).await?;
        if let Err(e) = self.nodes.insert(tenant, &node).await {
            if let Err(cleanup) = self.blobs.delete(&key).await {
                warn!(key = %key, error = %cleanup, "Failed to remove blob of rejected upload");
            }
            return Err(e);
        }

        info!(
            tenant = %tenant.schema,
            node_id = %node.id,
            name = %node.name,
            size_bytes = node.size_bytes().unwrap_or(0),
            "File uploaded"
        );
        Ok(node)
    }

    /// Uploads several files; a failing file does not stop the batch.
    pub async fn upload_files(
        &self,
        tenant: &TenantContext,
        parent: Option<NodeId>,
        items: Vec<UploadItem>,
    ) -> AppResult<UploadSummary> {
        // A missing or non-directory parent fails every file alike.
        self.require_directory(tenant, parent).await?;

        let mut summary = UploadSummary::default();
        for item in items {
            let name = item.name.clone();
            match self.upload_file(tenant, parent, item).await {
                Ok(node) => summary.uploaded.push(node),
                Err(error) => {
                    warn!(tenant = %tenant.schema, name = %name, error = %error, "Upload failed");
                    summary.failed.push(FailedUpload { name, error });
                }
            }
        }
        Ok(summary)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_resolve_content_type() {
        assert_eq!(resolve_content_type("a.pdf", Some("application/x-custom")), "application/x-custom");
        assert_eq!(resolve_content_type("a.pdf", None), "application/pdf");
        assert_eq!(resolve_content_type("logo.PNG", Some("  ")), "image/png");
        assert_eq!(resolve_content_type("README", None), DEFAULT_CONTENT_TYPE);
    }
}
