//! File node entity model.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;

use memberhub_core::error::{AppError, ErrorKind};
use memberhub_core::types::id::NodeId;
use memberhub_core::types::tenant::SchemaName;

/// Content type used when neither the caller nor the file name tells us more.
pub const DEFAULT_CONTENT_TYPE: &str = "application/octet-stream";

/// The kind-specific part of a node.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "lowercase")]
pub enum NodeKind {
    /// A container for other nodes.
    Directory,
    /// A leaf node backed by a blob.
    File {
        /// Blob size in bytes.
        size_bytes: i64,
        /// MIME type of the content.
        content_type: String,
    },
}

impl NodeKind {
    /// Database tag stored in the `kind` column.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Directory => "directory",
            Self::File { .. } => "file",
        }
    }
}

/// A node in a tenant's document tree.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FileNode {
    /// Unique node identifier.
    pub id: NodeId,
    /// Display name, unique among live siblings.
    pub name: String,
    /// Containing directory (None at top level).
    pub parent_id: Option<NodeId>,
    /// When the node was created.
    pub created_at: DateTime<Utc>,
    /// When the node was moved to the trash (None while live).
    pub trashed_at: Option<DateTime<Utc>>,
    /// Directory or file details.
    #[serde(flatten)]
    pub kind: NodeKind,
}

impl FileNode {
    /// Build a new live directory.
    pub fn directory(name: impl Into<String>, parent_id: Option<NodeId>) -> Self {
        Self {
            id: NodeId::new(),
            name: name.into(),
            parent_id,
            created_at: Utc::now(),
            trashed_at: None,
            kind: NodeKind::Directory,
        }
    }

    /// Build a new live file.
    pub fn file(
        name: impl Into<String>,
        parent_id: Option<NodeId>,
        size_bytes: i64,
        content_type: impl Into<String>,
    ) -> Self {
        Self {
            id: NodeId::new(),
            name: name.into(),
            parent_id,
            created_at: Utc::now(),
            trashed_at: None,
            kind: NodeKind::File {
                size_bytes,
                content_type: content_type.into(),
            },
        }
    }

    /// Whether this node is a directory.
    pub fn is_directory(&self) -> bool {
        matches!(self.kind, NodeKind::Directory)
    }

    /// Whether this node is a file.
    pub fn is_file(&self) -> bool {
        matches!(self.kind, NodeKind::File { .. })
    }

    /// Whether this node itself carries a trash mark.
    ///
    /// A node can also be in the trash through an ancestor; that needs the
    /// ancestor chain and is answered by the document service.
    pub fn is_trashed(&self) -> bool {
        self.trashed_at.is_some()
    }

    /// Byte size for files.
    pub fn size_bytes(&self) -> Option<i64> {
        match &self.kind {
            NodeKind::File { size_bytes, .. } => Some(*size_bytes),
            NodeKind::Directory => None,
        }
    }

    /// MIME type for files.
    pub fn content_type(&self) -> Option<&str> {
        match &self.kind {
            NodeKind::File { content_type, .. } => Some(content_type),
            NodeKind::Directory => None,
        }
    }

    /// Whether the file content is an image.
    pub fn is_image(&self) -> bool {
        self.content_type().is_some_and(|ct| ct.starts_with("image/"))
    }

    /// Whether the file content is a PDF document.
    pub fn is_pdf(&self) -> bool {
        self.content_type() == Some("application/pdf")
    }

    /// Get the file extension (lowercase), if any.
    pub fn extension(&self) -> Option<String> {
        self.name
            .rsplit('.')
            .next()
            .filter(|ext| *ext != self.name)
            .map(|ext| ext.to_lowercase())
    }

    /// Key of the blob holding this file's content.
    pub fn blob_key(&self, schema: &SchemaName) -> String {
        blob_key(schema, self.id)
    }
}

/// Key prefix under which a tenant's file contents are stored.
pub fn blob_prefix(schema: &SchemaName) -> String {
    format!("{schema}/documents")
}

/// Key of the blob holding the content of the given file node.
pub fn blob_key(schema: &SchemaName, id: NodeId) -> String {
    format!("{}/{id}", blob_prefix(schema))
}

/// Flat database row for `file_nodes`.
#[derive(Debug, Clone, FromRow)]
pub struct FileNodeRow {
    /// Node identifier.
    pub id: NodeId,
    /// Node name.
    pub name: String,
    /// Parent directory.
    pub parent_id: Option<NodeId>,
    /// Creation time.
    pub created_at: DateTime<Utc>,
    /// Trash mark.
    pub trashed_at: Option<DateTime<Utc>>,
    /// `directory` or `file`.
    pub kind: String,
    /// File size, null for directories.
    pub size_bytes: Option<i64>,
    /// File content type, null for directories.
    pub content_type: Option<String>,
}

impl TryFrom<FileNodeRow> for FileNode {
    type Error = AppError;

    fn try_from(row: FileNodeRow) -> Result<Self, Self::Error> {
        let kind = match row.kind.as_str() {
            "directory" => NodeKind::Directory,
            "file" => NodeKind::File {
                size_bytes: row.size_bytes.unwrap_or(0),
                content_type: row
                    .content_type
                    .unwrap_or_else(|| DEFAULT_CONTENT_TYPE.to_string()),
            },
            other => {
                return Err(AppError::new(
                    ErrorKind::Database,
                    format!("Unknown node kind '{other}' for node {}", row.id),
                ));
            }
        };

        Ok(Self {
            id: row.id,
            name: row.name,
            parent_id: row.parent_id,
            created_at: row.created_at,
            trashed_at: row.trashed_at,
            kind,
        })
    }
}
