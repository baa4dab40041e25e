//! Document hierarchy entities.

pub mod listing;
pub mod model;
pub mod size;

pub use listing::{BreadcrumbRoot, Breadcrumbs, NodeEntry};
pub use model::{DEFAULT_CONTENT_TYPE, FileNode, FileNodeRow, NodeKind, blob_key, blob_prefix};
pub use size::human_size;
