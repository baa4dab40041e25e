//! Listing and navigation views over the document tree.

use serde::{Deserialize, Serialize};

use super::model::FileNode;

/// A node as shown in a directory or trash listing.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NodeEntry {
    /// The node itself.
    #[serde(flatten)]
    pub node: FileNode,
    /// Number of live children, for directories.
    pub live_children: Option<u64>,
}

impl NodeEntry {
    /// Size used for sorting: live child count or byte size.
    pub fn sort_size(&self) -> i64 {
        match self.node.size_bytes() {
            Some(bytes) => bytes,
            None => self.live_children.unwrap_or(0) as i64,
        }
    }
}

/// Where a breadcrumb trail starts.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum BreadcrumbRoot {
    /// The live document tree.
    Documents,
    /// The trashcan; the first crumb is the trashed node.
    Trashcan,
}

impl BreadcrumbRoot {
    /// Display label of the root crumb.
    pub fn label(&self) -> &'static str {
        match self {
            Self::Documents => "Documents",
            Self::Trashcan => "Trashcan",
        }
    }
}

/// Root-to-leaf path to a node.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Breadcrumbs {
    /// Root of the trail.
    pub root: BreadcrumbRoot,
    /// Nodes from the outermost shown ancestor down to the node itself.
    pub nodes: Vec<FileNode>,
}

impl Breadcrumbs {
    /// Render the trail as `Root / a / b`.
    pub fn display_path(&self) -> String {
        std::iter::once(self.root.label())
            .chain(self.nodes.iter().map(|n| n.name.as_str()))
            .collect::<Vec<_>>()
            .join(" / ")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_display_path() {
        let a = FileNode::directory("a", None);
        let b = FileNode::directory("b", Some(a.id));
        let crumbs = Breadcrumbs {
            root: BreadcrumbRoot::Trashcan,
            nodes: vec![a, b],
        };
        assert_eq!(crumbs.display_path(), "Trashcan / a / b");
    }
}
