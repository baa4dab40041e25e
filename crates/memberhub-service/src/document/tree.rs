//! Pure algorithms over a node and its ancestor chain.
//!
//! Ancestor chains are ordered nearest first, as returned by
//! [`NodeStore::ancestors`](memberhub_database::NodeStore::ancestors). Every
//! walk stops at a repeated id, so a corrupted parent cycle cannot hang a
//! caller.

use std::cmp::Ordering;
use std::collections::HashSet;

use memberhub_core::error::AppError;
use memberhub_core::result::AppResult;
use memberhub_core::types::id::NodeId;
use memberhub_core::types::sorting::{SortDirection, SortField};
use memberhub_entity::node::{BreadcrumbRoot, Breadcrumbs, FileNode, NodeEntry};

/// Sort keys accepted by listings.
pub const SORT_KEYS: [&str; 3] = ["name", "created_at", "size"];

/// Longest accepted node name, in characters.
pub const MAX_NAME_LEN: usize = 255;

/// Ancestors up to the first repeated id.
fn acyclic<'a>(node_id: NodeId, ancestors: &'a [FileNode]) -> impl Iterator<Item = &'a FileNode> {
    let mut seen = HashSet::from([node_id]);
    ancestors.iter().take_while(move |a| seen.insert(a.id))
}

/// Whether the node or any of its ancestors carries a trash mark.
pub fn is_in_trash(node: &FileNode, ancestors: &[FileNode]) -> bool {
    node.is_trashed() || acyclic(node.id, ancestors).any(FileNode::is_trashed)
}

/// The deepest ancestor such that neither it nor anything above it is
/// trashed. `None` means the top level.
pub fn nearest_live_ancestor<'a>(node: &FileNode, ancestors: &'a [FileNode]) -> Option<&'a FileNode> {
    let chain: Vec<&FileNode> = acyclic(node.id, ancestors).collect();
    chain
        .into_iter()
        .rev()
        .take_while(|a| !a.is_trashed())
        .last()
}

/// Validate moving `node` below `destination` (top level for `None`).
///
/// `destination_ancestors` is the ancestor chain of the destination.
pub fn check_move(
    node: &FileNode,
    destination: Option<&FileNode>,
    destination_ancestors: &[FileNode],
) -> AppResult<()> {
    let Some(destination) = destination else {
        return Ok(());
    };
    if !destination.is_directory() {
        return Err(AppError::invalid_move(format!(
            "Cannot move '{}' into file '{}'",
            node.name, destination.name
        )));
    }
    if destination.id == node.id {
        return Err(AppError::invalid_move(format!(
            "Cannot move '{}' into itself",
            node.name
        )));
    }
    if acyclic(destination.id, destination_ancestors).any(|a| a.id == node.id) {
        return Err(AppError::invalid_move(format!(
            "Cannot move '{}' into its own subdirectory '{}'",
            node.name, destination.name
        )));
    }
    Ok(())
}

/// Root-to-leaf trail to `node`, cut after the first trashed node met on the
/// way up.
pub fn breadcrumbs(node: &FileNode, ancestors: &[FileNode]) -> Breadcrumbs {
    let mut nodes = Vec::new();
    let mut root = BreadcrumbRoot::Documents;
    for current in std::iter::once(node).chain(acyclic(node.id, ancestors)) {
        nodes.push(current.clone());
        if current.is_trashed() {
            root = BreadcrumbRoot::Trashcan;
            break;
        }
    }
    nodes.reverse();
    Breadcrumbs { root, nodes }
}

/// Validate a node name and return it trimmed.
pub fn validate_name(name: &str) -> AppResult<String> {
    let name = name.trim();
    if name.is_empty() {
        return Err(AppError::validation("Name cannot be empty"));
    }
    if name == "." || name == ".." || name.contains(['/', '\0']) {
        return Err(AppError::validation(format!("Invalid name '{name}'")));
    }
    if name.chars().count() > MAX_NAME_LEN {
        return Err(AppError::validation(format!(
            "Name exceeds {MAX_NAME_LEN} characters"
        )));
    }
    Ok(name.to_string())
}

/// Parse a comma separated sort parameter such as `-size,name`.
///
/// Unknown keys are dropped; an empty result falls back to name ascending.
pub fn parse_sort(raw: &str) -> Vec<SortField> {
    let fields: Vec<SortField> = raw
        .split(',')
        .filter_map(SortField::parse)
        .filter(|f| SORT_KEYS.contains(&f.field.as_str()))
        .collect();
    if fields.is_empty() {
        vec![SortField::asc("name")]
    } else {
        fields
    }
}

fn compare_by(field: &SortField, a: &NodeEntry, b: &NodeEntry) -> Ordering {
    let ordering = match field.field.as_str() {
        "created_at" => a.node.created_at.cmp(&b.node.created_at),
        "size" => a.sort_size().cmp(&b.sort_size()),
        _ => a
            .node
            .name
            .to_lowercase()
            .cmp(&b.node.name.to_lowercase()),
    };
    match field.direction {
        SortDirection::Asc => ordering,
        SortDirection::Desc => ordering.reverse(),
    }
}

/// Order a listing: directories first, then by the sort fields, then by
/// exact name for a stable result.
pub fn sort_entries(entries: &mut [NodeEntry], sort: &[SortField]) {
    entries.sort_by(|a, b| {
        b.node
            .is_directory()
            .cmp(&a.node.is_directory())
            .then_with(|| {
                sort.iter()
                    .map(|f| compare_by(f, a, b))
                    .find(|o| o.is_ne())
                    .unwrap_or(Ordering::Equal)
            })
            .then_with(|| a.node.name.cmp(&b.node.name))
    });
}
