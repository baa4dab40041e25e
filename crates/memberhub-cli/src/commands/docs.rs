//! Document tree CLI commands.

use std::path::PathBuf;

use clap::{Args, Subcommand};
use serde::Serialize;
use tabled::Tabled;

use crate::output::{self, OutputFormat};
use memberhub_core::config::AppConfig;
use memberhub_core::error::AppError;
use memberhub_core::types::sorting::SortField;
use memberhub_entity::node::{NodeEntry, human_size};
use memberhub_service::document::tree::parse_sort;
use memberhub_service::{RestoreDestination, UploadItem};

/// Arguments for document commands
#[derive(Debug, Args)]
pub struct DocsArgs {
    /// Tenant id or schema name
    #[arg(short, long)]
    pub tenant: String,

    /// Document subcommand
    #[command(subcommand)]
    pub command: DocsCommand,
}

/// Document subcommands
#[derive(Debug, Subcommand)]
pub enum DocsCommand {
    /// List a directory (top level when omitted)
    Ls {
        /// Directory id
        parent: Option<String>,
        /// Sort keys, e.g. "name" or "-size,name"
        #[arg(short, long, default_value = "name")]
        sort: String,
        /// Include trashed children
        #[arg(long)]
        trashed: bool,
    },
    /// Create a directory
    Mkdir {
        /// Directory name
        name: String,
        /// Parent directory id
        #[arg(short, long)]
        parent: Option<String>,
    },
    /// Upload local files
    Upload {
        /// Files to upload
        #[arg(required = true)]
        paths: Vec<PathBuf>,
        /// Parent directory id
        #[arg(short, long)]
        parent: Option<String>,
    },
    /// Rename a node
    Rename {
        /// Node id
        id: String,
        /// New name
        name: String,
    },
    /// Move a node (to the top level when no destination is given)
    Mv {
        /// Node id
        id: String,
        /// Destination directory id
        #[arg(long)]
        to: Option<String>,
    },
    /// Move a node to the trash
    Trash {
        /// Node id
        id: String,
    },
    /// List the trash
    TrashList {
        /// Sort keys
        #[arg(short, long, default_value = "name")]
        sort: String,
    },
    /// Restore a trashed node
    Restore {
        /// Node id
        id: String,
        /// Restore to the top level instead of the proposed location
        #[arg(long, conflicts_with = "into")]
        top_level: bool,
        /// Restore into this directory instead of the proposed location
        #[arg(long)]
        into: Option<String>,
    },
    /// Delete a node and its subtree for good
    Rm {
        /// Node id
        id: String,
    },
    /// Show the path of a node
    Path {
        /// Node id
        id: String,
    },
    /// Write a file's content to disk
    Get {
        /// Node id
        id: String,
        /// Destination path
        #[arg(short, long)]
        out: PathBuf,
    },
    /// Remove blobs no file refers to
    Sweep {
        /// Keep blobs younger than this
        #[arg(long, default_value = "60")]
        grace_minutes: i64,
    },
}

/// Node display row
#[derive(Debug, Serialize, Tabled)]
struct NodeRow {
    id: String,
    kind: String,
    name: String,
    size: String,
    items: String,
    created: String,
    trashed: String,
}

impl From<&NodeEntry> for NodeRow {
    fn from(entry: &NodeEntry) -> Self {
        let node = &entry.node;
        Self {
            id: node.id.to_string(),
            kind: node.kind.as_str().to_string(),
            name: node.name.clone(),
            size: node.size_bytes().map(human_size).unwrap_or_default(),
            items: entry
                .live_children
                .map(|n| n.to_string())
                .unwrap_or_default(),
            created: node.created_at.format("%Y-%m-%d %H:%M").to_string(),
            trashed: node
                .trashed_at
                .map(|t| t.format("%Y-%m-%d %H:%M").to_string())
                .unwrap_or_default(),
        }
    }
}

/// Execute document commands
pub async fn execute(
    args: &DocsArgs,
    config: &AppConfig,
    format: OutputFormat,
) -> Result<(), AppError> {
    let runtime = super::connect(config).await?;
    let tenant = runtime.tenant(&args.tenant).await?;
    let docs = &runtime.documents;

    match &args.command {
        DocsCommand::Ls {
            parent,
            sort,
            trashed,
        } => {
            let parent = super::parse_node(parent.as_deref())?;
            let keys = sort_keys(sort);
            let entries = docs.list_children(&tenant, parent, &keys, *trashed).await?;
            let rows: Vec<NodeRow> = entries.iter().map(NodeRow::from).collect();
            output::print_list(&rows, format);
        }
        DocsCommand::Mkdir { name, parent } => {
            let parent = super::parse_node(parent.as_deref())?;
            let node = docs.create_directory(&tenant, parent, name).await?;
            output::print_success(&format!("Directory '{}' created (id: {})", node.name, node.id));
        }
        DocsCommand::Upload { paths, parent } => {
            let parent = super::parse_node(parent.as_deref())?;
            let mut items = Vec::with_capacity(paths.len());
            for path in paths {
                let name = path
                    .file_name()
                    .map(|n| n.to_string_lossy().into_owned())
                    .ok_or_else(|| {
                        AppError::validation(format!("'{}' has no file name", path.display()))
                    })?;
                let content = tokio::fs::read(path).await?;
                items.push(UploadItem::new(name, content));
            }

            let summary = docs.upload_files(&tenant, parent, items).await?;
            for node in &summary.uploaded {
                output::print_success(&format!("Uploaded '{}' (id: {})", node.name, node.id));
            }
            for failed in &summary.failed {
                output::print_warning(&format!("'{}' was not uploaded: {}", failed.name, failed.error));
            }
        }
        DocsCommand::Rename { id, name } => {
            let id = super::node_id(id)?;
            let node = docs.rename(&tenant, id, name).await?;
            output::print_success(&format!("Renamed to '{}'", node.name));
        }
        DocsCommand::Mv { id, to } => {
            let id = super::node_id(id)?;
            let to = super::parse_node(to.as_deref())?;
            let node = docs.move_node(&tenant, id, to).await?;
            let path = docs.breadcrumbs(&tenant, node.id).await?;
            output::print_success(&format!("Moved to {}", path.display_path()));
        }
        DocsCommand::Trash { id } => {
            let id = super::node_id(id)?;
            let node = docs.trash(&tenant, id).await?;
            output::print_success(&format!("'{}' moved to the trash", node.name));
        }
        DocsCommand::TrashList { sort } => {
            let keys = sort_keys(sort);
            let entries = docs.list_trash(&tenant, &keys).await?;
            let rows: Vec<NodeRow> = entries.iter().map(NodeRow::from).collect();
            output::print_list(&rows, format);
        }
        DocsCommand::Restore {
            id,
            top_level,
            into,
        } => {
            let id = super::node_id(id)?;
            let destination = match (super::parse_node(into.as_deref())?, *top_level) {
                (Some(dir), _) => RestoreDestination::Directory(dir),
                (None, true) => RestoreDestination::TopLevel,
                (None, false) => RestoreDestination::Proposed,
            };
            let node = docs.restore(&tenant, id, destination).await?;
            let path = docs.breadcrumbs(&tenant, node.id).await?;
            output::print_success(&format!("Restored to {}", path.display_path()));
        }
        DocsCommand::Rm { id } => {
            let id = super::node_id(id)?;
            let summary = docs.permanently_delete(&tenant, id).await?;
            output::print_success(&format!(
                "Deleted ({} blob(s) removed)",
                summary.blobs_removed
            ));
            if summary.blobs_failed > 0 {
                output::print_warning(&format!(
                    "{} blob(s) could not be removed and are left for the sweep",
                    summary.blobs_failed
                ));
            }
        }
        DocsCommand::Path { id } => {
            let id = super::node_id(id)?;
            let crumbs = docs.breadcrumbs(&tenant, id).await?;
            match format {
                OutputFormat::Table => println!("{}", crumbs.display_path()),
                OutputFormat::Json => output::print_item(&crumbs, format),
            }
        }
        DocsCommand::Get { id, out } => {
            let id = super::node_id(id)?;
            let (node, content) = docs.read_file(&tenant, id).await?;
            tokio::fs::write(out, &content).await?;
            output::print_success(&format!(
                "Wrote '{}' ({}) to {}",
                node.name,
                human_size(content.len() as i64),
                out.display()
            ));
        }
        DocsCommand::Sweep { grace_minutes } => {
            let removed = docs
                .sweep_orphaned_blobs(&tenant, chrono::Duration::minutes(*grace_minutes))
                .await?;
            output::print_success(&format!("{removed} orphaned blob(s) removed"));
        }
    }

    Ok(())
}

/// Parse `--sort`, telling the user when unknown keys were dropped.
fn sort_keys(raw: &str) -> Vec<SortField> {
    let keys = parse_sort(raw);
    let applied = keys.iter().map(ToString::to_string).collect::<Vec<_>>().join(",");
    if applied != raw.replace(' ', "") {
        output::print_warning(&format!("Sorting by '{applied}'"));
    }
    keys
}
