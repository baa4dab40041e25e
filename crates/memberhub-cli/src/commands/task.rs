//! Task queue CLI commands.

use clap::{Args, Subcommand};
use serde::Serialize;
use tabled::Tabled;

use crate::output::{self, OutputFormat};
use memberhub_core::config::AppConfig;
use memberhub_core::error::AppError;
use memberhub_core::types::id::TaskId;
use memberhub_entity::task::{Task, TaskArgs as EncodedArgs, TaskStatus};
use memberhub_worker::NodeResolver;

/// Arguments for task commands
#[derive(Debug, Args)]
pub struct TaskArgs {
    /// Task subcommand
    #[command(subcommand)]
    pub command: TaskCommand,
}

/// Task subcommands
#[derive(Debug, Subcommand)]
pub enum TaskCommand {
    /// Enqueue a task
    Enqueue {
        /// Registered task name
        name: String,
        /// Tenant id or schema name
        #[arg(short, long)]
        tenant: Option<String>,
        /// Positional argument as JSON (repeatable)
        #[arg(long = "arg")]
        args: Vec<String>,
        /// Keyword argument as key=JSON (repeatable)
        #[arg(long = "kwarg")]
        kwargs: Vec<String>,
        /// Keyword argument referencing a document node, as key=NODE_ID (repeatable)
        #[arg(long = "node")]
        nodes: Vec<String>,
    },
    /// List recent tasks
    List {
        /// Only tasks with this status
        #[arg(short, long)]
        status: Option<String>,
        /// Maximum number of tasks
        #[arg(short, long, default_value = "20")]
        limit: u32,
    },
    /// Show one task with its output
    Show {
        /// Task id
        id: String,
    },
    /// Show task counts per status
    Stats,
    /// List registered task names
    Names,
    /// Release claims of crashed workers
    RequeueStale {
        /// Claims older than this many seconds are released
        #[arg(long)]
        older_than: Option<u64>,
        /// Only release claims of this worker (one known to be gone)
        #[arg(long)]
        worker: Option<String>,
    },
}

/// Task display row
#[derive(Debug, Serialize, Tabled)]
struct TaskRow {
    id: String,
    name: String,
    status: String,
    created: String,
    worker: String,
    duration: String,
}

impl From<&Task> for TaskRow {
    fn from(t: &Task) -> Self {
        Self {
            id: t.id.to_string(),
            name: t.name.clone(),
            status: t.status.to_string(),
            created: t.created_at.format("%Y-%m-%d %H:%M:%S").to_string(),
            worker: t.worker_id.clone().unwrap_or_default(),
            duration: t
                .run_duration()
                .map(|d| format!("{} ms", d.num_milliseconds()))
                .unwrap_or_default(),
        }
    }
}

/// Execute task commands
pub async fn execute(
    args: &TaskArgs,
    config: &AppConfig,
    format: OutputFormat,
) -> Result<(), AppError> {
    let runtime = super::connect(config).await?;
    let queue = &runtime.worker.queue;

    match &args.command {
        TaskCommand::Enqueue {
            name,
            tenant,
            args,
            kwargs,
            nodes,
        } => {
            let tenant = match tenant {
                Some(key) => Some(runtime.tenant(key).await?),
                None => None,
            };
            let encoded = build_args(args, kwargs, nodes)?;
            let task = queue.enqueue(tenant.as_ref(), name, encoded).await?;
            output::print_success(&format!(
                "Task '{}' enqueued (id: {}, status: {})",
                task.name, task.id, task.status
            ));
        }
        TaskCommand::List { status, limit } => {
            let status = status.as_deref().map(parse_status).transpose()?;
            let tasks = queue.recent(status, *limit).await?;
            let rows: Vec<TaskRow> = tasks.iter().map(TaskRow::from).collect();
            output::print_list(&rows, format);
        }
        TaskCommand::Show { id } => {
            let id: TaskId = id
                .parse()
                .map_err(|e| AppError::validation(format!("Invalid task id '{id}': {e}")))?;
            let task = queue.find(id).await?;
            match format {
                OutputFormat::Json => output::print_item(&task, format),
                OutputFormat::Table => {
                    let row = TaskRow::from(&task);
                    output::print_item(&row, format);
                    if !task.output.is_empty() {
                        println!("\n{}", task.output);
                    }
                }
            }
        }
        TaskCommand::Stats => {
            let counts = queue.counts().await?;
            println!("Task Queue Status:");
            for status in TaskStatus::ALL {
                let count = counts
                    .iter()
                    .find(|(s, _)| *s == status)
                    .map(|(_, n)| *n)
                    .unwrap_or(0);
                output::print_kv(status.as_str(), &count.to_string());
            }
            output::print_kv("Batch size", &config.worker.batch_size.to_string());
            output::print_kv("Run inline", &config.worker.run_tasks_sync.to_string());
        }
        TaskCommand::Names => {
            for name in queue.task_names() {
                println!("{name}");
            }
        }
        TaskCommand::RequeueStale { older_than, worker } => {
            let age = older_than.unwrap_or(config.worker.stale_claim_seconds);
            let released = queue
                .requeue_stale(std::time::Duration::from_secs(age), worker.as_deref())
                .await?;
            output::print_success(&format!("{released} stale claim(s) released"));
        }
    }

    Ok(())
}

fn parse_status(raw: &str) -> Result<TaskStatus, AppError> {
    TaskStatus::parse(raw).ok_or_else(|| {
        let known: Vec<&str> = TaskStatus::ALL.iter().map(|s| s.as_str()).collect();
        AppError::validation(format!(
            "Unknown status '{raw}', expected one of: {}",
            known.join(", ")
        ))
    })
}

fn build_args(
    args: &[String],
    kwargs: &[String],
    nodes: &[String],
) -> Result<EncodedArgs, AppError> {
    let mut encoded = EncodedArgs::new();
    for raw in args {
        encoded = encoded.arg(parse_json(raw))?;
    }
    for raw in kwargs {
        let (key, value) = split_pair(raw)?;
        encoded = encoded.kwarg(key, parse_json(value))?;
    }
    for raw in nodes {
        let (key, id) = split_pair(raw)?;
        encoded = encoded.kwarg_entity(key, NodeResolver::reference(super::node_id(id)?));
    }
    Ok(encoded)
}

fn split_pair(raw: &str) -> Result<(&str, &str), AppError> {
    raw.split_once('=')
        .filter(|(key, _)| !key.is_empty())
        .ok_or_else(|| AppError::validation(format!("Expected key=value, got '{raw}'")))
}

/// Bare words are taken as strings.
fn parse_json(raw: &str) -> serde_json::Value {
    serde_json::from_str(raw).unwrap_or_else(|_| serde_json::Value::String(raw.to_string()))
}
