//! Tenant-aware background task processing for MemberHub.
//!
//! This crate provides:
//! - A task registry mapping names to handlers, built once at startup
//! - A task queue that validates, encodes and persists tasks and wakes workers
//! - An executor that restores tenant context and arguments, runs the
//!   handler with its log output captured, and records the outcome
//! - A worker runner that claims batches and waits on notifications with a
//!   capped backoff
//! - Built-in tasks for theme builds and blob housekeeping

pub mod backoff;
pub mod bootstrap;
pub mod capture;
pub mod context;
pub mod executor;
pub mod queue;
pub mod registry;
pub mod resolver;
pub mod runner;
pub mod tasks;
pub mod wakeup;

pub use backoff::Backoff;
pub use bootstrap::WorkerServices;
pub use context::{ArgumentError, ResolvedArg, TaskContext};
pub use executor::TaskExecutor;
pub use queue::TaskQueue;
pub use registry::{TaskHandler, TaskRegistry};
pub use resolver::{EntityResolver, NodeResolver, ResolverSet};
pub use runner::WorkerRunner;
pub use wakeup::{MemoryWakeup, PgWakeup, TaskWakeup};
