//! # memberhub-database
//!
//! PostgreSQL connection management, public and per-tenant migrations, the
//! tenant `search_path` scope, and the store traits with their PostgreSQL
//! and in-memory implementations.

pub mod connection;
pub mod migration;
pub mod repositories;
pub mod store;
pub mod tenant_scope;

pub use connection::DatabasePool;
pub use store::{MoveCheck, NodeStore, Stores, TaskStore, TenantStore, ThemeVersionStore};
pub use tenant_scope::TenantScope;
