//! Core type definitions used across the MemberHub workspace.

pub mod id;
pub mod sorting;
pub mod tenant;

pub use id::*;
pub use sorting::{SortDirection, SortField};
pub use tenant::{SchemaName, TenantContext};
