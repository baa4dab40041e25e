//! # memberhub-service
//!
//! Business logic for MemberHub. Services receive their stores through
//! constructor injection as `Arc<dyn ...>` trait objects, so the same code
//! runs against PostgreSQL in production and against the in-memory stores
//! in tests. Every operation takes the [`TenantContext`] it runs for.
//!
//! [`TenantContext`]: memberhub_core::types::TenantContext

pub mod document;
pub mod tenant;

pub use document::{
    DeleteSummary, DocumentService, FailedUpload, RestoreDestination, UploadItem, UploadSummary,
};
pub use tenant::TenantService;
