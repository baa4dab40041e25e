//! Document hierarchy management.

pub mod maintenance;
pub mod service;
pub mod tree;
pub mod upload;

pub use service::{DeleteSummary, DocumentService, RestoreDestination};
pub use upload::{FailedUpload, UploadItem, UploadSummary};

#[cfg(test)]
mod tests;
