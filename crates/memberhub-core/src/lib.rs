//! # memberhub-core
//!
//! Shared building blocks: configuration, [`AppError`], typed ids, the
//! tenant context and the [`traits::StorageProvider`] seam for blobs.

pub mod config;
pub mod error;
pub mod result;
pub mod traits;
pub mod types;

pub use error::AppError;
pub use result::AppResult;
