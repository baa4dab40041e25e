//! # memberhub-storage
//!
//! Blob storage for the content of file nodes. The local filesystem provider
//! is the only backend; the service layer talks to it through the
//! [`StorageProvider`](memberhub_core::traits::StorageProvider) trait.

pub mod providers;

use std::sync::Arc;

use memberhub_core::config::StorageConfig;
use memberhub_core::result::AppResult;
use memberhub_core::traits::StorageProvider;

pub use providers::local::LocalStorageProvider;

/// Build the configured blob store.
pub async fn from_config(config: &StorageConfig) -> AppResult<Arc<dyn StorageProvider>> {
    Ok(Arc::new(LocalStorageProvider::new(&config.root_path).await?))
}
