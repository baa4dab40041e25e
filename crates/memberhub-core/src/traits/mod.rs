//! Core traits defined in `memberhub-core` and implemented by other crates.

pub mod storage;

pub use storage::{BlobMeta, ByteStream, StorageProvider};
