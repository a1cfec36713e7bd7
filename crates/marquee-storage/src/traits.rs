//! Storage abstraction trait
//!
//! The managed upload tree is reached only through `Storage`, so services and
//! tests can swap the backend.

use std::time::SystemTime;

use async_trait::async_trait;
use marquee_core::models::MediaKind;
use marquee_core::AppError;
use thiserror::Error;

/// Storage operation errors
#[derive(Debug, Error)]
pub enum StorageError {
    #[error("Upload failed: {0}")]
    UploadFailed(String),

    #[error("Delete failed: {0}")]
    DeleteFailed(String),

    #[error("File not found: {0}")]
    NotFound(String),

    #[error("Invalid storage key: {0}")]
    InvalidKey(String),

    #[error("Serialization error: {0}")]
    Serialization(String),

    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),

    #[error("Configuration error: {0}")]
    ConfigError(String),
}

/// Result type for storage operations
pub type StorageResult<T> = Result<T, StorageError>;

impl From<StorageError> for AppError {
    fn from(err: StorageError) -> Self {
        match err {
            StorageError::InvalidKey(msg) => AppError::InvalidInput(msg),
            StorageError::NotFound(key) => AppError::NotFound(format!("File not found: {}", key)),
            other => AppError::Storage(other.to_string()),
        }
    }
}

/// A file found in one kind folder of the upload tree.
#[derive(Debug, Clone)]
pub struct StoredObject {
    pub key: String,
    pub stored_name: String,
    pub size_bytes: u64,
    pub modified: SystemTime,
}

/// Storage abstraction trait
///
/// **Key format:** `{kind folder}/{stored name}`, e.g. `images/poster-1712-ab12cd34.jpg`.
/// See [`crate::keys::storage_key`].
#[async_trait]
pub trait Storage: Send + Sync {
    /// Store a new file and return (storage_key, public_url).
    ///
    /// The public URL is root-relative, e.g. `/uploads/images/poster.jpg`.
    async fn upload(
        &self,
        kind: MediaKind,
        stored_name: &str,
        data: Vec<u8>,
    ) -> StorageResult<(String, String)>;

    /// Delete a file by its storage key. Deleting a missing file succeeds.
    async fn delete(&self, storage_key: &str) -> StorageResult<()>;

    /// List the files in one kind folder.
    async fn list(&self, kind: MediaKind) -> StorageResult<Vec<StoredObject>>;
}
