use std::sync::Arc;

use marquee_core::Config;

use crate::{DocumentStore, LocalStorage, Storage, StorageResult};

/// Directory under the upload root that holds the managed tree.
pub const MANAGED_TREE_DIR: &str = "uploads";

/// Create the managed upload tree backend from configuration
pub async fn create_storage(config: &Config) -> StorageResult<Arc<dyn Storage>> {
    let base_path = config.upload_root().join(MANAGED_TREE_DIR);
    let storage = LocalStorage::new(base_path, config.public_upload_prefix().to_string()).await?;

    tracing::info!(
        base_path = %storage.base_path().display(),
        base_url = %config.public_upload_prefix(),
        "Managed upload tree ready"
    );

    Ok(Arc::new(storage))
}

/// Create the document store from configuration
pub async fn create_document_store(config: &Config) -> StorageResult<DocumentStore> {
    let store = DocumentStore::new(config.documents_root()).await?;

    tracing::info!(root = %store.root().display(), "Document store ready");

    Ok(store)
}
