//! Key-value document store for site copy and configuration blobs.
//!
//! Layout: `{root}/json/{key}.json` and `{root}/text/{key}.txt`. Every write
//! goes to a temp file in the target directory, is synced, and is renamed over
//! the target. The rename is the commit point, so readers see either the old
//! value or the new one, never a partial file.

use std::path::{Path, PathBuf};

use marquee_core::models::DocumentNamespace;
use serde::de::DeserializeOwned;
use serde::Serialize;
use serde_json::Value;
use tokio::fs;
use tokio::io::AsyncWriteExt;
use uuid::Uuid;

use crate::keys::sanitize_key;
use crate::traits::{StorageError, StorageResult};

const TEMP_SUFFIX: &str = ".tmp";

#[derive(Debug, Clone)]
pub struct DocumentStore {
    root: PathBuf,
}

impl DocumentStore {
    pub async fn new(root: impl Into<PathBuf>) -> StorageResult<Self> {
        let root = root.into();
        for namespace in [DocumentNamespace::Json, DocumentNamespace::Text] {
            let dir = root.join(namespace.dir());
            fs::create_dir_all(&dir).await.map_err(|e| {
                StorageError::ConfigError(format!(
                    "Failed to create document directory {}: {}",
                    dir.display(),
                    e
                ))
            })?;
        }
        Ok(Self { root })
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Target path for a key. Fails if the key sanitizes to nothing.
    pub fn path_for(&self, namespace: DocumentNamespace, key: &str) -> StorageResult<PathBuf> {
        let sanitized = sanitize_key(key);
        if sanitized.is_empty() {
            return Err(StorageError::InvalidKey(format!(
                "Document key '{}' has no usable characters",
                key
            )));
        }
        Ok(self
            .root
            .join(namespace.dir())
            .join(format!("{}.{}", sanitized, namespace.extension())))
    }

    /// Raw bytes of a document, `None` when it was never written.
    pub async fn read_raw(
        &self,
        namespace: DocumentNamespace,
        key: &str,
    ) -> StorageResult<Option<Vec<u8>>> {
        let path = self.path_for(namespace, key)?;
        match fs::read(&path).await {
            Ok(bytes) => Ok(Some(bytes)),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(None),
            Err(e) => Err(e.into()),
        }
    }

    /// Read and parse a JSON document. Malformed content is an error here.
    pub async fn read_json(&self, key: &str) -> StorageResult<Option<Value>> {
        match self.read_raw(DocumentNamespace::Json, key).await? {
            Some(bytes) => serde_json::from_slice(&bytes)
                .map(Some)
                .map_err(|e| StorageError::Serialization(format!("{}: {}", key, e))),
            None => Ok(None),
        }
    }

    /// Read a text document. Invalid UTF-8 is an error here.
    pub async fn read_text(&self, key: &str) -> StorageResult<Option<String>> {
        match self.read_raw(DocumentNamespace::Text, key).await? {
            Some(bytes) => String::from_utf8(bytes)
                .map(Some)
                .map_err(|e| StorageError::Serialization(format!("{}: {}", key, e))),
            None => Ok(None),
        }
    }

    /// Read a JSON document, falling back on absence, corruption or any read error.
    pub async fn get_json<T: DeserializeOwned>(&self, key: &str, fallback: T) -> T {
        let bytes = match self.read_raw(DocumentNamespace::Json, key).await {
            Ok(Some(bytes)) => bytes,
            Ok(None) => return fallback,
            Err(e) => {
                tracing::warn!(key = %key, error = %e, "Document read failed, using fallback");
                return fallback;
            }
        };

        match serde_json::from_slice(&bytes) {
            Ok(value) => value,
            Err(e) => {
                tracing::warn!(key = %key, error = %e, "Corrupt JSON document, using fallback");
                fallback
            }
        }
    }

    /// Read a text document, falling back on absence, bad encoding or any read error.
    pub async fn get_text(&self, key: &str, fallback: &str) -> String {
        match self.read_text(key).await {
            Ok(Some(text)) => text,
            Ok(None) => fallback.to_string(),
            Err(e) => {
                tracing::warn!(key = %key, error = %e, "Text document unreadable, using fallback");
                fallback.to_string()
            }
        }
    }

    pub async fn put_json<T: Serialize + ?Sized>(&self, key: &str, value: &T) -> StorageResult<()> {
        let bytes = serde_json::to_vec_pretty(value)
            .map_err(|e| StorageError::Serialization(e.to_string()))?;
        self.stage(DocumentNamespace::Json, key, &bytes)
            .await?
            .commit()
            .await
    }

    pub async fn put_text(&self, key: &str, text: &str) -> StorageResult<()> {
        self.stage(DocumentNamespace::Text, key, text.as_bytes())
            .await?
            .commit()
            .await
    }

    /// Write `bytes` to a synced temp file next to the target without publishing it.
    pub async fn stage(
        &self,
        namespace: DocumentNamespace,
        key: &str,
        bytes: &[u8],
    ) -> StorageResult<StagedWrite> {
        let target = self.path_for(namespace, key)?;
        let dir = self.root.join(namespace.dir());
        // Leading dot keeps temp files out of list_keys.
        let temp = dir.join(format!(
            ".{}.{}{}",
            sanitize_key(key),
            Uuid::new_v4(),
            TEMP_SUFFIX
        ));

        // Dropped on any early return below, which removes the partial temp file.
        let staged = StagedWrite {
            temp,
            target,
            committed: false,
        };

        let mut file = fs::File::create(&staged.temp).await?;
        file.write_all(bytes).await?;
        file.sync_all().await?;
        drop(file);

        tracing::debug!(
            key = %key,
            namespace = %namespace,
            size_bytes = bytes.len(),
            "Staged document write"
        );

        Ok(staged)
    }

    /// Keys in a namespace, extension stripped. Order is unspecified.
    pub async fn list_keys(&self, namespace: DocumentNamespace) -> StorageResult<Vec<String>> {
        let dir = self.root.join(namespace.dir());
        let mut entries = match fs::read_dir(&dir).await {
            Ok(entries) => entries,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(Vec::new()),
            Err(e) => return Err(e.into()),
        };

        let suffix = format!(".{}", namespace.extension());
        let mut keys = Vec::new();
        while let Some(entry) = entries.next_entry().await? {
            let name = entry.file_name();
            let Some(name) = name.to_str() else { continue };
            if name.starts_with('.') {
                continue;
            }
            if let Some(key) = name.strip_suffix(&suffix) {
                if !key.is_empty() {
                    keys.push(key.to_string());
                }
            }
        }
        Ok(keys)
    }
}

/// A fully written temp file waiting to replace its target.
///
/// Dropping it without calling [`StagedWrite::commit`] removes the temp file
/// and leaves the target untouched.
#[derive(Debug)]
pub struct StagedWrite {
    temp: PathBuf,
    target: PathBuf,
    committed: bool,
}

impl StagedWrite {
    pub fn temp_path(&self) -> &Path {
        &self.temp
    }

    pub fn target_path(&self) -> &Path {
        &self.target
    }

    /// Atomically publish the staged content.
    pub async fn commit(mut self) -> StorageResult<()> {
        if let Err(e) = fs::rename(&self.temp, &self.target).await {
            tracing::warn!(
                from = %self.temp.display(),
                to = %self.target.display(),
                error = %e,
                "Document rename failed"
            );
            return Err(e.into());
        }
        self.committed = true;
        Ok(())
    }
}

impl Drop for StagedWrite {
    fn drop(&mut self) {
        if !self.committed {
            let _ = std::fs::remove_file(&self.temp);
        }
    }
}
