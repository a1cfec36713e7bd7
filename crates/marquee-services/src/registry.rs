//! Media registry: the catalog of uploaded files and external video links.

use std::sync::Arc;

use marquee_core::models::{
    MediaAsset, MediaFilter, MediaKind, MediaLocator, NewMediaAsset, PageRequest, PaginatedList,
};
use marquee_core::{AppError, VideoLink};
use marquee_db::MediaRepositoryTrait;
use marquee_storage::keys::storage_key;
use marquee_storage::Storage;
use serde::Serialize;

use crate::ingest::UploadDescriptor;

/// Outcome of deleting an asset.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DeletedMedia {
    pub asset: MediaAsset,
    /// False when the asset was managed and its file could not be removed.
    pub file_removed: bool,
}

#[derive(Clone)]
pub struct MediaRegistry {
    repository: Arc<dyn MediaRepositoryTrait>,
    storage: Arc<dyn Storage>,
}

fn display_name_or(display_name: Option<&str>, fallback: impl FnOnce() -> String) -> String {
    match display_name.map(str::trim).filter(|s| !s.is_empty()) {
        Some(name) => name.to_string(),
        None => fallback(),
    }
}

impl MediaRegistry {
    pub fn new(repository: Arc<dyn MediaRepositoryTrait>, storage: Arc<dyn Storage>) -> Self {
        Self {
            repository,
            storage,
        }
    }

    /// Register a freshly ingested upload. If the row cannot be written the
    /// stored file is removed again.
    #[tracing::instrument(skip(self, descriptor, display_name), fields(stored_name = %descriptor.stored_name, kind = %descriptor.kind))]
    pub async fn create_from_upload(
        &self,
        descriptor: UploadDescriptor,
        display_name: Option<&str>,
    ) -> Result<MediaAsset, AppError> {
        let display_name = display_name_or(display_name, || descriptor.original_name.clone());

        let new_asset = NewMediaAsset {
            display_name,
            kind: descriptor.kind,
            locator: MediaLocator::Managed {
                stored_name: descriptor.stored_name.clone(),
                url: descriptor.url.clone(),
            },
            content_type: Some(descriptor.content_type.clone()),
            file_size: Some(descriptor.file_size),
        };

        match self.repository.insert(new_asset).await {
            Ok(asset) => {
                tracing::info!(media_id = asset.id, "Media asset registered");
                Ok(asset)
            }
            Err(e) => {
                if let Err(cleanup) = self.storage.delete(&descriptor.storage_key).await {
                    tracing::warn!(
                        error = %cleanup,
                        storage_key = %descriptor.storage_key,
                        "Failed to remove upload after registry insert failed"
                    );
                }
                Err(e)
            }
        }
    }

    /// Register an external video. `title` falls back to a name derived from the video id.
    #[tracing::instrument(skip(self, title))]
    pub async fn create_from_external_link(
        &self,
        url: &str,
        title: Option<&str>,
    ) -> Result<MediaAsset, AppError> {
        let link = VideoLink::parse(url)?;
        let display_name = display_name_or(title, || format!("YouTube video {}", link.video_id));

        let asset = self
            .repository
            .insert(NewMediaAsset {
                display_name,
                kind: MediaKind::Video,
                locator: MediaLocator::External {
                    url: link.canonical_url(),
                },
                content_type: None,
                file_size: None,
            })
            .await?;

        tracing::info!(media_id = asset.id, video_id = %link.video_id, "External video registered");
        Ok(asset)
    }

    pub async fn list(
        &self,
        filter: &MediaFilter,
        page: PageRequest,
    ) -> Result<PaginatedList<MediaAsset>, AppError> {
        let (items, total) = self.repository.list(filter, page).await?;
        Ok(PaginatedList::new(items, page, total))
    }

    pub async fn get_by_id(&self, id: i64) -> Result<MediaAsset, AppError> {
        self.repository
            .get(id)
            .await?
            .ok_or_else(|| AppError::NotFound(format!("Media asset {} not found", id)))
    }

    /// Remove an asset. The backing file of a managed asset is removed first,
    /// best-effort; the row is removed regardless. Projects that still point
    /// at the asset are left as they are.
    #[tracing::instrument(skip(self), fields(media_id = %id))]
    pub async fn delete(&self, id: i64) -> Result<DeletedMedia, AppError> {
        let asset = self.get_by_id(id).await?;

        let mut file_removed = true;
        if let Some(stored_name) = asset.locator.stored_name() {
            let key = storage_key(asset.kind, stored_name);
            if let Err(e) = self.storage.delete(&key).await {
                file_removed = false;
                tracing::warn!(
                    error = %e,
                    storage_key = %key,
                    "Failed to remove media file, deleting registry row anyway"
                );
            }
        }

        if !self.repository.delete(id).await? {
            tracing::debug!("Media row already gone");
        }

        tracing::info!(file_removed, "Media asset deleted");
        Ok(DeletedMedia {
            asset,
            file_removed,
        })
    }
}
