//! Repositories, storage and services behind the HTTP handlers.

use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result};
use marquee_core::Config;
use marquee_db::{MediaRepository, MediaRepositoryTrait, ProjectRepository, ProjectRepositoryTrait};
use marquee_services::{
    CleanupService, CommandOptimizer, IngestLimits, MediaRegistry, ProjectService, UploadIngestor,
};
use marquee_storage::{create_document_store, create_storage};
use sqlx::PgPool;

use crate::auth::StaticTokenGate;
use crate::constants::MULTIPART_OVERHEAD_BYTES;
use crate::state::AppState;

use super::BackgroundTasks;

pub async fn initialize_services(
    config: &Config,
    pool: PgPool,
) -> Result<(Arc<AppState>, BackgroundTasks)> {
    let storage = create_storage(config)
        .await
        .context("Failed to initialize managed upload tree")?;
    let documents = create_document_store(config)
        .await
        .context("Failed to initialize document store")?;

    let media_repo: Arc<dyn MediaRepositoryTrait> = Arc::new(MediaRepository::new(pool.clone()));
    let project_repo: Arc<dyn ProjectRepositoryTrait> =
        Arc::new(ProjectRepository::new(pool.clone()));

    let mut ingestor = UploadIngestor::new(storage.clone(), IngestLimits::from_config(config));
    match config.image_optimizer_path() {
        Some(path) => {
            tracing::info!(optimizer = %path, "Image optimization enabled");
            ingestor = ingestor.with_optimizer(Arc::new(CommandOptimizer::new(path)));
        }
        None => tracing::info!("Image optimization disabled"),
    }

    let registry = MediaRegistry::new(media_repo.clone(), storage.clone());
    let projects = ProjectService::new(project_repo, media_repo.clone());

    let mut background = BackgroundTasks::default();
    if config.cleanup_interval_secs() > 0 {
        let cleanup = Arc::new(CleanupService::new(
            media_repo,
            storage,
            projects.clone(),
            Duration::from_secs(config.orphan_grace_period_secs()),
            Duration::from_secs(config.cleanup_interval_secs()),
        ));
        background.cleanup = Some(cleanup.start());
        tracing::info!(
            interval_secs = config.cleanup_interval_secs(),
            grace_period_secs = config.orphan_grace_period_secs(),
            "Upload tree cleanup task started"
        );
    } else {
        tracing::info!("Upload tree cleanup disabled");
    }

    let max_upload_bytes = config
        .max_image_size_bytes()
        .max(config.max_video_size_bytes())
        + MULTIPART_OVERHEAD_BYTES;

    let state = Arc::new(AppState {
        documents,
        ingestor: Arc::new(ingestor),
        registry,
        projects,
        auth: Arc::new(StaticTokenGate::new(config.admin_api_token())),
        database: Some(pool),
        max_upload_bytes,
    });

    Ok((state, background))
}
