//! Shared setup for service integration tests: in-memory repositories and a
//! managed upload tree inside a temp directory.

#![allow(dead_code)]

use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use marquee_core::models::{MediaAsset, MediaKind, ProjectInput};
use marquee_db::{InMemoryMediaRepository, InMemoryProjectRepository};
use marquee_services::{
    CleanupService, IncomingFile, IngestLimits, MediaRegistry, ProjectService, UploadIngestor,
    UploadPolicy,
};
use marquee_storage::{LocalStorage, Storage};
use tempfile::TempDir;

pub const MAX_TEST_UPLOAD_BYTES: usize = 1024;

pub struct TestContext {
    pub media_repo: Arc<InMemoryMediaRepository>,
    pub project_repo: Arc<InMemoryProjectRepository>,
    pub storage: Arc<dyn Storage>,
    pub ingestor: UploadIngestor,
    pub registry: MediaRegistry,
    pub projects: ProjectService,
    pub upload_tree: PathBuf,
    pub _temp_dir: TempDir,
}

impl TestContext {
    pub fn cleanup(&self, grace_period: Duration) -> CleanupService {
        CleanupService::new(
            self.media_repo.clone(),
            self.storage.clone(),
            self.projects.clone(),
            grace_period,
            Duration::from_secs(3600),
        )
    }

    /// Ingest and register an upload in one step.
    pub async fn upload(&self, file: IncomingFile, kind: MediaKind) -> MediaAsset {
        let descriptor = self.ingestor.ingest(file, kind).await.unwrap();
        self.registry
            .create_from_upload(descriptor, None)
            .await
            .unwrap()
    }

    pub async fn link(&self, video_id: &str) -> MediaAsset {
        self.registry
            .create_from_external_link(&format!("https://youtu.be/{}", video_id), None)
            .await
            .unwrap()
    }

    pub fn stored_files(&self, kind: MediaKind) -> Vec<String> {
        let mut names: Vec<String> = std::fs::read_dir(self.upload_tree.join(kind.folder()))
            .unwrap()
            .map(|e| e.unwrap().file_name().to_string_lossy().into_owned())
            .collect();
        names.sort();
        names
    }
}

pub fn test_limits() -> IngestLimits {
    IngestLimits {
        image: UploadPolicy {
            max_size_bytes: MAX_TEST_UPLOAD_BYTES,
            allowed_extensions: vec!["jpg".into(), "jpeg".into(), "png".into()],
            allowed_content_types: vec!["image/jpeg".into(), "image/png".into()],
        },
        video: UploadPolicy {
            max_size_bytes: MAX_TEST_UPLOAD_BYTES,
            allowed_extensions: vec!["mp4".into(), "mov".into()],
            allowed_content_types: vec!["video/mp4".into(), "video/quicktime".into()],
        },
    }
}

pub async fn setup() -> TestContext {
    setup_with(InMemoryProjectRepository::new()).await
}

pub async fn setup_with(project_repo: InMemoryProjectRepository) -> TestContext {
    let temp_dir = tempfile::tempdir().expect("Failed to create temp directory");
    let upload_tree = temp_dir.path().join("uploads");
    let storage: Arc<dyn Storage> = Arc::new(
        LocalStorage::new(upload_tree.clone(), "/uploads".to_string())
            .await
            .expect("Failed to create local storage"),
    );

    let media_repo = Arc::new(InMemoryMediaRepository::new());
    let project_repo = Arc::new(project_repo);

    TestContext {
        ingestor: UploadIngestor::new(storage.clone(), test_limits()),
        registry: MediaRegistry::new(media_repo.clone(), storage.clone()),
        projects: ProjectService::new(project_repo.clone(), media_repo.clone()),
        media_repo,
        project_repo,
        storage,
        upload_tree,
        _temp_dir: temp_dir,
    }
}

pub fn png(name: &str) -> IncomingFile {
    IncomingFile {
        data: b"\x89PNG fake image bytes".to_vec(),
        original_name: name.to_string(),
        content_type: "image/png".to_string(),
    }
}

pub fn mp4(name: &str) -> IncomingFile {
    IncomingFile {
        data: b"fake mp4 bytes".to_vec(),
        original_name: name.to_string(),
        content_type: "video/mp4".to_string(),
    }
}

pub fn input(json: serde_json::Value) -> ProjectInput {
    serde_json::from_value(json).expect("valid project input")
}
