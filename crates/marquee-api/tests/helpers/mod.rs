//! Router fixtures: the full API over in-memory repositories, a temp upload
//! tree and a temp document store.

#![allow(dead_code)]

use std::sync::Arc;

use axum::body::Body;
use axum::http::{header, Method, Request, StatusCode};
use axum::Router;
use marquee_api::auth::StaticTokenGate;
use marquee_api::{api_router, AppState};
use marquee_db::{InMemoryMediaRepository, InMemoryProjectRepository, ProjectRepositoryTrait};
use marquee_services::{IngestLimits, MediaRegistry, ProjectService, UploadIngestor, UploadPolicy};
use marquee_storage::{DocumentStore, LocalStorage, Storage};
use serde_json::Value;
use tempfile::TempDir;
use tower::ServiceExt;

pub const ADMIN_TOKEN: &str = "test-admin-token-0123456789";
pub const MAX_TEST_UPLOAD_BYTES: usize = 4096;
const BOUNDARY: &str = "marquee-test-boundary";

pub struct TestApp {
    pub router: Router,
    pub state: Arc<AppState>,
    pub temp_dir: TempDir,
}

pub struct TestResponse {
    pub status: StatusCode,
    pub body: Value,
}

impl TestApp {
    pub async fn send(&self, request: Request<Body>) -> TestResponse {
        let response = self.router.clone().oneshot(request).await.unwrap();
        let status = response.status();
        let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
            .await
            .unwrap();
        let body = if bytes.is_empty() {
            Value::Null
        } else {
            serde_json::from_slice(&bytes).unwrap_or_else(|_| {
                Value::String(String::from_utf8_lossy(&bytes).into_owned())
            })
        };
        TestResponse { status, body }
    }

    pub async fn get(&self, uri: &str) -> TestResponse {
        self.send(Request::get(uri).body(Body::empty()).unwrap()).await
    }

    pub async fn json(&self, method: Method, uri: &str, body: Value) -> TestResponse {
        self.send(
            authorized(Request::builder().method(method).uri(uri))
                .header(header::CONTENT_TYPE, "application/json")
                .body(Body::from(body.to_string()))
                .unwrap(),
        )
        .await
    }

    pub async fn delete(&self, uri: &str) -> TestResponse {
        self.send(
            authorized(Request::delete(uri))
                .body(Body::empty())
                .unwrap(),
        )
        .await
    }

    pub async fn upload(
        &self,
        file_name: &str,
        content_type: &str,
        data: &[u8],
        fields: &[(&str, &str)],
    ) -> TestResponse {
        self.send(
            authorized(Request::post("/api/v1/media/upload"))
                .header(
                    header::CONTENT_TYPE,
                    format!("multipart/form-data; boundary={}", BOUNDARY),
                )
                .body(Body::from(multipart_body(file_name, content_type, data, fields)))
                .unwrap(),
        )
        .await
    }

    pub fn stored_files(&self, folder: &str) -> usize {
        std::fs::read_dir(self.temp_dir.path().join("uploads").join(folder))
            .unwrap()
            .count()
    }
}

pub fn authorized(builder: axum::http::request::Builder) -> axum::http::request::Builder {
    builder.header(header::AUTHORIZATION, format!("Bearer {}", ADMIN_TOKEN))
}

pub fn multipart_body(
    file_name: &str,
    content_type: &str,
    data: &[u8],
    fields: &[(&str, &str)],
) -> Vec<u8> {
    let mut body = Vec::new();
    for (name, value) in fields {
        body.extend_from_slice(
            format!(
                "--{}\r\nContent-Disposition: form-data; name=\"{}\"\r\n\r\n{}\r\n",
                BOUNDARY, name, value
            )
            .as_bytes(),
        );
    }
    body.extend_from_slice(
        format!(
            "--{}\r\nContent-Disposition: form-data; name=\"file\"; filename=\"{}\"\r\nContent-Type: {}\r\n\r\n",
            BOUNDARY, file_name, content_type
        )
        .as_bytes(),
    );
    body.extend_from_slice(data);
    body.extend_from_slice(format!("\r\n--{}--\r\n", BOUNDARY).as_bytes());
    body
}

fn test_limits() -> IngestLimits {
    IngestLimits {
        image: UploadPolicy {
            max_size_bytes: MAX_TEST_UPLOAD_BYTES,
            allowed_extensions: vec!["jpg".into(), "jpeg".into(), "png".into()],
            allowed_content_types: vec!["image/jpeg".into(), "image/png".into()],
        },
        video: UploadPolicy {
            max_size_bytes: MAX_TEST_UPLOAD_BYTES,
            allowed_extensions: vec!["mp4".into()],
            allowed_content_types: vec!["video/mp4".into()],
        },
    }
}

pub async fn setup() -> TestApp {
    setup_with(Arc::new(InMemoryProjectRepository::new())).await
}

pub async fn setup_with(project_repo: Arc<dyn ProjectRepositoryTrait>) -> TestApp {
    let temp_dir = tempfile::tempdir().expect("Failed to create temp directory");
    let storage: Arc<dyn Storage> = Arc::new(
        LocalStorage::new(temp_dir.path().join("uploads"), "/uploads".to_string())
            .await
            .expect("Failed to create local storage"),
    );
    let documents = DocumentStore::new(temp_dir.path().join("documents"))
        .await
        .expect("Failed to create document store");

    let media_repo = Arc::new(InMemoryMediaRepository::new());

    let state = Arc::new(AppState {
        documents,
        ingestor: Arc::new(UploadIngestor::new(storage.clone(), test_limits())),
        registry: MediaRegistry::new(media_repo.clone(), storage),
        projects: ProjectService::new(project_repo, media_repo),
        auth: Arc::new(StaticTokenGate::new(ADMIN_TOKEN)),
        database: None,
        max_upload_bytes: MAX_TEST_UPLOAD_BYTES * 2,
    });

    TestApp {
        router: api_router(state.clone()),
        state,
        temp_dir,
    }
}
