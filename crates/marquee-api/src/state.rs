use std::sync::Arc;

use marquee_services::{MediaRegistry, ProjectService, UploadIngestor};
use marquee_storage::DocumentStore;
use sqlx::PgPool;

use crate::auth::AuthGate;

/// Shared handler state. Every store handle is injected here so tests can
/// assemble the router over in-memory repositories.
#[derive(Clone)]
pub struct AppState {
    pub documents: DocumentStore,
    pub ingestor: Arc<UploadIngestor>,
    pub registry: MediaRegistry,
    pub projects: ProjectService,
    pub auth: Arc<dyn AuthGate>,
    /// Absent when the repositories are not Postgres-backed.
    pub database: Option<PgPool>,
    /// Largest accepted request body for uploads, framing included.
    pub max_upload_bytes: usize,
}
