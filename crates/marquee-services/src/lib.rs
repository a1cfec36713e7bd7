//! Marquee Services Layer
//!
//! Orchestration over the storage and database crates: upload ingestion, the
//! media registry, projects with media references, and upload tree cleanup.
//! HTTP handling stays in marquee-api.

pub mod cleanup;
pub mod ingest;
pub mod optimizer;
pub mod projects;
pub mod registry;

pub use cleanup::{CleanupService, ReconcileReport};
pub use ingest::{IncomingFile, IngestLimits, UploadDescriptor, UploadIngestor, UploadPolicy};
pub use optimizer::{CommandOptimizer, ImageOptimizer, NoopOptimizer};
pub use projects::{ProjectService, ResolvedChanges};
pub use registry::{DeletedMedia, MediaRegistry};
