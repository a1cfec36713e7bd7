//! Upload ingestion: validate an incoming file, name it, store it.

use std::path::Path;
use std::sync::Arc;

use chrono::Utc;
use marquee_core::models::MediaKind;
use marquee_core::{AppError, Config};
use marquee_storage::keys::sanitize_key;
use marquee_storage::Storage;
use rand::Rng;
use serde::Serialize;

use crate::optimizer::{ImageOptimizer, NoopOptimizer};

/// Longest sanitized base name kept in a stored name.
const MAX_BASE_NAME_LENGTH: usize = 64;

/// Size and type limits for one media kind.
#[derive(Debug, Clone)]
pub struct UploadPolicy {
    pub max_size_bytes: usize,
    pub allowed_extensions: Vec<String>,
    pub allowed_content_types: Vec<String>,
}

#[derive(Debug, Clone)]
pub struct IngestLimits {
    pub image: UploadPolicy,
    pub video: UploadPolicy,
}

impl IngestLimits {
    pub fn from_config(config: &Config) -> Self {
        Self {
            image: UploadPolicy {
                max_size_bytes: config.max_image_size_bytes(),
                allowed_extensions: config.image_allowed_extensions().to_vec(),
                allowed_content_types: config.image_allowed_content_types().to_vec(),
            },
            video: UploadPolicy {
                max_size_bytes: config.max_video_size_bytes(),
                allowed_extensions: config.video_allowed_extensions().to_vec(),
                allowed_content_types: config.video_allowed_content_types().to_vec(),
            },
        }
    }

    pub fn policy(&self, kind: MediaKind) -> &UploadPolicy {
        match kind {
            MediaKind::Image => &self.image,
            MediaKind::Video => &self.video,
        }
    }
}

/// A file as received from a client.
#[derive(Debug, Clone)]
pub struct IncomingFile {
    pub data: Vec<u8>,
    pub original_name: String,
    pub content_type: String,
}

/// Result of a successful ingest, consumed by the media registry.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct UploadDescriptor {
    pub stored_name: String,
    pub kind: MediaKind,
    /// Root-relative, e.g. `/uploads/images/poster-1712-ab12cd34.jpg`.
    pub url: String,
    #[serde(skip)]
    pub storage_key: String,
    pub content_type: String,
    pub file_size: i64,
    pub original_name: String,
}

pub struct UploadIngestor {
    storage: Arc<dyn Storage>,
    limits: IngestLimits,
    optimizer: Arc<dyn ImageOptimizer>,
}

impl UploadIngestor {
    pub fn new(storage: Arc<dyn Storage>, limits: IngestLimits) -> Self {
        Self {
            storage,
            limits,
            optimizer: Arc::new(NoopOptimizer),
        }
    }

    pub fn with_optimizer(mut self, optimizer: Arc<dyn ImageOptimizer>) -> Self {
        self.optimizer = optimizer;
        self
    }

    /// Validate `file` against the policy for `kind` and write it to the
    /// managed tree under a fresh stored name.
    #[tracing::instrument(skip(self, file), fields(kind = %kind, original_name = %file.original_name, size_bytes = file.data.len()))]
    pub async fn ingest(
        &self,
        file: IncomingFile,
        kind: MediaKind,
    ) -> Result<UploadDescriptor, AppError> {
        let policy = self.limits.policy(kind);

        validate_file_size(file.data.len(), policy.max_size_bytes)?;
        let content_type =
            validate_content_type(&file.content_type, &policy.allowed_content_types)?;
        let extension =
            validate_file_extension(&file.original_name, &policy.allowed_extensions)?;
        validate_extension_content_type_match(&extension, &content_type)?;

        let mut data = file.data;
        if kind == MediaKind::Image {
            match self.optimizer.optimize(&data, &extension).await {
                Ok(Some(smaller)) => {
                    tracing::info!(
                        original_bytes = data.len(),
                        optimized_bytes = smaller.len(),
                        "Image optimized"
                    );
                    data = smaller;
                }
                Ok(None) => {}
                Err(e) => {
                    tracing::warn!(error = %e, "Image optimizer failed, keeping original upload");
                }
            }
        }

        let stored_name = generate_stored_name(&file.original_name, &extension);
        let file_size = data.len() as i64;
        let (storage_key, url) = self.storage.upload(kind, &stored_name, data).await?;

        tracing::info!(
            stored_name = %stored_name,
            storage_key = %storage_key,
            file_size,
            "Upload ingested"
        );

        Ok(UploadDescriptor {
            stored_name,
            kind,
            url,
            storage_key,
            content_type,
            file_size,
            original_name: file.original_name,
        })
    }
}

pub fn validate_file_size(file_size: usize, max_size: usize) -> Result<(), AppError> {
    if file_size == 0 {
        return Err(AppError::InvalidInput("File is empty".to_string()));
    }
    if file_size > max_size {
        return Err(AppError::PayloadTooLarge(format!(
            "File size exceeds maximum allowed size of {} MB",
            max_size / 1024 / 1024
        )));
    }
    Ok(())
}

/// Strip MIME parameters (e.g. "image/jpeg; charset=utf-8" -> "image/jpeg").
fn normalize_mime_type(content_type: &str) -> String {
    content_type
        .split(';')
        .next()
        .unwrap_or(content_type)
        .trim()
        .to_lowercase()
}

/// Returns the normalized content type when allowed.
pub fn validate_content_type(
    content_type: &str,
    allowed_types: &[String],
) -> Result<String, AppError> {
    let normalized = normalize_mime_type(content_type);
    if !allowed_types.iter().any(|ct| normalized == ct.to_lowercase()) {
        return Err(AppError::InvalidInput(format!(
            "Invalid content type. Allowed types: {}",
            allowed_types.join(", ")
        )));
    }
    Ok(normalized)
}

/// Returns the lower-cased extension when allowed.
pub fn validate_file_extension(
    filename: &str,
    allowed_extensions: &[String],
) -> Result<String, AppError> {
    let extension = Path::new(filename)
        .extension()
        .and_then(|e| e.to_str())
        .map(|e| e.to_lowercase())
        .unwrap_or_default();

    if extension.is_empty() {
        return Err(AppError::InvalidInput(
            "File must have an extension".to_string(),
        ));
    }

    if !allowed_extensions.contains(&extension) {
        return Err(AppError::InvalidInput(format!(
            "Invalid file extension. Allowed extensions: {}",
            allowed_extensions.join(", ")
        )));
    }

    Ok(extension)
}

/// Reject an extension whose well-known content types do not include `content_type`.
/// Extensions without a known mapping pass; the allow-lists still apply.
pub fn validate_extension_content_type_match(
    extension: &str,
    content_type: &str,
) -> Result<(), AppError> {
    let expected: &[&str] = match extension {
        "jpg" | "jpeg" => &["image/jpeg"],
        "png" => &["image/png"],
        "gif" => &["image/gif"],
        "webp" => &["image/webp"],
        "avif" => &["image/avif"],
        "mp4" => &["video/mp4"],
        "webm" => &["video/webm"],
        "mov" => &["video/quicktime"],
        "m4v" => &["video/x-m4v", "video/mp4"],
        _ => {
            tracing::debug!(
                extension = %extension,
                content_type = %content_type,
                "Unknown extension, skipping Content-Type/extension cross-validation"
            );
            return Ok(());
        }
    };

    if !expected.contains(&content_type) {
        return Err(AppError::InvalidInput(format!(
            "Content-Type '{}' does not match file extension '.{}'",
            content_type, extension
        )));
    }
    Ok(())
}

/// `{sanitized base}-{unix nanos}-{8 hex}.{ext}`
pub fn generate_stored_name(original_name: &str, extension: &str) -> String {
    let stem = Path::new(original_name)
        .file_stem()
        .and_then(|s| s.to_str())
        .unwrap_or_default();
    let mut base: String = sanitize_key(stem)
        .chars()
        .take(MAX_BASE_NAME_LENGTH)
        .collect();
    if base.is_empty() {
        base = "file".to_string();
    }

    let nanos = Utc::now().timestamp_nanos_opt().unwrap_or_default();
    let suffix: u32 = rand::rng().random();

    format!("{}-{}-{:08x}.{}", base, nanos, suffix, extension)
}
