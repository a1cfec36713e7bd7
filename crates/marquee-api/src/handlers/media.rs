//! Media registry handlers: multipart uploads, external video links, listing
//! and deletion.

use std::sync::Arc;

use axum::{
    extract::{
        multipart::{MultipartError, MultipartRejection},
        Multipart, Path, Query, State,
    },
    http::StatusCode,
    response::IntoResponse,
    Json,
};
use marquee_core::models::{MediaAsset, MediaFilter, MediaKind, MediaReference, PageRequest};
use marquee_core::AppError;
use marquee_services::IncomingFile;
use serde::{Deserialize, Serialize};
use validator::Validate;

use crate::error::{HttpAppError, ValidatedJson};
use crate::response::ApiResponse;
use crate::state::AppState;

#[derive(Debug, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct CreateLinkRequest {
    #[validate(length(min = 1, max = 2048))]
    pub url: String,
    #[serde(default, alias = "title")]
    #[validate(length(max = 255))]
    pub display_name: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MediaListQuery {
    pub page: Option<u32>,
    pub limit: Option<u32>,
    pub kind: Option<String>,
    pub search: Option<String>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DeleteMediaResponse {
    pub asset: MediaAsset,
    pub file_removed: bool,
    /// Projects that still point at the removed asset.
    pub dangling_references: Vec<MediaReference>,
}

/// Fields of an upload form. `file` is required, the rest optional.
struct UploadForm {
    file: IncomingFile,
    category: Option<String>,
    display_name: Option<String>,
}

fn multipart_error(context: &str, e: MultipartError) -> AppError {
    if e.status() == StatusCode::PAYLOAD_TOO_LARGE {
        AppError::PayloadTooLarge(format!("{}: {}", context, e.body_text()))
    } else {
        AppError::InvalidInput(format!("{}: {}", context, e.body_text()))
    }
}

async fn read_text_field(field: axum::extract::multipart::Field<'_>) -> Result<String, AppError> {
    field
        .text()
        .await
        .map_err(|e| multipart_error("Failed to read form field", e))
}

/// Collect the upload form. Only one `file` field is accepted.
async fn read_upload_form(mut multipart: Multipart) -> Result<UploadForm, AppError> {
    let mut file: Option<IncomingFile> = None;
    let mut category = None;
    let mut display_name = None;

    while let Some(field) = multipart
        .next_field()
        .await
        .map_err(|e| multipart_error("Failed to read multipart", e))?
    {
        let field_name = field.name().map(|s| s.to_string()).unwrap_or_default();

        match field_name.as_str() {
            "file" => {
                if file.is_some() {
                    return Err(AppError::InvalidInput(
                        "Multiple file fields are not allowed; send exactly one field named 'file'"
                            .to_string(),
                    ));
                }
                let original_name = field.file_name().unwrap_or("unknown").to_string();
                let content_type = field
                    .content_type()
                    .unwrap_or("application/octet-stream")
                    .to_string();
                let data = field
                    .bytes()
                    .await
                    .map_err(|e| multipart_error("Failed to read file data", e))?;

                file = Some(IncomingFile {
                    data: data.to_vec(),
                    original_name,
                    content_type,
                });
            }
            "category" => category = Some(read_text_field(field).await?),
            "displayName" => display_name = Some(read_text_field(field).await?),
            other => {
                tracing::debug!(field = %other, "Ignoring unknown upload form field");
            }
        }
    }

    let file = file.ok_or_else(|| AppError::InvalidInput("No file provided".to_string()))?;

    Ok(UploadForm {
        file,
        category,
        display_name,
    })
}

/// Category from the form, or the kind implied by the declared content type.
fn resolve_kind(form: &UploadForm) -> Result<MediaKind, AppError> {
    match form.category.as_deref().map(str::trim) {
        Some(category) if !category.is_empty() => category.parse(),
        _ => {
            let content_type = form.file.content_type.to_lowercase();
            if content_type.starts_with("image/") {
                Ok(MediaKind::Image)
            } else if content_type.starts_with("video/") {
                Ok(MediaKind::Video)
            } else {
                Err(AppError::InvalidInput(
                    "Cannot infer media category; send 'category' as image or video".to_string(),
                ))
            }
        }
    }
}

#[tracing::instrument(skip(state, multipart), fields(operation = "upload_media"))]
pub async fn upload_media(
    State(state): State<Arc<AppState>>,
    multipart: Result<Multipart, MultipartRejection>,
) -> Result<impl IntoResponse, HttpAppError> {
    let multipart = multipart.map_err(|rejection| {
        AppError::InvalidInput(format!("Expected multipart/form-data: {}", rejection.body_text()))
    })?;

    let form = read_upload_form(multipart).await?;
    let kind = resolve_kind(&form)?;

    let descriptor = state.ingestor.ingest(form.file, kind).await?;
    let asset = state
        .registry
        .create_from_upload(descriptor, form.display_name.as_deref())
        .await?;

    tracing::info!(
        media_id = asset.id,
        kind = %asset.kind,
        file_size = ?asset.file_size,
        "Media uploaded"
    );

    Ok((StatusCode::CREATED, Json(ApiResponse::ok(asset))))
}

#[tracing::instrument(skip(state), fields(operation = "create_media_link"))]
pub async fn create_media_link(
    State(state): State<Arc<AppState>>,
    ValidatedJson(request): ValidatedJson<CreateLinkRequest>,
) -> Result<impl IntoResponse, HttpAppError> {
    request.validate()?;

    let asset = state
        .registry
        .create_from_external_link(&request.url, request.display_name.as_deref())
        .await?;

    tracing::info!(media_id = asset.id, url = %asset.locator.url(), "External video registered");

    Ok((StatusCode::CREATED, Json(ApiResponse::ok(asset))))
}

#[tracing::instrument(skip(state), fields(operation = "list_media"))]
pub async fn list_media(
    State(state): State<Arc<AppState>>,
    Query(query): Query<MediaListQuery>,
) -> Result<impl IntoResponse, HttpAppError> {
    let kind = query
        .kind
        .as_deref()
        .filter(|k| !k.trim().is_empty())
        .map(str::parse::<MediaKind>)
        .transpose()?;
    let filter = MediaFilter {
        kind,
        search: query.search,
    };

    let page = state
        .registry
        .list(&filter, PageRequest::new(query.page, query.limit))
        .await?;

    Ok(Json(ApiResponse::ok(page)))
}

#[tracing::instrument(skip(state), fields(operation = "get_media", media_id = %id))]
pub async fn get_media(
    State(state): State<Arc<AppState>>,
    Path(id): Path<i64>,
) -> Result<impl IntoResponse, HttpAppError> {
    let asset = state.registry.get_by_id(id).await?;
    Ok(Json(ApiResponse::ok(asset)))
}

#[tracing::instrument(skip(state), fields(operation = "delete_media", media_id = %id))]
pub async fn delete_media(
    State(state): State<Arc<AppState>>,
    Path(id): Path<i64>,
) -> Result<impl IntoResponse, HttpAppError> {
    let deleted = state.registry.delete(id).await?;
    // The row is already deleted, so a failed scan only costs the report
    let dangling_references = match state.projects.references_to(id).await {
        Ok(references) => references,
        Err(e) => {
            tracing::error!(
                media_id = id,
                error = %e.detailed_message(),
                "Reference scan failed after media delete"
            );
            Vec::new()
        }
    };

    if !dangling_references.is_empty() {
        tracing::warn!(
            media_id = id,
            references = dangling_references.len(),
            "Deleted media asset is still referenced by projects"
        );
    }

    Ok(Json(ApiResponse::ok(DeleteMediaResponse {
        asset: deleted.asset,
        file_removed: deleted.file_removed,
        dangling_references,
    })))
}

#[tracing::instrument(skip(state), fields(operation = "media_references", media_id = %id))]
pub async fn media_references(
    State(state): State<Arc<AppState>>,
    Path(id): Path<i64>,
) -> Result<impl IntoResponse, HttpAppError> {
    let references = state.projects.references_to(id).await?;
    Ok(Json(ApiResponse::ok(references)))
}
