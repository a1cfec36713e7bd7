//! Document store handlers: site copy as JSON or plain text, keyed by name.

use std::sync::Arc;

use axum::{
    extract::{Path, State},
    response::IntoResponse,
    Json,
};
use marquee_core::models::DocumentNamespace;
use serde::Serialize;
use serde_json::Value;

use crate::error::{HttpAppError, ValidatedJson};
use crate::response::ApiResponse;
use crate::state::AppState;

#[derive(Debug, Serialize)]
pub struct DocumentEntry<T> {
    pub key: String,
    pub value: T,
}

#[derive(Debug, Serialize)]
pub struct DocumentKeys {
    pub namespace: DocumentNamespace,
    pub keys: Vec<String>,
}

/// Absent or unreadable documents read as `null`.
#[tracing::instrument(skip(state), fields(operation = "get_json_document"))]
pub async fn get_json_document(
    State(state): State<Arc<AppState>>,
    Path(key): Path<String>,
) -> impl IntoResponse {
    let value = state.documents.get_json(&key, Value::Null).await;
    Json(ApiResponse::ok(DocumentEntry { key, value }))
}

#[tracing::instrument(skip(state, value), fields(operation = "put_json_document"))]
pub async fn put_json_document(
    State(state): State<Arc<AppState>>,
    Path(key): Path<String>,
    ValidatedJson(value): ValidatedJson<Value>,
) -> Result<impl IntoResponse, HttpAppError> {
    state.documents.put_json(&key, &value).await?;
    tracing::info!(key = %key, "JSON document written");

    Ok(Json(ApiResponse::ok(DocumentEntry { key, value })))
}

/// Absent or unreadable documents read as the empty string.
#[tracing::instrument(skip(state), fields(operation = "get_text_document"))]
pub async fn get_text_document(
    State(state): State<Arc<AppState>>,
    Path(key): Path<String>,
) -> impl IntoResponse {
    let value = state.documents.get_text(&key, "").await;
    Json(ApiResponse::ok(DocumentEntry { key, value }))
}

/// The request body is stored verbatim.
#[tracing::instrument(skip(state, body), fields(operation = "put_text_document", bytes = body.len()))]
pub async fn put_text_document(
    State(state): State<Arc<AppState>>,
    Path(key): Path<String>,
    body: String,
) -> Result<impl IntoResponse, HttpAppError> {
    state.documents.put_text(&key, &body).await?;
    tracing::info!(key = %key, "Text document written");

    Ok(Json(ApiResponse::ok(DocumentEntry { key, value: body })))
}

#[tracing::instrument(skip(state), fields(operation = "list_document_keys"))]
pub async fn list_document_keys(
    State(state): State<Arc<AppState>>,
    Path(namespace): Path<String>,
) -> Result<impl IntoResponse, HttpAppError> {
    let namespace: DocumentNamespace = namespace.parse()?;
    let mut keys = state.documents.list_keys(namespace).await?;
    keys.sort();

    Ok(Json(ApiResponse::ok(DocumentKeys { namespace, keys })))
}
