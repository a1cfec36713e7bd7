use std::sync::Arc;

use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    response::IntoResponse,
    Json,
};
use marquee_core::models::{PageRequest, ProjectFilter, ProjectInput, ProjectStatus};
use serde::Deserialize;

use crate::error::{HttpAppError, ValidatedJson};
use crate::response::ApiResponse;
use crate::state::AppState;

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProjectListQuery {
    pub page: Option<u32>,
    pub limit: Option<u32>,
    pub search: Option<String>,
    pub status: Option<String>,
    pub category: Option<String>,
    pub year: Option<i32>,
}

impl ProjectListQuery {
    fn filter(&self) -> Result<ProjectFilter, HttpAppError> {
        let status = self
            .status
            .as_deref()
            .filter(|s| !s.trim().is_empty())
            .map(str::parse::<ProjectStatus>)
            .transpose()?;

        Ok(ProjectFilter {
            search: self.search.clone(),
            status,
            category: self.category.clone(),
            year: self.year,
        })
    }
}

#[tracing::instrument(skip(state, input), fields(operation = "create_project"))]
pub async fn create_project(
    State(state): State<Arc<AppState>>,
    ValidatedJson(input): ValidatedJson<ProjectInput>,
) -> Result<impl IntoResponse, HttpAppError> {
    let project = state.projects.create(&input).await?;
    tracing::info!(project_id = project.id, "Project created");

    Ok((StatusCode::CREATED, Json(ApiResponse::ok(project))))
}

#[tracing::instrument(skip(state), fields(operation = "list_projects"))]
pub async fn list_projects(
    State(state): State<Arc<AppState>>,
    Query(query): Query<ProjectListQuery>,
) -> Result<impl IntoResponse, HttpAppError> {
    let filter = query.filter()?;
    let page = state
        .projects
        .list(&filter, PageRequest::new(query.page, query.limit))
        .await?;

    Ok(Json(ApiResponse::ok(page)))
}

#[tracing::instrument(skip(state), fields(operation = "get_project", project_id = %id))]
pub async fn get_project(
    State(state): State<Arc<AppState>>,
    Path(id): Path<i64>,
) -> Result<impl IntoResponse, HttpAppError> {
    let project = state.projects.get_by_id(id).await?;
    Ok(Json(ApiResponse::ok(project)))
}

/// Sparse update: absent fields are left alone, `null` clears nullable ones.
#[tracing::instrument(skip(state, input), fields(operation = "update_project", project_id = %id))]
pub async fn update_project(
    State(state): State<Arc<AppState>>,
    Path(id): Path<i64>,
    ValidatedJson(input): ValidatedJson<ProjectInput>,
) -> Result<impl IntoResponse, HttpAppError> {
    let project = state.projects.update(id, &input).await?;
    tracing::info!(project_id = project.id, "Project updated");

    Ok(Json(ApiResponse::ok(project)))
}

#[tracing::instrument(skip(state), fields(operation = "delete_project", project_id = %id))]
pub async fn delete_project(
    State(state): State<Arc<AppState>>,
    Path(id): Path<i64>,
) -> Result<impl IntoResponse, HttpAppError> {
    state.projects.delete(id).await?;
    tracing::info!(project_id = id, "Project deleted");

    Ok(StatusCode::NO_CONTENT)
}

#[tracing::instrument(skip(state), fields(operation = "dangling_references"))]
pub async fn dangling_references(
    State(state): State<Arc<AppState>>,
) -> Result<impl IntoResponse, HttpAppError> {
    let references = state.projects.dangling_references().await?;
    Ok(Json(ApiResponse::ok(references)))
}
