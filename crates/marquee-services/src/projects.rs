//! Project service: sparse writes with media reference checks.

use std::sync::Arc;

use chrono::Utc;
use marquee_core::models::{
    ColumnSet, ColumnValue, MediaGuard, MediaReference, PageRequest, PaginatedList, Project,
    ProjectColumn, ProjectFilter, ProjectInput, ReferenceField,
};
use marquee_core::AppError;
use marquee_db::{InsertError, MediaRepositoryTrait, ProjectRepositoryTrait};

/// Columns and verified media references derived from one [`ProjectInput`].
#[derive(Debug, Clone, PartialEq)]
pub struct ResolvedChanges {
    pub columns: ColumnSet,
    pub guards: Vec<MediaGuard>,
}

#[derive(Clone)]
pub struct ProjectService {
    projects: Arc<dyn ProjectRepositoryTrait>,
    media: Arc<dyn MediaRepositoryTrait>,
}

impl ProjectService {
    pub fn new(
        projects: Arc<dyn ProjectRepositoryTrait>,
        media: Arc<dyn MediaRepositoryTrait>,
    ) -> Self {
        Self { projects, media }
    }

    /// Turn a sparse input into a column set, checking every non-null media
    /// reference against the registry. Always stamps `updated_at`.
    pub async fn resolve_changes(&self, input: &ProjectInput) -> Result<ResolvedChanges, AppError> {
        let mut columns = ColumnSet::new();

        if let Some(title) = &input.title {
            columns.set(ProjectColumn::Title, ColumnValue::Text(Some(title.clone())));
        }
        if let Some(client) = &input.client {
            columns.set(ProjectColumn::Client, ColumnValue::Text(client.clone()));
        }
        if let Some(category) = &input.category {
            columns.set(ProjectColumn::Category, ColumnValue::Text(category.clone()));
        }
        if let Some(description) = &input.description {
            columns.set(
                ProjectColumn::Description,
                ColumnValue::Text(description.clone()),
            );
        }
        if let Some(year) = input.year {
            columns.set(ProjectColumn::Year, ColumnValue::Int(year));
        }
        if let Some(status) = input.status {
            columns.set(ProjectColumn::Status, ColumnValue::Status(status));
        }
        if let Some(sort_order) = input.sort_order {
            columns.set(ProjectColumn::SortOrder, ColumnValue::Int(Some(sort_order)));
        }

        // Coerce both ids before touching the registry so malformed input
        // is reported ahead of referential problems.
        let mut guards = Vec::new();
        for (field, raw) in [
            (ReferenceField::ThumbnailMediaId, &input.thumbnail_media_id),
            (ReferenceField::VideoMediaId, &input.video_media_id),
        ] {
            match raw {
                None => {}
                Some(None) => columns.set(field.column(), ColumnValue::BigInt(None)),
                Some(Some(raw)) => {
                    let media_id = raw.coerce(field)?;
                    columns.set(field.column(), ColumnValue::BigInt(Some(media_id)));
                    guards.push(MediaGuard { field, media_id });
                }
            }
        }

        for guard in &guards {
            match self.media.get(guard.media_id).await? {
                None => return Err(guard.missing_error()),
                Some(asset) if asset.kind != guard.field.expected_kind() => {
                    return Err(guard.kind_error(asset.kind))
                }
                Some(_) => {}
            }
        }

        columns.set(ProjectColumn::UpdatedAt, ColumnValue::Timestamp(Utc::now()));

        Ok(ResolvedChanges { columns, guards })
    }

    /// Insert a project. When the table has lost its identity default the id
    /// is allocated as `max(id) + 1` and the insert is retried once.
    #[tracing::instrument(skip(self, input))]
    pub async fn create(&self, input: &ProjectInput) -> Result<Project, AppError> {
        let changes = self.resolve_changes(input).await?;

        let result = self
            .projects
            .insert(&changes.columns, None, &changes.guards)
            .await;

        let project = match result {
            Ok(project) => project,
            Err(InsertError::MissingIdentity { table }) => {
                let next_id = self.projects.next_id().await?;
                tracing::warn!(
                    table,
                    next_id,
                    "Identity default missing, retrying insert with explicit id"
                );
                self.projects
                    .insert(&changes.columns, Some(next_id), &changes.guards)
                    .await?
            }
            Err(InsertError::Other(e)) => return Err(e),
        };

        tracing::info!(project_id = project.id, "Project created");
        Ok(project)
    }

    #[tracing::instrument(skip(self, input), fields(project_id = %id))]
    pub async fn update(&self, id: i64, input: &ProjectInput) -> Result<Project, AppError> {
        let changes = self.resolve_changes(input).await?;

        self.projects
            .update(id, &changes.columns, &changes.guards)
            .await?
            .ok_or_else(|| not_found(id))
    }

    #[tracing::instrument(skip(self), fields(project_id = %id))]
    pub async fn delete(&self, id: i64) -> Result<(), AppError> {
        if !self.projects.delete(id).await? {
            return Err(not_found(id));
        }
        tracing::info!("Project deleted");
        Ok(())
    }

    pub async fn get_by_id(&self, id: i64) -> Result<Project, AppError> {
        self.projects.get(id).await?.ok_or_else(|| not_found(id))
    }

    pub async fn list(
        &self,
        filter: &ProjectFilter,
        page: PageRequest,
    ) -> Result<PaginatedList<Project>, AppError> {
        let (items, total) = self.projects.list(filter, page).await?;
        Ok(PaginatedList::new(items, page, total))
    }

    /// Project fields currently pointing at `media_id`.
    pub async fn references_to(&self, media_id: i64) -> Result<Vec<MediaReference>, AppError> {
        self.projects.media_references(Some(media_id)).await
    }

    /// References whose target asset no longer exists.
    #[tracing::instrument(skip(self))]
    pub async fn dangling_references(&self) -> Result<Vec<MediaReference>, AppError> {
        let references = self.projects.media_references(None).await?;
        if references.is_empty() {
            return Ok(references);
        }

        let mut ids: Vec<i64> = references.iter().map(|r| r.media_id).collect();
        ids.sort_unstable();
        ids.dedup();
        let existing = self.media.existing_ids(&ids).await?;

        let dangling: Vec<MediaReference> = references
            .into_iter()
            .filter(|r| !existing.contains(&r.media_id))
            .collect();

        if !dangling.is_empty() {
            tracing::warn!(count = dangling.len(), "Dangling media references found");
        }
        Ok(dangling)
    }
}

fn not_found(id: i64) -> AppError {
    AppError::NotFound(format!("Project {} not found", id))
}
