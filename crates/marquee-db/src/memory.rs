//! In-memory repositories.
//!
//! Same ordering, filtering and paging rules as the Postgres repositories.
//! Media guards are not re-checked here: there are no row locks to take.

use std::collections::{BTreeMap, HashSet};
use std::sync::atomic::{AtomicBool, Ordering};

use chrono::Utc;
use marquee_core::models::{
    ColumnSet, ColumnValue, MediaAsset, MediaFilter, MediaGuard, MediaKind, MediaReference,
    NewMediaAsset, PageRequest, Project, ProjectColumn, ProjectFilter, ProjectStatus,
};
use marquee_core::AppError;
use tokio::sync::Mutex;

use crate::db::search::{contains_ci, normalized_term};
use crate::db::{InsertError, MediaRepositoryTrait, ProjectRepositoryTrait};

fn page_of<T: Clone>(rows: &[T], page: PageRequest) -> Vec<T> {
    rows.iter()
        .skip(page.offset() as usize)
        .take(page.limit as usize)
        .cloned()
        .collect()
}

#[derive(Default)]
struct MediaState {
    last_id: i64,
    rows: BTreeMap<i64, MediaAsset>,
}

#[derive(Default)]
pub struct InMemoryMediaRepository {
    state: Mutex<MediaState>,
    reject_inserts: AtomicBool,
}

impl InMemoryMediaRepository {
    pub fn new() -> Self {
        Self::default()
    }

    /// Make every subsequent insert fail, as a lost database connection would.
    pub fn reject_inserts(&self, reject: bool) {
        self.reject_inserts.store(reject, Ordering::SeqCst);
    }

    /// Insert a fully formed row, timestamps included, and move the id sequence past it.
    pub async fn seed(&self, asset: MediaAsset) {
        let mut state = self.state.lock().await;
        state.last_id = state.last_id.max(asset.id);
        state.rows.insert(asset.id, asset);
    }

    pub async fn len(&self) -> usize {
        self.state.lock().await.rows.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.len().await == 0
    }
}

fn media_matches(asset: &MediaAsset, filter: &MediaFilter) -> bool {
    if filter.kind.is_some_and(|k| k != asset.kind) {
        return false;
    }
    match normalized_term(filter.search.as_deref()) {
        Some(term) => contains_ci(&asset.display_name, term),
        None => true,
    }
}

#[async_trait::async_trait]
impl MediaRepositoryTrait for InMemoryMediaRepository {
    async fn insert(&self, asset: NewMediaAsset) -> Result<MediaAsset, AppError> {
        if self.reject_inserts.load(Ordering::SeqCst) {
            return Err(AppError::Internal(
                "media_assets insert rejected".to_string(),
            ));
        }

        let mut state = self.state.lock().await;
        if let Some(name) = asset.locator.stored_name() {
            let taken = state
                .rows
                .values()
                .any(|a| a.kind == asset.kind && a.locator.stored_name() == Some(name));
            if taken {
                return Err(AppError::Internal(format!(
                    "stored name {} is already registered",
                    name
                )));
            }
        }

        state.last_id += 1;
        let now = Utc::now();
        let created = MediaAsset {
            id: state.last_id,
            display_name: asset.display_name,
            kind: asset.kind,
            locator: asset.locator,
            content_type: asset.content_type,
            file_size: asset.file_size,
            created_at: now,
            updated_at: now,
        };
        state.rows.insert(created.id, created.clone());
        Ok(created)
    }

    async fn get(&self, id: i64) -> Result<Option<MediaAsset>, AppError> {
        Ok(self.state.lock().await.rows.get(&id).cloned())
    }

    async fn list(
        &self,
        filter: &MediaFilter,
        page: PageRequest,
    ) -> Result<(Vec<MediaAsset>, i64), AppError> {
        let state = self.state.lock().await;
        let mut matching: Vec<MediaAsset> = state
            .rows
            .values()
            .filter(|a| media_matches(a, filter))
            .cloned()
            .collect();
        matching.sort_by(|a, b| b.updated_at.cmp(&a.updated_at).then(b.id.cmp(&a.id)));

        Ok((page_of(&matching, page), matching.len() as i64))
    }

    async fn delete(&self, id: i64) -> Result<bool, AppError> {
        Ok(self.state.lock().await.rows.remove(&id).is_some())
    }

    async fn existing_ids(&self, ids: &[i64]) -> Result<HashSet<i64>, AppError> {
        let state = self.state.lock().await;
        Ok(ids
            .iter()
            .copied()
            .filter(|id| state.rows.contains_key(id))
            .collect())
    }

    async fn known_stored_names(
        &self,
        kind: MediaKind,
        names: &[String],
    ) -> Result<HashSet<String>, AppError> {
        let state = self.state.lock().await;
        Ok(state
            .rows
            .values()
            .filter(|a| a.kind == kind)
            .filter_map(|a| a.locator.stored_name())
            .filter(|name| names.iter().any(|n| n == name))
            .map(str::to_string)
            .collect())
    }
}

struct ProjectState {
    /// Last value handed out by the identity sequence.
    sequence: i64,
    identity_default: bool,
    rows: BTreeMap<i64, Project>,
}

pub struct InMemoryProjectRepository {
    state: Mutex<ProjectState>,
}

impl Default for InMemoryProjectRepository {
    fn default() -> Self {
        Self::new()
    }
}

impl InMemoryProjectRepository {
    pub fn new() -> Self {
        Self {
            state: Mutex::new(ProjectState {
                sequence: 0,
                identity_default: true,
                rows: BTreeMap::new(),
            }),
        }
    }

    /// A table whose `id` column lost its identity default.
    pub fn without_identity_default() -> Self {
        let mut repo = Self::new();
        repo.state.get_mut().identity_default = false;
        repo
    }

    /// Insert a fully formed row and move the sequence past it.
    pub async fn seed(&self, project: Project) {
        let mut state = self.state.lock().await;
        state.sequence = state.sequence.max(project.id);
        state.rows.insert(project.id, project);
    }

    pub async fn len(&self) -> usize {
        self.state.lock().await.rows.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.len().await == 0
    }
}

fn blank_project(id: i64) -> Project {
    let now = Utc::now();
    Project {
        id,
        title: String::new(),
        client: None,
        category: None,
        description: None,
        year: None,
        status: ProjectStatus::Draft,
        sort_order: 0,
        thumbnail_media_id: None,
        video_media_id: None,
        created_at: now,
        updated_at: now,
    }
}

fn apply_columns(project: &mut Project, columns: &ColumnSet) -> Result<(), AppError> {
    for (column, value) in columns.iter() {
        match (column, value) {
            (ProjectColumn::Title, ColumnValue::Text(Some(v))) => project.title = v.clone(),
            (ProjectColumn::Client, ColumnValue::Text(v)) => project.client = v.clone(),
            (ProjectColumn::Category, ColumnValue::Text(v)) => project.category = v.clone(),
            (ProjectColumn::Description, ColumnValue::Text(v)) => {
                project.description = v.clone()
            }
            (ProjectColumn::Year, ColumnValue::Int(v)) => project.year = *v,
            (ProjectColumn::Status, ColumnValue::Status(v)) => project.status = *v,
            (ProjectColumn::SortOrder, ColumnValue::Int(Some(v))) => project.sort_order = *v,
            (ProjectColumn::ThumbnailMediaId, ColumnValue::BigInt(v)) => {
                project.thumbnail_media_id = *v
            }
            (ProjectColumn::VideoMediaId, ColumnValue::BigInt(v)) => project.video_media_id = *v,
            (ProjectColumn::UpdatedAt, ColumnValue::Timestamp(v)) => project.updated_at = *v,
            (column, value) => {
                return Err(AppError::Internal(format!(
                    "Cannot store {:?} in projects.{}",
                    value,
                    column.as_str()
                )))
            }
        }
    }
    Ok(())
}

fn project_matches(project: &Project, filter: &ProjectFilter) -> bool {
    if let Some(term) = normalized_term(filter.search.as_deref()) {
        let hit = contains_ci(&project.title, term)
            || [&project.client, &project.category, &project.description]
                .into_iter()
                .flatten()
                .any(|v| contains_ci(v, term));
        if !hit {
            return false;
        }
    }
    if filter.status.is_some_and(|s| s != project.status) {
        return false;
    }
    if let Some(category) = filter.category.as_deref() {
        if project.category.as_deref() != Some(category) {
            return false;
        }
    }
    if filter.year.is_some() && filter.year != project.year {
        return false;
    }
    true
}

#[async_trait::async_trait]
impl ProjectRepositoryTrait for InMemoryProjectRepository {
    async fn insert(
        &self,
        columns: &ColumnSet,
        explicit_id: Option<i64>,
        _guards: &[MediaGuard],
    ) -> Result<Project, InsertError> {
        let mut state = self.state.lock().await;

        let id = match explicit_id {
            Some(id) => id,
            None if state.identity_default => {
                state.sequence += 1;
                state.sequence
            }
            None => return Err(InsertError::MissingIdentity { table: "projects" }),
        };

        if state.rows.contains_key(&id) {
            return Err(AppError::Internal(format!(
                "duplicate key: projects.id {} already exists",
                id
            ))
            .into());
        }

        let mut project = blank_project(id);
        apply_columns(&mut project, columns)?;
        state.rows.insert(id, project.clone());
        Ok(project)
    }

    async fn next_id(&self) -> Result<i64, AppError> {
        let state = self.state.lock().await;
        Ok(state.rows.keys().next_back().copied().unwrap_or(0) + 1)
    }

    async fn get(&self, id: i64) -> Result<Option<Project>, AppError> {
        Ok(self.state.lock().await.rows.get(&id).cloned())
    }

    async fn update(
        &self,
        id: i64,
        columns: &ColumnSet,
        _guards: &[MediaGuard],
    ) -> Result<Option<Project>, AppError> {
        let mut state = self.state.lock().await;
        let Some(existing) = state.rows.get(&id) else {
            return Ok(None);
        };

        // Apply to a copy so a bad column leaves the stored row untouched
        let mut updated = existing.clone();
        apply_columns(&mut updated, columns)?;
        state.rows.insert(id, updated.clone());
        Ok(Some(updated))
    }

    async fn delete(&self, id: i64) -> Result<bool, AppError> {
        Ok(self.state.lock().await.rows.remove(&id).is_some())
    }

    async fn list(
        &self,
        filter: &ProjectFilter,
        page: PageRequest,
    ) -> Result<(Vec<Project>, i64), AppError> {
        let state = self.state.lock().await;
        let mut matching: Vec<Project> = state
            .rows
            .values()
            .filter(|p| project_matches(p, filter))
            .cloned()
            .collect();
        matching.sort_by(|a, b| b.updated_at.cmp(&a.updated_at).then(b.id.cmp(&a.id)));

        Ok((page_of(&matching, page), matching.len() as i64))
    }

    async fn media_references(
        &self,
        media_id: Option<i64>,
    ) -> Result<Vec<MediaReference>, AppError> {
        let state = self.state.lock().await;
        Ok(state
            .rows
            .values()
            .flat_map(|p| {
                MediaReference::from_columns(p.id, p.thumbnail_media_id, p.video_media_id)
            })
            .filter(|r| media_id.map_or(true, |m| r.media_id == m))
            .collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use marquee_core::models::{MediaLocator, ReferenceField};

    fn titled(title: &str) -> ColumnSet {
        let mut columns = ColumnSet::new();
        columns.set(ProjectColumn::Title, ColumnValue::Text(Some(title.into())));
        columns
    }

    fn external(name: &str, kind: MediaKind) -> NewMediaAsset {
        NewMediaAsset {
            display_name: name.to_string(),
            kind,
            locator: MediaLocator::External {
                url: format!("https://www.youtube.com/watch?v={}", name),
            },
            content_type: None,
            file_size: None,
        }
    }

    #[tokio::test]
    async fn test_insert_applies_defaults() {
        let repo = InMemoryProjectRepository::new();
        let project = repo.insert(&ColumnSet::new(), None, &[]).await.unwrap();

        assert_eq!(project.id, 1);
        assert_eq!(project.title, "");
        assert_eq!(project.status, ProjectStatus::Draft);
        assert_eq!(project.sort_order, 0);
    }

    #[tokio::test]
    async fn test_insert_without_identity_default() {
        let repo = InMemoryProjectRepository::without_identity_default();
        let err = repo.insert(&titled("a"), None, &[]).await.unwrap_err();
        assert!(matches!(err, InsertError::MissingIdentity { table: "projects" }));

        let project = repo.insert(&titled("a"), Some(1), &[]).await.unwrap();
        assert_eq!(project.id, 1);
        assert_eq!(repo.next_id().await.unwrap(), 2);
    }

    #[tokio::test]
    async fn test_duplicate_explicit_id_rejected() {
        let repo = InMemoryProjectRepository::new();
        repo.insert(&titled("a"), Some(3), &[]).await.unwrap();
        let err = repo.insert(&titled("b"), Some(3), &[]).await.unwrap_err();
        assert!(matches!(err, InsertError::Other(AppError::Internal(_))));
    }

    #[tokio::test]
    async fn test_update_clears_nullable_column() {
        let repo = InMemoryProjectRepository::new();
        let mut columns = titled("Reel");
        columns.set(ProjectColumn::Client, ColumnValue::Text(Some("Acme".into())));
        let created = repo.insert(&columns, None, &[]).await.unwrap();

        let mut change = ColumnSet::new();
        change.set(ProjectColumn::Client, ColumnValue::Text(None));
        let updated = repo.update(created.id, &change, &[]).await.unwrap().unwrap();

        assert_eq!(updated.client, None);
        assert_eq!(updated.title, "Reel");
        assert!(repo.update(99, &change, &[]).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_mismatched_column_value_leaves_row_untouched() {
        let repo = InMemoryProjectRepository::new();
        let created = repo.insert(&titled("Reel"), None, &[]).await.unwrap();

        let mut change = titled("Changed");
        change.set(ProjectColumn::Year, ColumnValue::Text(Some("1999".into())));
        assert!(repo.update(created.id, &change, &[]).await.is_err());

        let stored = repo.get(created.id).await.unwrap().unwrap();
        assert_eq!(stored.title, "Reel");
    }

    #[tokio::test]
    async fn test_project_pages_cover_every_row_once() {
        let repo = InMemoryProjectRepository::new();
        for i in 0..7 {
            repo.insert(&titled(&format!("p{}", i)), None, &[])
                .await
                .unwrap();
        }

        let mut seen = Vec::new();
        for page in 1..=3 {
            let (rows, total) = repo
                .list(&ProjectFilter::default(), PageRequest::new(Some(page), Some(3)))
                .await
                .unwrap();
            assert_eq!(total, 7);
            seen.extend(rows.into_iter().map(|p| p.id));
        }

        seen.sort_unstable();
        assert_eq!(seen, (1..=7).collect::<Vec<_>>());
    }

    #[tokio::test]
    async fn test_project_search_spans_text_columns() {
        let repo = InMemoryProjectRepository::new();
        let mut columns = titled("Night Shift");
        columns.set(
            ProjectColumn::Description,
            ColumnValue::Text(Some("A harbour at dawn".into())),
        );
        repo.insert(&columns, None, &[]).await.unwrap();
        repo.insert(&titled("Daylight"), None, &[]).await.unwrap();

        let filter = ProjectFilter {
            search: Some("HARBOUR".to_string()),
            ..Default::default()
        };
        let (rows, total) = repo.list(&filter, PageRequest::default()).await.unwrap();
        assert_eq!(total, 1);
        assert_eq!(rows[0].title, "Night Shift");
    }

    #[tokio::test]
    async fn test_media_references_filtered_by_id() {
        let repo = InMemoryProjectRepository::new();
        let mut columns = titled("a");
        columns.set(ProjectColumn::ThumbnailMediaId, ColumnValue::BigInt(Some(4)));
        columns.set(ProjectColumn::VideoMediaId, ColumnValue::BigInt(Some(9)));
        repo.insert(&columns, None, &[]).await.unwrap();
        repo.insert(&titled("b"), None, &[]).await.unwrap();

        assert_eq!(repo.media_references(None).await.unwrap().len(), 2);

        let refs = repo.media_references(Some(9)).await.unwrap();
        assert_eq!(refs.len(), 1);
        assert_eq!(refs[0].project_id, 1);
        assert_eq!(refs[0].field, ReferenceField::VideoMediaId);
    }

    #[tokio::test]
    async fn test_media_filter_by_kind_and_name() {
        let repo = InMemoryMediaRepository::new();
        repo.insert(external("TeaserCut", MediaKind::Video)).await.unwrap();
        repo.insert(external("teaser-still", MediaKind::Image)).await.unwrap();
        repo.insert(external("Other", MediaKind::Video)).await.unwrap();

        let filter = MediaFilter {
            kind: Some(MediaKind::Video),
            search: Some("teaser".to_string()),
        };
        let (rows, total) = repo.list(&filter, PageRequest::default()).await.unwrap();
        assert_eq!(total, 1);
        assert_eq!(rows[0].display_name, "TeaserCut");
    }

    #[tokio::test]
    async fn test_existing_ids_and_rejected_inserts() {
        let repo = InMemoryMediaRepository::new();
        let a = repo.insert(external("a", MediaKind::Image)).await.unwrap();

        let found = repo.existing_ids(&[a.id, 42]).await.unwrap();
        assert_eq!(found, HashSet::from([a.id]));

        repo.reject_inserts(true);
        assert!(repo.insert(external("b", MediaKind::Image)).await.is_err());
        assert_eq!(repo.len().await, 1);
    }
}
