use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Deserializer, Serialize};

#[cfg(feature = "sqlx")]
use sqlx::FromRow;

use super::media::MediaKind;
use crate::error::AppError;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[cfg_attr(feature = "sqlx", derive(sqlx::Type))]
#[cfg_attr(
    feature = "sqlx",
    sqlx(type_name = "project_status", rename_all = "lowercase")
)]
#[serde(rename_all = "lowercase")]
pub enum ProjectStatus {
    Draft,
    Published,
}

impl FromStr for ProjectStatus {
    type Err = AppError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "draft" => Ok(ProjectStatus::Draft),
            "published" => Ok(ProjectStatus::Published),
            other => Err(AppError::InvalidInput(format!(
                "Unknown project status '{}'",
                other
            ))),
        }
    }
}

/// A production shown on the site.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[cfg_attr(feature = "sqlx", derive(FromRow))]
#[serde(rename_all = "camelCase")]
pub struct Project {
    pub id: i64,
    pub title: String,
    pub client: Option<String>,
    pub category: Option<String>,
    pub description: Option<String>,
    pub year: Option<i32>,
    pub status: ProjectStatus,
    pub sort_order: i32,
    pub thumbnail_media_id: Option<i64>,
    pub video_media_id: Option<i64>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// A media id as clients send it: a JSON number or a numeric string.
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(untagged)]
pub enum RawMediaId {
    Number(serde_json::Number),
    Text(String),
}

impl RawMediaId {
    pub fn coerce(&self, field: ReferenceField) -> Result<i64, AppError> {
        let parsed = match self {
            RawMediaId::Number(n) => n.as_i64(),
            RawMediaId::Text(s) => s.trim().parse::<i64>().ok(),
        };

        match parsed {
            Some(id) if id > 0 => Ok(id),
            _ => Err(AppError::InvalidInput(format!(
                "{} must be a positive integer media id",
                field.as_str()
            ))),
        }
    }
}

/// Sparse create/update payload.
///
/// Nullable columns use `Option<Option<T>>`: absent leaves the column alone,
/// `null` clears it.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
pub struct ProjectInput {
    #[serde(default)]
    pub title: Option<String>,
    #[serde(default, deserialize_with = "present")]
    pub client: Option<Option<String>>,
    #[serde(default, deserialize_with = "present")]
    pub category: Option<Option<String>>,
    #[serde(default, deserialize_with = "present")]
    pub description: Option<Option<String>>,
    #[serde(default, deserialize_with = "present")]
    pub year: Option<Option<i32>>,
    #[serde(default)]
    pub status: Option<ProjectStatus>,
    #[serde(default)]
    pub sort_order: Option<i32>,
    #[serde(default, deserialize_with = "present")]
    pub thumbnail_media_id: Option<Option<RawMediaId>>,
    #[serde(default, deserialize_with = "present")]
    pub video_media_id: Option<Option<RawMediaId>>,
}

fn present<'de, T, D>(deserializer: D) -> Result<Option<T>, D::Error>
where
    T: Deserialize<'de>,
    D: Deserializer<'de>,
{
    T::deserialize(deserializer).map(Some)
}

#[derive(Debug, Clone, Default)]
pub struct ProjectFilter {
    /// Case-insensitive substring over title, client, category and description.
    pub search: Option<String>,
    pub status: Option<ProjectStatus>,
    pub category: Option<String>,
    pub year: Option<i32>,
}

/// Columns a write may touch. `id` is never in this set.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ProjectColumn {
    Title,
    Client,
    Category,
    Description,
    Year,
    Status,
    SortOrder,
    ThumbnailMediaId,
    VideoMediaId,
    UpdatedAt,
}

impl ProjectColumn {
    pub fn as_str(&self) -> &'static str {
        match self {
            ProjectColumn::Title => "title",
            ProjectColumn::Client => "client",
            ProjectColumn::Category => "category",
            ProjectColumn::Description => "description",
            ProjectColumn::Year => "year",
            ProjectColumn::Status => "status",
            ProjectColumn::SortOrder => "sort_order",
            ProjectColumn::ThumbnailMediaId => "thumbnail_media_id",
            ProjectColumn::VideoMediaId => "video_media_id",
            ProjectColumn::UpdatedAt => "updated_at",
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum ColumnValue {
    Text(Option<String>),
    Int(Option<i32>),
    BigInt(Option<i64>),
    Status(ProjectStatus),
    Timestamp(DateTime<Utc>),
}

/// Ordered column/value pairs for a dynamic insert or update.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ColumnSet {
    columns: Vec<(ProjectColumn, ColumnValue)>,
}

impl ColumnSet {
    pub fn new() -> Self {
        Self::default()
    }

    /// Set a column, replacing any earlier value for it.
    pub fn set(&mut self, column: ProjectColumn, value: ColumnValue) {
        if let Some(slot) = self.columns.iter_mut().find(|(c, _)| *c == column) {
            slot.1 = value;
        } else {
            self.columns.push((column, value));
        }
    }

    pub fn get(&self, column: ProjectColumn) -> Option<&ColumnValue> {
        self.columns
            .iter()
            .find(|(c, _)| *c == column)
            .map(|(_, v)| v)
    }

    pub fn iter(&self) -> impl Iterator<Item = &(ProjectColumn, ColumnValue)> {
        self.columns.iter()
    }

    pub fn len(&self) -> usize {
        self.columns.len()
    }

    pub fn is_empty(&self) -> bool {
        self.columns.is_empty()
    }
}

/// The two media-valued columns on a project.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub enum ReferenceField {
    ThumbnailMediaId,
    VideoMediaId,
}

impl ReferenceField {
    pub fn as_str(&self) -> &'static str {
        match self {
            ReferenceField::ThumbnailMediaId => "thumbnailMediaId",
            ReferenceField::VideoMediaId => "videoMediaId",
        }
    }

    pub fn expected_kind(&self) -> MediaKind {
        match self {
            ReferenceField::ThumbnailMediaId => MediaKind::Image,
            ReferenceField::VideoMediaId => MediaKind::Video,
        }
    }

    pub fn column(&self) -> ProjectColumn {
        match self {
            ReferenceField::ThumbnailMediaId => ProjectColumn::ThumbnailMediaId,
            ReferenceField::VideoMediaId => ProjectColumn::VideoMediaId,
        }
    }
}

impl fmt::Display for ReferenceField {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One project column pointing at one media asset.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct MediaReference {
    pub project_id: i64,
    pub field: ReferenceField,
    pub media_id: i64,
}

impl MediaReference {
    /// Expand a project's non-null media columns.
    pub fn from_columns(
        project_id: i64,
        thumbnail_media_id: Option<i64>,
        video_media_id: Option<i64>,
    ) -> Vec<MediaReference> {
        let mut refs = Vec::with_capacity(2);
        if let Some(media_id) = thumbnail_media_id {
            refs.push(MediaReference {
                project_id,
                field: ReferenceField::ThumbnailMediaId,
                media_id,
            });
        }
        if let Some(media_id) = video_media_id {
            refs.push(MediaReference {
                project_id,
                field: ReferenceField::VideoMediaId,
                media_id,
            });
        }
        refs
    }
}

/// A media reference already validated by the service. Repositories that can
/// lock rows re-check it inside the write transaction.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MediaGuard {
    pub field: ReferenceField,
    pub media_id: i64,
}

impl MediaGuard {
    pub fn missing_error(&self) -> AppError {
        AppError::Referential(format!(
            "{} references media asset {}, which does not exist",
            self.field, self.media_id
        ))
    }

    pub fn kind_error(&self, actual: MediaKind) -> AppError {
        AppError::Referential(format!(
            "{} must reference a {}, but media asset {} is a {}",
            self.field,
            self.field.expected_kind(),
            self.media_id,
            actual
        ))
    }
}
