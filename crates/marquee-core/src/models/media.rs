use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

#[cfg(feature = "sqlx")]
use sqlx::FromRow;

use crate::error::AppError;

/// Media kind. Drives the upload folder and the foreign-key kind checks.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[cfg_attr(feature = "sqlx", derive(sqlx::Type))]
#[cfg_attr(
    feature = "sqlx",
    sqlx(type_name = "media_kind", rename_all = "lowercase")
)]
#[serde(rename_all = "lowercase")]
pub enum MediaKind {
    Image,
    Video,
}

impl MediaKind {
    pub const ALL: [MediaKind; 2] = [MediaKind::Image, MediaKind::Video];

    pub fn as_str(&self) -> &'static str {
        match self {
            MediaKind::Image => "image",
            MediaKind::Video => "video",
        }
    }

    /// Folder under the managed upload tree.
    pub fn folder(&self) -> &'static str {
        match self {
            MediaKind::Image => "images",
            MediaKind::Video => "videos",
        }
    }
}

impl fmt::Display for MediaKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for MediaKind {
    type Err = AppError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "image" | "images" => Ok(MediaKind::Image),
            "video" | "videos" => Ok(MediaKind::Video),
            other => Err(AppError::InvalidInput(format!(
                "Unknown media category '{}'. Expected 'image' or 'video'",
                other
            ))),
        }
    }
}

/// Where the bytes of an asset live.
///
/// A managed asset owns exactly one file under the upload tree; an external
/// asset never has one.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "storageType")]
pub enum MediaLocator {
    #[serde(rename = "internal")]
    Managed {
        #[serde(rename = "storedName")]
        stored_name: String,
        url: String,
    },
    #[serde(rename = "external")]
    External { url: String },
}

impl MediaLocator {
    pub fn url(&self) -> &str {
        match self {
            MediaLocator::Managed { url, .. } => url,
            MediaLocator::External { url } => url,
        }
    }

    pub fn stored_name(&self) -> Option<&str> {
        match self {
            MediaLocator::Managed { stored_name, .. } => Some(stored_name),
            MediaLocator::External { .. } => None,
        }
    }

    pub fn storage_type(&self) -> &'static str {
        match self {
            MediaLocator::Managed { .. } => STORAGE_TYPE_INTERNAL,
            MediaLocator::External { .. } => STORAGE_TYPE_EXTERNAL,
        }
    }
}

pub const STORAGE_TYPE_INTERNAL: &str = "internal";
pub const STORAGE_TYPE_EXTERNAL: &str = "external";

/// A registered media asset.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MediaAsset {
    pub id: i64,
    pub display_name: String,
    pub kind: MediaKind,
    #[serde(flatten)]
    pub locator: MediaLocator,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub content_type: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub file_size: Option<i64>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl MediaAsset {
    pub fn is_managed(&self) -> bool {
        matches!(self.locator, MediaLocator::Managed { .. })
    }
}

/// Input for registering a new asset; the registry assigns id and timestamps.
#[derive(Debug, Clone)]
pub struct NewMediaAsset {
    pub display_name: String,
    pub kind: MediaKind,
    pub locator: MediaLocator,
    pub content_type: Option<String>,
    pub file_size: Option<i64>,
}

/// Filters for media listing.
#[derive(Debug, Clone, Default)]
pub struct MediaFilter {
    pub kind: Option<MediaKind>,
    /// Case-insensitive substring match on the display name.
    pub search: Option<String>,
}

/// Flat database row for `media_assets`.
#[cfg(feature = "sqlx")]
#[derive(Debug, Clone, FromRow)]
pub struct MediaRow {
    pub id: i64,
    pub display_name: String,
    pub kind: MediaKind,
    pub storage_type: String,
    pub locator: String,
    pub stored_name: Option<String>,
    pub content_type: Option<String>,
    pub file_size: Option<i64>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[cfg(feature = "sqlx")]
impl MediaRow {
    pub fn into_asset(self) -> Result<MediaAsset, AppError> {
        let locator = match (self.storage_type.as_str(), self.stored_name) {
            (STORAGE_TYPE_INTERNAL, Some(stored_name)) => MediaLocator::Managed {
                stored_name,
                url: self.locator,
            },
            (STORAGE_TYPE_EXTERNAL, _) => MediaLocator::External { url: self.locator },
            (other, _) => {
                return Err(AppError::Internal(format!(
                    "Media asset {} has inconsistent storage type '{}'",
                    self.id, other
                )))
            }
        };

        Ok(MediaAsset {
            id: self.id,
            display_name: self.display_name,
            kind: self.kind,
            locator,
            content_type: self.content_type,
            file_size: self.file_size,
            created_at: self.created_at,
            updated_at: self.updated_at,
        })
    }
}
