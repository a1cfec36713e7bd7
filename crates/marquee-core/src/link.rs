//! External video links.
//!
//! Three YouTube URL shapes are recognised, tried in order: the watch page
//! (`…/watch?v=ID`), the short host (`youtu.be/ID`) and the embed player
//! (`…/embed/ID`). Every match is stored under one canonical watch URL.

use std::sync::LazyLock;

use regex::Regex;

use crate::error::AppError;

pub const CANONICAL_WATCH_PREFIX: &str = "https://www.youtube.com/watch?v=";

static WATCH_URL: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(
        r"^(?:https?://)?(?:www\.|m\.)?youtube\.com/watch\?(?:[^#]*&)?v=([A-Za-z0-9_-]{11})(?:[&#]|$)",
    )
    .expect("watch URL pattern is valid")
});

static SHORT_URL: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^(?:https?://)?youtu\.be/([A-Za-z0-9_-]{11})(?:[/?&#]|$)")
        .expect("short URL pattern is valid")
});

static EMBED_URL: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(
        r"^(?:https?://)?(?:www\.)?youtube(?:-nocookie)?\.com/embed/([A-Za-z0-9_-]{11})(?:[/?&#]|$)",
    )
    .expect("embed URL pattern is valid")
});

/// A recognised external video.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct VideoLink {
    pub video_id: String,
}

impl VideoLink {
    /// Parse a user-supplied URL. The first matching shape wins.
    pub fn parse(url: &str) -> Result<Self, AppError> {
        let url = url.trim();
        [&*WATCH_URL, &*SHORT_URL, &*EMBED_URL]
            .iter()
            .find_map(|pattern| pattern.captures(url))
            .and_then(|caps| caps.get(1))
            .map(|id| VideoLink {
                video_id: id.as_str().to_string(),
            })
            .ok_or_else(|| {
                AppError::InvalidInput(format!("Unsupported video link: {}", url))
            })
    }

    pub fn canonical_url(&self) -> String {
        format!("{}{}", CANONICAL_WATCH_PREFIX, self.video_id)
    }
}
