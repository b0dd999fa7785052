//! Catalog-side video data

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::{CategoryId, VideoId};

/// Video metadata as stored in the catalog
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct VideoMetadata {
    pub id: VideoId,
    pub title: String,
    pub description: Option<String>,

    /// Raw tag column: usually a JSON array of strings, sometimes free text
    pub tags: Option<String>,

    pub channel_title: Option<String>,
    pub category_id: Option<CategoryId>,
    pub category_name: Option<String>,

    /// Seconds
    pub duration: Option<i32>,
    pub thumbnail_url: Option<String>,
    pub view_count: i64,
    pub like_count: i64,
    pub published_at: Option<DateTime<Utc>>,
    pub is_active: bool,
}

impl VideoMetadata {
    /// Minimal active video, handy for fixtures
    pub fn new(id: VideoId, title: impl Into<String>) -> Self {
        Self {
            id,
            title: title.into(),
            description: None,
            tags: None,
            channel_title: None,
            category_id: None,
            category_name: None,
            duration: None,
            thumbnail_url: None,
            view_count: 0,
            like_count: 0,
            published_at: None,
            is_active: true,
        }
    }

    /// Tag list parsed from the raw column.
    ///
    /// A JSON array yields its string elements, a JSON string yields itself,
    /// anything else is taken verbatim.
    pub fn tag_list(&self) -> Vec<String> {
        let raw = match self.tags.as_deref().map(str::trim) {
            Some(raw) if !raw.is_empty() => raw,
            _ => return Vec::new(),
        };

        match serde_json::from_str::<serde_json::Value>(raw) {
            Ok(serde_json::Value::Array(items)) => items
                .into_iter()
                .filter_map(|item| match item {
                    serde_json::Value::String(s) => Some(s),
                    serde_json::Value::Null => None,
                    other => Some(other.to_string()),
                })
                .filter(|s| !s.trim().is_empty())
                .collect(),
            Ok(serde_json::Value::String(s)) => vec![s],
            _ => vec![raw.to_string()],
        }
    }

    /// Whole days since publication at `now`, `None` when unknown
    pub fn days_since_published(&self, now: DateTime<Utc>) -> Option<i64> {
        self.published_at
            .map(|published| (now - published).num_days().max(0))
    }
}

/// Per-video engagement inside one category, used by the content-based scorer
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct VideoEngagementStats {
    pub video_id: VideoId,
    pub title: String,

    /// Mean watch percentage over all views, `None` without views
    pub avg_completion_rate: Option<f64>,
    pub unique_viewers: i64,
    pub total_views: i64,

    /// `like_count / view_count * 100`, `None` when the video has no views
    pub engagement_rate: Option<f64>,
}

/// Global popularity inputs for one active video
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PopularityStats {
    pub video_id: VideoId,
    pub title: String,
    pub view_count: i64,
    pub like_count: i64,
    pub avg_watch_percentage: Option<f64>,
}
