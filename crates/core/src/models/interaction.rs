//! Watch interaction records

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::{CategoryId, UserId, VideoId};

/// One observed user-watching-video event, joined with the video columns the
/// aggregation and feature code needs.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct InteractionRecord {
    pub user_id: UserId,
    pub video_id: VideoId,

    /// Seconds watched
    pub watch_duration: f64,

    /// Length of the video at watch time, in seconds
    pub total_duration: f64,

    pub completed: bool,
    pub watched_at: DateTime<Utc>,
    pub session_id: Option<String>,

    pub category_id: Option<CategoryId>,
    pub category_name: Option<String>,
    pub view_count: i64,
    pub like_count: i64,

    /// Catalog duration of the video, in seconds
    pub video_duration: Option<i32>,
    pub published_at: Option<DateTime<Utc>>,
}

impl InteractionRecord {
    /// Watched share of the video in percent, within [0, 100].
    ///
    /// A zero or missing total duration counts as nothing watched.
    pub fn watch_percentage(&self) -> f64 {
        if self.total_duration <= 0.0 {
            return 0.0;
        }
        (self.watch_duration / self.total_duration * 100.0).clamp(0.0, 100.0)
    }

    /// Discretized engagement in 1..=5
    pub fn engagement_tier(&self) -> f64 {
        if self.completed {
            return 5.0;
        }
        match self.watch_percentage() {
            p if p >= 75.0 => 4.0,
            p if p >= 50.0 => 3.0,
            p if p >= 25.0 => 2.0,
            _ => 1.0,
        }
    }

    /// Whole days between the watch event and `now`, never negative
    pub fn days_since_watch(&self, now: DateTime<Utc>) -> i64 {
        (now - self.watched_at).num_days().max(0)
    }
}

#[cfg(test)]
pub(crate) fn sample(user_id: UserId, video_id: VideoId) -> InteractionRecord {
    InteractionRecord {
        user_id,
        video_id,
        watch_duration: 60.0,
        total_duration: 120.0,
        completed: false,
        watched_at: Utc::now(),
        session_id: None,
        category_id: Some(1),
        category_name: Some("Music".to_string()),
        view_count: 100,
        like_count: 10,
        video_duration: Some(120),
        published_at: None,
    }
}
