//! Read and write contracts the engine needs from its data store.
//!
//! Ranking and blending happen in the engine; stores only fetch and persist.

mod memory;
mod postgres;

pub use memory::MemoryStore;
pub use postgres::PgStore;

use crate::error::Result;
use crate::models::{
    CategoryId, InteractionRecord, PopularityStats, RecommendationCacheEntry,
    UserPreferenceProfile, UserId, VideoEngagementStats, VideoId, VideoMetadata,
};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use std::collections::HashMap;

/// Watch interactions on active videos
#[async_trait]
pub trait InteractionSource: Send + Sync {
    /// Every interaction by a known user within the last `window_days`,
    /// ordered by user then watch time
    async fn fetch_interactions(&self, window_days: u32) -> Result<Vec<InteractionRecord>>;

    /// One user's interactions within the last `window_days`, oldest first
    async fn fetch_user_interactions(
        &self,
        user_id: UserId,
        window_days: u32,
    ) -> Result<Vec<InteractionRecord>>;
}

#[async_trait]
pub trait CatalogSource: Send + Sync {
    async fn fetch_active_videos(&self) -> Result<Vec<VideoMetadata>>;

    /// Metadata for the given ids; unknown ids are absent from the map
    async fn fetch_videos(&self, ids: &[VideoId]) -> Result<HashMap<VideoId, VideoMetadata>>;

    /// A single active video
    async fn fetch_video(&self, id: VideoId) -> Result<Option<VideoMetadata>>;

    /// Engagement of active videos in `category_id`, excluding `exclude`,
    /// restricted to videos with at least one view
    async fn category_engagement(
        &self,
        category_id: CategoryId,
        exclude: VideoId,
    ) -> Result<Vec<VideoEngagementStats>>;

    /// Popularity inputs for every active video
    async fn popularity_stats(&self) -> Result<Vec<PopularityStats>>;
}

#[async_trait]
pub trait PreferenceStore: Send + Sync {
    async fn fetch_profile(&self, user_id: UserId) -> Result<Option<UserPreferenceProfile>>;

    /// Overwrite the stored profile of every user in `profiles`
    async fn upsert_profiles(&self, profiles: &[UserPreferenceProfile]) -> Result<usize>;
}

#[async_trait]
pub trait RecommendationCacheStore: Send + Sync {
    /// Insert or replace the row for `(entry.user_id, entry.video_id)`
    async fn upsert(&self, entry: &RecommendationCacheEntry) -> Result<()>;

    /// Rows with `expires_at > now`, best score first, at most `limit`
    async fn fetch_unexpired(
        &self,
        user_id: UserId,
        limit: usize,
        now: DateTime<Utc>,
    ) -> Result<Vec<RecommendationCacheEntry>>;

    async fn upsert_many(&self, entries: &[RecommendationCacheEntry]) -> Result<()> {
        for entry in entries {
            self.upsert(entry).await?;
        }
        Ok(())
    }
}
