use super::{CatalogSource, InteractionSource, PreferenceStore, RecommendationCacheStore};
use crate::error::{EngineError, Result};
use crate::models::{
    CategoryId, InteractionRecord, PopularityStats, RecommendationCacheEntry,
    UserPreferenceProfile, UserId, VideoEngagementStats, VideoId, VideoMetadata,
};
use async_trait::async_trait;
use chrono::{DateTime, Duration, Utc};
use std::collections::{BTreeMap, HashMap, HashSet};
use std::sync::atomic::{AtomicBool, Ordering};
use tokio::sync::RwLock;

/// In-process store implementing every engine contract.
///
/// Interactions are joined with the current video row at read time, like the
/// SQL store does. Failure switches let tests exercise the error paths.
#[derive(Default)]
pub struct MemoryStore {
    videos: RwLock<BTreeMap<VideoId, VideoMetadata>>,
    interactions: RwLock<Vec<InteractionRecord>>,
    profiles: RwLock<HashMap<UserId, UserPreferenceProfile>>,
    cache: RwLock<HashMap<(UserId, VideoId), RecommendationCacheEntry>>,
    unavailable: AtomicBool,
    cache_writes_failing: AtomicBool,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn insert_video(&self, video: VideoMetadata) {
        self.videos.write().await.insert(video.id, video);
    }

    pub async fn insert_interaction(&self, record: InteractionRecord) {
        self.interactions.write().await.push(record);
    }

    /// Record a view of an existing video
    pub async fn record_view(
        &self,
        user_id: UserId,
        video_id: VideoId,
        watch_duration: f64,
        total_duration: f64,
        completed: bool,
        watched_at: DateTime<Utc>,
    ) {
        self.insert_interaction(InteractionRecord {
            user_id,
            video_id,
            watch_duration,
            total_duration,
            completed,
            watched_at,
            session_id: None,
            category_id: None,
            category_name: None,
            view_count: 0,
            like_count: 0,
            video_duration: None,
            published_at: None,
        })
        .await;
    }

    pub async fn insert_profile(&self, profile: UserPreferenceProfile) {
        self.profiles.write().await.insert(profile.user_id, profile);
    }

    /// Every cache row, including expired ones
    pub async fn cache_entries(&self, user_id: UserId) -> Vec<RecommendationCacheEntry> {
        let mut entries: Vec<_> = self
            .cache
            .read()
            .await
            .values()
            .filter(|e| e.user_id == user_id)
            .cloned()
            .collect();
        entries.sort_by_key(|e| e.video_id);
        entries
    }

    /// Make every read and write fail with a data store error
    pub fn set_unavailable(&self, unavailable: bool) {
        self.unavailable.store(unavailable, Ordering::SeqCst);
    }

    /// Make cache writes fail while reads keep working
    pub fn set_cache_writes_failing(&self, failing: bool) {
        self.cache_writes_failing.store(failing, Ordering::SeqCst);
    }

    fn check_available(&self) -> Result<()> {
        if self.unavailable.load(Ordering::SeqCst) {
            return Err(EngineError::DataStore("memory store marked unavailable".into()));
        }
        Ok(())
    }

    fn join(record: &InteractionRecord, video: &VideoMetadata) -> InteractionRecord {
        InteractionRecord {
            category_id: video.category_id,
            category_name: video.category_name.clone(),
            view_count: video.view_count,
            like_count: video.like_count,
            video_duration: video.duration,
            published_at: video.published_at,
            ..record.clone()
        }
    }

    async fn joined_interactions(
        &self,
        user_id: Option<UserId>,
        window_days: u32,
    ) -> Vec<InteractionRecord> {
        let since = Utc::now() - Duration::days(i64::from(window_days));
        let videos = self.videos.read().await;
        let mut records: Vec<_> = self
            .interactions
            .read()
            .await
            .iter()
            .filter(|r| r.watched_at >= since)
            .filter(|r| user_id.map_or(true, |u| r.user_id == u))
            .filter_map(|r| {
                videos
                    .get(&r.video_id)
                    .filter(|v| v.is_active)
                    .map(|v| Self::join(r, v))
            })
            .collect();
        records.sort_by(|a, b| {
            a.user_id
                .cmp(&b.user_id)
                .then_with(|| a.watched_at.cmp(&b.watched_at))
        });
        records
    }

    /// Mean watch percentage and view counts per video over all time
    async fn view_aggregates(&self) -> HashMap<VideoId, (f64, i64, HashSet<UserId>)> {
        let mut aggregates: HashMap<VideoId, (f64, i64, HashSet<UserId>)> = HashMap::new();
        for record in self.interactions.read().await.iter() {
            let entry = aggregates.entry(record.video_id).or_default();
            entry.0 += record.watch_percentage();
            entry.1 += 1;
            entry.2.insert(record.user_id);
        }
        aggregates
    }
}

#[async_trait]
impl InteractionSource for MemoryStore {
    async fn fetch_interactions(&self, window_days: u32) -> Result<Vec<InteractionRecord>> {
        self.check_available()?;
        Ok(self.joined_interactions(None, window_days).await)
    }

    async fn fetch_user_interactions(
        &self,
        user_id: UserId,
        window_days: u32,
    ) -> Result<Vec<InteractionRecord>> {
        self.check_available()?;
        Ok(self.joined_interactions(Some(user_id), window_days).await)
    }
}

#[async_trait]
impl CatalogSource for MemoryStore {
    async fn fetch_active_videos(&self) -> Result<Vec<VideoMetadata>> {
        self.check_available()?;
        Ok(self
            .videos
            .read()
            .await
            .values()
            .filter(|v| v.is_active)
            .cloned()
            .collect())
    }

    async fn fetch_videos(&self, ids: &[VideoId]) -> Result<HashMap<VideoId, VideoMetadata>> {
        self.check_available()?;
        let videos = self.videos.read().await;
        Ok(ids
            .iter()
            .filter_map(|id| videos.get(id).map(|v| (*id, v.clone())))
            .collect())
    }

    async fn fetch_video(&self, id: VideoId) -> Result<Option<VideoMetadata>> {
        self.check_available()?;
        Ok(self
            .videos
            .read()
            .await
            .get(&id)
            .filter(|v| v.is_active)
            .cloned())
    }

    async fn category_engagement(
        &self,
        category_id: CategoryId,
        exclude: VideoId,
    ) -> Result<Vec<VideoEngagementStats>> {
        self.check_available()?;
        let aggregates = self.view_aggregates().await;
        let videos = self.videos.read().await;

        Ok(videos
            .values()
            .filter(|v| v.is_active && v.id != exclude && v.category_id == Some(category_id))
            .filter_map(|v| {
                let (pct_sum, views, viewers) = aggregates.get(&v.id)?;
                if *views == 0 {
                    return None;
                }
                Some(VideoEngagementStats {
                    video_id: v.id,
                    title: v.title.clone(),
                    avg_completion_rate: Some(pct_sum / *views as f64),
                    unique_viewers: viewers.len() as i64,
                    total_views: *views,
                    engagement_rate: (v.view_count > 0)
                        .then(|| v.like_count as f64 / v.view_count as f64 * 100.0),
                })
            })
            .collect())
    }

    async fn popularity_stats(&self) -> Result<Vec<PopularityStats>> {
        self.check_available()?;
        let aggregates = self.view_aggregates().await;
        let videos = self.videos.read().await;

        Ok(videos
            .values()
            .filter(|v| v.is_active)
            .map(|v| PopularityStats {
                video_id: v.id,
                title: v.title.clone(),
                view_count: v.view_count,
                like_count: v.like_count,
                avg_watch_percentage: aggregates
                    .get(&v.id)
                    .filter(|(_, views, _)| *views > 0)
                    .map(|(sum, views, _)| sum / *views as f64),
            })
            .collect())
    }
}

#[async_trait]
impl PreferenceStore for MemoryStore {
    async fn fetch_profile(&self, user_id: UserId) -> Result<Option<UserPreferenceProfile>> {
        self.check_available()?;
        Ok(self.profiles.read().await.get(&user_id).cloned())
    }

    async fn upsert_profiles(&self, profiles: &[UserPreferenceProfile]) -> Result<usize> {
        self.check_available()?;
        let mut stored = self.profiles.write().await;
        let now = Utc::now();
        for profile in profiles {
            let mut profile = profile.clone();
            profile.updated_at = Some(now);
            stored.insert(profile.user_id, profile);
        }
        Ok(profiles.len())
    }
}

#[async_trait]
impl RecommendationCacheStore for MemoryStore {
    async fn upsert(&self, entry: &RecommendationCacheEntry) -> Result<()> {
        self.check_available()?;
        if self.cache_writes_failing.load(Ordering::SeqCst) {
            return Err(EngineError::Cache("cache writes disabled".into()));
        }
        self.cache
            .write()
            .await
            .insert((entry.user_id, entry.video_id), entry.clone());
        Ok(())
    }

    async fn fetch_unexpired(
        &self,
        user_id: UserId,
        limit: usize,
        now: DateTime<Utc>,
    ) -> Result<Vec<RecommendationCacheEntry>> {
        self.check_available()?;
        let mut entries: Vec<_> = self
            .cache
            .read()
            .await
            .values()
            .filter(|e| e.user_id == user_id && !e.is_expired(now))
            .cloned()
            .collect();
        entries.sort_by(|a, b| crate::models::rank_order(a.score, a.video_id, b.score, b.video_id));
        entries.truncate(limit);
        Ok(entries)
    }
}
