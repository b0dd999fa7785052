use super::{CatalogSource, InteractionSource, PreferenceStore, RecommendationCacheStore};
use crate::error::Result;
use crate::models::{
    CategoryId, InteractionRecord, PopularityStats, RecommendationCacheEntry,
    UserPreferenceProfile, UserId, VideoEngagementStats, VideoId, VideoMetadata,
};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::postgres::PgRow;
use sqlx::{PgPool, Row};
use std::collections::HashMap;
use tracing::{debug, instrument};

/// Watch percentage of one `video_views` row, matching
/// [`InteractionRecord::watch_percentage`]
const WATCH_PCT_SQL: &str = "CASE WHEN vv.total_duration > 0 \
     THEN LEAST(100.0, GREATEST(0.0, vv.watch_duration / vv.total_duration * 100.0)) \
     ELSE 0.0 END";

const VIDEO_COLUMNS: &str = r#"
    v.id, v.title, v.description, v.tags, v.channel_title, v.category_id,
    c.name AS category_name, v.duration, v.thumbnail_url, v.view_count,
    v.like_count, v.published_at, v.is_active
"#;

const INTERACTION_COLUMNS: &str = r#"
    vv.user_id, vv.video_id, vv.watch_duration, vv.total_duration, vv.completed,
    vv.created_at AS watched_at, vv.session_id, v.category_id,
    c.name AS category_name, v.view_count, v.like_count,
    v.duration AS video_duration, v.published_at
"#;

/// PostgreSQL implementation of every store contract
#[derive(Clone)]
pub struct PgStore {
    pool: PgPool,
}

impl PgStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    pub fn pool(&self) -> &PgPool {
        &self.pool
    }

    fn interaction_from_row(row: &PgRow) -> Result<InteractionRecord> {
        Ok(InteractionRecord {
            user_id: row.try_get("user_id")?,
            video_id: row.try_get("video_id")?,
            watch_duration: row.try_get("watch_duration")?,
            total_duration: row.try_get("total_duration")?,
            completed: row.try_get("completed")?,
            watched_at: row.try_get("watched_at")?,
            session_id: row.try_get("session_id")?,
            category_id: row.try_get("category_id")?,
            category_name: row.try_get("category_name")?,
            view_count: row.try_get("view_count")?,
            like_count: row.try_get("like_count")?,
            video_duration: row.try_get("video_duration")?,
            published_at: row.try_get("published_at")?,
        })
    }

    fn video_from_row(row: &PgRow) -> Result<VideoMetadata> {
        Ok(VideoMetadata {
            id: row.try_get("id")?,
            title: row.try_get("title")?,
            description: row.try_get("description")?,
            tags: row.try_get("tags")?,
            channel_title: row.try_get("channel_title")?,
            category_id: row.try_get("category_id")?,
            category_name: row.try_get("category_name")?,
            duration: row.try_get("duration")?,
            thumbnail_url: row.try_get("thumbnail_url")?,
            view_count: row.try_get("view_count")?,
            like_count: row.try_get("like_count")?,
            published_at: row.try_get("published_at")?,
            is_active: row.try_get("is_active")?,
        })
    }
}

#[async_trait]
impl InteractionSource for PgStore {
    #[instrument(skip(self))]
    async fn fetch_interactions(&self, window_days: u32) -> Result<Vec<InteractionRecord>> {
        let query = format!(
            r#"
            SELECT {INTERACTION_COLUMNS}
            FROM video_views vv
            JOIN videos v ON vv.video_id = v.id
            LEFT JOIN categories c ON v.category_id = c.id
            WHERE vv.user_id IS NOT NULL
              AND v.is_active = TRUE
              AND vv.created_at >= NOW() - make_interval(days => $1)
            ORDER BY vv.user_id, vv.created_at
            "#
        );
        let rows = sqlx::query(&query)
            .bind(window_days as i32)
            .fetch_all(&self.pool)
            .await?;

        debug!(rows = rows.len(), "Fetched interactions");
        rows.iter().map(Self::interaction_from_row).collect()
    }

    #[instrument(skip(self))]
    async fn fetch_user_interactions(
        &self,
        user_id: UserId,
        window_days: u32,
    ) -> Result<Vec<InteractionRecord>> {
        let query = format!(
            r#"
            SELECT {INTERACTION_COLUMNS}
            FROM video_views vv
            JOIN videos v ON vv.video_id = v.id
            LEFT JOIN categories c ON v.category_id = c.id
            WHERE vv.user_id = $1
              AND v.is_active = TRUE
              AND vv.created_at >= NOW() - make_interval(days => $2)
            ORDER BY vv.created_at
            "#
        );
        let rows = sqlx::query(&query)
            .bind(user_id)
            .bind(window_days as i32)
            .fetch_all(&self.pool)
            .await?;

        rows.iter().map(Self::interaction_from_row).collect()
    }
}

#[async_trait]
impl CatalogSource for PgStore {
    #[instrument(skip(self))]
    async fn fetch_active_videos(&self) -> Result<Vec<VideoMetadata>> {
        let query = format!(
            r#"
            SELECT {VIDEO_COLUMNS}
            FROM videos v
            LEFT JOIN categories c ON v.category_id = c.id
            WHERE v.is_active = TRUE
            ORDER BY v.id
            "#
        );
        let rows = sqlx::query(&query).fetch_all(&self.pool).await?;
        rows.iter().map(Self::video_from_row).collect()
    }

    #[instrument(skip(self, ids), fields(count = ids.len()))]
    async fn fetch_videos(&self, ids: &[VideoId]) -> Result<HashMap<VideoId, VideoMetadata>> {
        if ids.is_empty() {
            return Ok(HashMap::new());
        }
        let query = format!(
            r#"
            SELECT {VIDEO_COLUMNS}
            FROM videos v
            LEFT JOIN categories c ON v.category_id = c.id
            WHERE v.id = ANY($1)
            "#
        );
        let rows = sqlx::query(&query)
            .bind(ids)
            .fetch_all(&self.pool)
            .await?;

        rows.iter()
            .map(|row| Self::video_from_row(row).map(|v| (v.id, v)))
            .collect()
    }

    #[instrument(skip(self))]
    async fn fetch_video(&self, id: VideoId) -> Result<Option<VideoMetadata>> {
        let query = format!(
            r#"
            SELECT {VIDEO_COLUMNS}
            FROM videos v
            LEFT JOIN categories c ON v.category_id = c.id
            WHERE v.id = $1 AND v.is_active = TRUE
            "#
        );
        let row = sqlx::query(&query)
            .bind(id)
            .fetch_optional(&self.pool)
            .await?;

        row.as_ref().map(Self::video_from_row).transpose()
    }

    #[instrument(skip(self))]
    async fn category_engagement(
        &self,
        category_id: CategoryId,
        exclude: VideoId,
    ) -> Result<Vec<VideoEngagementStats>> {
        let query = format!(
            r#"
            SELECT
                v.id AS video_id,
                v.title,
                AVG({WATCH_PCT_SQL}) AS avg_completion_rate,
                COUNT(DISTINCT vv.user_id) AS unique_viewers,
                COUNT(vv.id) AS total_views,
                (v.like_count::DOUBLE PRECISION / NULLIF(v.view_count, 0)) * 100.0
                    AS engagement_rate
            FROM videos v
            LEFT JOIN video_views vv ON v.id = vv.video_id
            WHERE v.category_id = $1
              AND v.id <> $2
              AND v.is_active = TRUE
            GROUP BY v.id
            HAVING COUNT(vv.id) > 0
            "#
        );
        let rows = sqlx::query(&query)
            .bind(category_id)
            .bind(exclude)
            .fetch_all(&self.pool)
            .await?;

        rows.iter()
            .map(|row| {
                Ok(VideoEngagementStats {
                    video_id: row.try_get("video_id")?,
                    title: row.try_get("title")?,
                    avg_completion_rate: row.try_get("avg_completion_rate")?,
                    unique_viewers: row.try_get("unique_viewers")?,
                    total_views: row.try_get("total_views")?,
                    engagement_rate: row.try_get("engagement_rate")?,
                })
            })
            .collect()
    }

    #[instrument(skip(self))]
    async fn popularity_stats(&self) -> Result<Vec<PopularityStats>> {
        let query = format!(
            r#"
            SELECT
                v.id AS video_id,
                v.title,
                v.view_count,
                v.like_count,
                AVG({WATCH_PCT_SQL}) AS avg_watch_percentage
            FROM videos v
            LEFT JOIN video_views vv ON v.id = vv.video_id
            WHERE v.is_active = TRUE
            GROUP BY v.id
            "#
        );
        let rows = sqlx::query(&query).fetch_all(&self.pool).await?;

        rows.iter()
            .map(|row| {
                Ok(PopularityStats {
                    video_id: row.try_get("video_id")?,
                    title: row.try_get("title")?,
                    view_count: row.try_get("view_count")?,
                    like_count: row.try_get("like_count")?,
                    avg_watch_percentage: row.try_get("avg_watch_percentage")?,
                })
            })
            .collect()
    }
}

#[async_trait]
impl PreferenceStore for PgStore {
    #[instrument(skip(self))]
    async fn fetch_profile(&self, user_id: UserId) -> Result<Option<UserPreferenceProfile>> {
        let row = sqlx::query(
            r#"
            SELECT preferred_categories, time_preferences, content_preferences, updated_at
            FROM user_preferences
            WHERE user_id = $1
            "#,
        )
        .bind(user_id)
        .fetch_optional(&self.pool)
        .await?;

        let Some(row) = row else {
            return Ok(None);
        };

        let categories: serde_json::Value = row.try_get("preferred_categories")?;
        let time: serde_json::Value = row.try_get("time_preferences")?;
        let content: serde_json::Value = row.try_get("content_preferences")?;
        let updated_at: Option<DateTime<Utc>> = row.try_get("updated_at")?;

        Ok(Some(UserPreferenceProfile::from_documents(
            user_id,
            &categories,
            &time,
            &content,
            updated_at,
        )))
    }

    #[instrument(skip(self, profiles), fields(count = profiles.len()))]
    async fn upsert_profiles(&self, profiles: &[UserPreferenceProfile]) -> Result<usize> {
        let mut tx = self.pool.begin().await?;

        for profile in profiles {
            sqlx::query(
                r#"
                INSERT INTO user_preferences
                    (user_id, preferred_categories, watch_patterns, time_preferences,
                     content_preferences, updated_at)
                VALUES ($1, $2, '{}'::jsonb, $3, $4, NOW())
                ON CONFLICT (user_id) DO UPDATE SET
                    preferred_categories = EXCLUDED.preferred_categories,
                    watch_patterns = EXCLUDED.watch_patterns,
                    time_preferences = EXCLUDED.time_preferences,
                    content_preferences = EXCLUDED.content_preferences,
                    updated_at = NOW()
                "#,
            )
            .bind(profile.user_id)
            .bind(serde_json::to_value(&profile.preferred_categories)?)
            .bind(profile.time_preferences())
            .bind(profile.content_preferences())
            .execute(&mut *tx)
            .await?;
        }

        tx.commit().await?;
        Ok(profiles.len())
    }
}

#[async_trait]
impl RecommendationCacheStore for PgStore {
    async fn upsert(&self, entry: &RecommendationCacheEntry) -> Result<()> {
        sqlx::query(
            r#"
            INSERT INTO recommendation_cache (user_id, video_id, recommendation_score, expires_at)
            VALUES ($1, $2, $3, $4)
            ON CONFLICT (user_id, video_id) DO UPDATE SET
                recommendation_score = EXCLUDED.recommendation_score,
                expires_at = EXCLUDED.expires_at
            "#,
        )
        .bind(entry.user_id)
        .bind(entry.video_id)
        .bind(entry.score)
        .bind(entry.expires_at)
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    #[instrument(skip(self))]
    async fn fetch_unexpired(
        &self,
        user_id: UserId,
        limit: usize,
        now: DateTime<Utc>,
    ) -> Result<Vec<RecommendationCacheEntry>> {
        let rows = sqlx::query(
            r#"
            SELECT video_id, recommendation_score, expires_at
            FROM recommendation_cache
            WHERE user_id = $1 AND expires_at > $2
            ORDER BY recommendation_score DESC, video_id ASC
            LIMIT $3
            "#,
        )
        .bind(user_id)
        .bind(now)
        .bind(limit as i64)
        .fetch_all(&self.pool)
        .await?;

        rows.iter()
            .map(|row| {
                Ok(RecommendationCacheEntry {
                    user_id,
                    video_id: row.try_get("video_id")?,
                    score: row.try_get("recommendation_score")?,
                    expires_at: row.try_get("expires_at")?,
                })
            })
            .collect()
    }
}
