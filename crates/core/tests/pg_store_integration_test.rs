//! Integration tests for the PostgreSQL store
//!
//! These tests need a running PostgreSQL instance reachable through
//! DATABASE_URL. Run with: cargo test -p vidrec-core --test pg_store_integration_test -- --ignored

use anyhow::Result;
use chrono::{Duration, Utc};
use rand::Rng;
use sqlx::Row;
use vidrec_core::{
    CatalogSource, DatabaseConfig, DatabasePool, InteractionSource, PgStore, PreferenceStore,
    RecommendationCacheEntry, RecommendationCacheStore, UserPreferenceProfile,
};

async fn setup_store() -> Result<PgStore> {
    let config = DatabaseConfig {
        url: std::env::var("DATABASE_URL")
            .unwrap_or_else(|_| "postgresql://localhost/vidrec_test".to_string()),
        ..DatabaseConfig::default()
    };
    let db = DatabasePool::new(&config).await?;
    db.run_migrations().await?;
    Ok(PgStore::new(db.pool().clone()))
}

fn random_user() -> i64 {
    rand::thread_rng().gen_range(1_000_000..i64::MAX / 2)
}

#[tokio::test]
#[ignore]
async fn test_cache_upsert_keeps_latest_score() -> Result<()> {
    let store = setup_store().await?;
    let user_id = random_user();
    let now = Utc::now();

    let mut entry = RecommendationCacheEntry {
        user_id,
        video_id: 42,
        score: 0.3,
        expires_at: now + Duration::hours(1),
    };
    store.upsert(&entry).await?;
    entry.score = 0.8;
    store.upsert(&entry).await?;

    let rows = store.fetch_unexpired(user_id, 10, now).await?;
    assert_eq!(rows.len(), 1);
    assert_eq!(rows[0].score, 0.8);

    let expired = store
        .fetch_unexpired(user_id, 10, now + Duration::hours(2))
        .await?;
    assert!(expired.is_empty());

    sqlx::query("DELETE FROM recommendation_cache WHERE user_id = $1")
        .bind(user_id)
        .execute(store.pool())
        .await?;
    Ok(())
}

#[tokio::test]
#[ignore]
async fn test_profile_upsert_overwrites() -> Result<()> {
    let store = setup_store().await?;
    let user_id = random_user();

    let mut profile = UserPreferenceProfile::empty(user_id);
    profile.preferred_categories = vec!["Music".into(), "News".into()];
    store.upsert_profiles(&[profile.clone()]).await?;

    profile.preferred_categories = vec!["Gaming".into()];
    profile.preferred_hour = 22;
    store.upsert_profiles(&[profile]).await?;

    let stored = store.fetch_profile(user_id).await?.expect("profile stored");
    assert_eq!(stored.preferred_categories, vec!["Gaming".to_string()]);
    assert_eq!(stored.preferred_hour, 22);
    assert!(stored.updated_at.is_some());

    sqlx::query("DELETE FROM user_preferences WHERE user_id = $1")
        .bind(user_id)
        .execute(store.pool())
        .await?;
    Ok(())
}

#[tokio::test]
#[ignore]
async fn test_interactions_join_video_metadata() -> Result<()> {
    let store = setup_store().await?;
    let user_id = random_user();

    let category_id: i64 =
        sqlx::query("INSERT INTO categories (name) VALUES ('Integration') RETURNING id")
            .fetch_one(store.pool())
            .await?
            .try_get("id")?;
    let video_id: i64 = sqlx::query(
        "INSERT INTO videos (title, category_id, duration, view_count, like_count) \
         VALUES ('Integration video', $1, 300, 10, 2) RETURNING id",
    )
    .bind(category_id)
    .fetch_one(store.pool())
    .await?
    .try_get("id")?;
    sqlx::query(
        "INSERT INTO video_views (user_id, video_id, watch_duration, total_duration, completed) \
         VALUES ($1, $2, 150, 300, FALSE)",
    )
    .bind(user_id)
    .bind(video_id)
    .execute(store.pool())
    .await?;

    let records = store.fetch_user_interactions(user_id, 7).await?;
    assert_eq!(records.len(), 1);
    assert_eq!(records[0].category_name.as_deref(), Some("Integration"));
    assert_eq!(records[0].watch_percentage(), 50.0);

    let videos = store.fetch_videos(&[video_id]).await?;
    assert_eq!(videos[&video_id].duration, Some(300));

    sqlx::query("DELETE FROM videos WHERE id = $1")
        .bind(video_id)
        .execute(store.pool())
        .await?;
    sqlx::query("DELETE FROM categories WHERE id = $1")
        .bind(category_id)
        .execute(store.pool())
        .await?;
    Ok(())
}
