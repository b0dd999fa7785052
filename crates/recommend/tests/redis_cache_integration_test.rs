//! Redis recommendation cache against a live server
//!
//! Run with: REDIS_URL=redis://localhost:6379 cargo test -p vidrec-recommend --test redis_cache_integration_test -- --ignored

use anyhow::Result;
use chrono::{Duration, Utc};
use vidrec_core::{CacheBackend, CacheConfig, RecommendationCacheEntry, RecommendationCacheStore};
use vidrec_recommend::RedisRecommendationCache;

async fn setup_cache() -> Result<RedisRecommendationCache> {
    let config = CacheConfig {
        backend: CacheBackend::Redis,
        redis_url: std::env::var("REDIS_URL")
            .unwrap_or_else(|_| "redis://localhost:6379".to_string()),
        key_prefix: format!("reco-test-{}", std::process::id()),
        ..CacheConfig::default()
    };
    Ok(RedisRecommendationCache::new(&config).await?)
}

#[tokio::test]
#[ignore]
async fn test_latest_score_wins_and_expired_fields_are_hidden() -> Result<()> {
    let cache = setup_cache().await?;
    let now = Utc::now();

    let mut entry = RecommendationCacheEntry {
        user_id: 7,
        video_id: 1,
        score: 0.2,
        expires_at: now + Duration::minutes(10),
    };
    cache.upsert(&entry).await?;
    entry.score = 0.9;
    cache.upsert(&entry).await?;

    cache
        .upsert(&RecommendationCacheEntry {
            user_id: 7,
            video_id: 2,
            score: 0.5,
            expires_at: now + Duration::minutes(1),
        })
        .await?;

    let rows = cache.fetch_unexpired(7, 10, now).await?;
    let ids: Vec<_> = rows.iter().map(|r| r.video_id).collect();
    assert_eq!(ids, vec![1, 2]);
    assert_eq!(rows[0].score, 0.9);

    let later = cache
        .fetch_unexpired(7, 10, now + Duration::minutes(5))
        .await?;
    assert_eq!(later.len(), 1);
    assert_eq!(later[0].video_id, 1);
    Ok(())
}
