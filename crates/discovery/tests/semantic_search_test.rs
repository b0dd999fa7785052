//! Semantic search service tests with a deterministic bag-of-words embedder

use anyhow::Result;
use async_trait::async_trait;
use std::sync::atomic::{AtomicBool, AtomicU64, AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;
use vidrec_core::{EngineError, MemoryStore, SemanticConfig, UserPreferenceProfile, VideoMetadata};
use vidrec_discovery::search::SIMILAR_REASON;
use vidrec_discovery::{
    index::SNAPSHOT_FILE, IndexStats, PersonalizationOutcome, SemanticSearchService, TextEmbedder,
};

const DIMENSION: usize = 256;

/// Hashes each lowercase word into a bucket
#[derive(Default)]
struct HashingEmbedder {
    batches: AtomicUsize,
    failing: AtomicBool,
    delay_ms: AtomicU64,
}

impl HashingEmbedder {
    fn vectorize(text: &str) -> Vec<f32> {
        let mut v = vec![0.0; DIMENSION];
        for word in text
            .to_lowercase()
            .split(|c: char| !c.is_alphanumeric())
            .filter(|w| !w.is_empty())
        {
            let hash = word
                .bytes()
                .fold(0xcbf2_9ce4_8422_2325_u64, |h, b| (h ^ b as u64).wrapping_mul(0x100_0000_01b3));
            v[(hash % DIMENSION as u64) as usize] += 1.0;
        }
        v
    }
}

#[async_trait]
impl TextEmbedder for HashingEmbedder {
    fn model_name(&self) -> &str {
        "hashing-test"
    }

    fn dimension(&self) -> usize {
        DIMENSION
    }

    async fn embed_batch(&self, texts: &[String]) -> vidrec_core::Result<Vec<Vec<f32>>> {
        if self.failing.load(Ordering::SeqCst) {
            return Err(EngineError::Embedding("model unavailable".into()));
        }
        self.batches.fetch_add(1, Ordering::SeqCst);
        let delay = self.delay_ms.load(Ordering::SeqCst);
        if delay > 0 {
            tokio::time::sleep(Duration::from_millis(delay)).await;
        }
        Ok(texts.iter().map(|t| Self::vectorize(t)).collect())
    }
}

fn video(id: i64, title: &str, category: &str, duration: i32) -> VideoMetadata {
    let mut v = VideoMetadata::new(id, title);
    v.category_id = Some(id);
    v.category_name = Some(category.to_string());
    v.duration = Some(duration);
    v.view_count = 100 - id;
    v
}

async fn catalog() -> Arc<MemoryStore> {
    let store = Arc::new(MemoryStore::new());
    store.insert_video(video(1, "Quick Tutorial", "Education", 200)).await;
    store.insert_video(video(2, "Guitar lesson for beginners", "Music", 900)).await;
    store.insert_video(video(3, "Guitar solo tutorial", "Music", 2400)).await;
    store.insert_video(video(4, "Evening news roundup", "News", 1200)).await;
    store
}

fn config(dir: &std::path::Path) -> SemanticConfig {
    SemanticConfig {
        index_dir: dir.to_path_buf(),
        dimension: DIMENSION,
        ..SemanticConfig::default()
    }
}

fn service(
    store: &Arc<MemoryStore>,
    embedder: &Arc<HashingEmbedder>,
    config: SemanticConfig,
) -> SemanticSearchService {
    SemanticSearchService::new(embedder.clone(), store.clone(), store.clone(), config)
}

#[tokio::test]
async fn test_short_tutorial_query_explains_short_format() -> Result<()> {
    let dir = tempfile::tempdir()?;
    let store = Arc::new(MemoryStore::new());
    store.insert_video(video(1, "Quick Tutorial", "Education", 200)).await;
    let embedder = Arc::new(HashingEmbedder::default());
    let service = service(&store, &embedder, config(dir.path()));

    let response = service.search_semantic("short tutorial", 10, None, None).await?;
    assert_eq!(response.results.len(), 1);
    let hit = &response.results[0];
    assert!(hit.similarity_score > 0.1);
    assert!(hit.relevance_reason.contains("Short video format"));
    assert_eq!(hit.duration, Some(200));
    assert_eq!(response.personalization, None);
    Ok(())
}

#[tokio::test]
async fn test_results_are_ranked_and_thresholded() -> Result<()> {
    let dir = tempfile::tempdir()?;
    let store = catalog().await;
    let embedder = Arc::new(HashingEmbedder::default());
    let service = service(&store, &embedder, config(dir.path()));

    let response = service.search_semantic("guitar", 10, None, None).await?;
    let ids: Vec<_> = response.results.iter().map(|r| r.video_id).collect();
    assert!(ids.contains(&2) && ids.contains(&3));
    assert!(!ids.contains(&4));
    for pair in response.results.windows(2) {
        assert!(pair[0].similarity_score >= pair[1].similarity_score);
    }

    let none = service.search_semantic("guitar", 10, Some(1.0), None).await?;
    assert!(none.results.is_empty());
    Ok(())
}

#[tokio::test]
async fn test_preferences_boost_matching_category() -> Result<()> {
    let dir = tempfile::tempdir()?;
    let store = catalog().await;
    let mut profile = UserPreferenceProfile::empty(9);
    profile.preferred_categories = vec!["Music".to_string()];
    store.insert_profile(profile).await;

    let embedder = Arc::new(HashingEmbedder::default());
    let service = service(&store, &embedder, config(dir.path()));

    let plain = service.search_semantic("tutorial", 10, None, None).await?;
    let personal = service.search_semantic("tutorial", 10, None, Some(9)).await?;

    assert!(matches!(
        personal.personalization,
        Some(PersonalizationOutcome::Boosted { .. })
    ));
    let before = plain.results.iter().find(|r| r.video_id == 3).expect("hit");
    let after = personal.results.iter().find(|r| r.video_id == 3).expect("hit");
    assert!((after.similarity_score - before.similarity_score * 1.3).abs() < 1e-5);
    assert!(after.personalized);
    assert!(after.relevance_reason.ends_with("Matches your preferences"));

    let unknown = service.search_semantic("tutorial", 10, None, Some(404)).await?;
    assert_eq!(unknown.personalization, Some(PersonalizationOutcome::PassThrough));
    assert_eq!(unknown.results, plain.results);
    Ok(())
}

#[tokio::test]
async fn test_find_similar_excludes_seed() -> Result<()> {
    let dir = tempfile::tempdir()?;
    let store = catalog().await;
    let embedder = Arc::new(HashingEmbedder::default());
    let service = service(&store, &embedder, config(dir.path()));

    let similar = service.search_similar_to_item(2, 2).await?;
    assert_eq!(similar.len(), 2);
    assert!(similar.iter().all(|s| s.video_id != 2));
    assert_eq!(similar[0].video_id, 3);
    assert_eq!(similar[0].reason, SIMILAR_REASON);

    assert!(service.search_similar_to_item(404, 5).await?.is_empty());
    Ok(())
}

#[tokio::test]
async fn test_snapshot_is_reused_unless_forced() -> Result<()> {
    let dir = tempfile::tempdir()?;
    let store = catalog().await;

    let first_embedder = Arc::new(HashingEmbedder::default());
    let first = service(&store, &first_embedder, config(dir.path()));
    assert_eq!(first.index_stats().await, IndexStats::NotBuilt);
    let built = first.rebuild_embedding_index(true).await?;
    assert!(dir.path().join(SNAPSHOT_FILE).exists());

    let second_embedder = Arc::new(HashingEmbedder::default());
    let second = service(&store, &second_embedder, config(dir.path()));
    let loaded = second.rebuild_embedding_index(false).await?;
    assert_eq!(loaded, built);
    assert_eq!(second_embedder.batches.load(Ordering::SeqCst), 0);

    let forced = second.rebuild_embedding_index(true).await?;
    assert_ne!(forced, built);
    assert_eq!(second_embedder.batches.load(Ordering::SeqCst), 1);
    match forced {
        IndexStats::Ready {
            total_videos,
            dimension,
            ..
        } => {
            assert_eq!(total_videos, 4);
            assert_eq!(dimension, DIMENSION);
        }
        IndexStats::NotBuilt => panic!("index should be ready"),
    }
    Ok(())
}

#[tokio::test]
async fn test_persist_failure_keeps_index_in_memory() -> Result<()> {
    let dir = tempfile::tempdir()?;
    let blocker = dir.path().join("not-a-dir");
    std::fs::write(&blocker, b"file")?;

    let store = catalog().await;
    let embedder = Arc::new(HashingEmbedder::default());
    let service = service(&store, &embedder, config(&blocker.join("index")));

    service.rebuild_embedding_index(true).await?;
    let response = service.search_semantic("guitar", 5, None, None).await?;
    assert!(!response.results.is_empty());
    Ok(())
}

#[tokio::test]
async fn test_failed_rebuild_keeps_previous_index() -> Result<()> {
    let dir = tempfile::tempdir()?;
    let store = catalog().await;
    let embedder = Arc::new(HashingEmbedder::default());
    let service = service(&store, &embedder, config(dir.path()));

    let before = service.rebuild_embedding_index(true).await?;
    embedder.failing.store(true, Ordering::SeqCst);

    let err = service
        .rebuild_embedding_index(true)
        .await
        .expect_err("embedding model is down");
    assert!(err.is_upstream());
    assert_eq!(service.index_stats().await, before);
    Ok(())
}

#[tokio::test]
async fn test_empty_catalog_searches_to_nothing() -> Result<()> {
    let dir = tempfile::tempdir()?;
    let store = Arc::new(MemoryStore::new());
    let embedder = Arc::new(HashingEmbedder::default());
    let service = service(&store, &embedder, config(dir.path()));

    let response = service.search_semantic("anything", 10, None, None).await?;
    assert!(response.results.is_empty());
    assert!(!dir.path().join(SNAPSHOT_FILE).exists());
    Ok(())
}

#[tokio::test]
async fn test_slow_lazy_build_is_not_ready_then_serves() -> Result<()> {
    let dir = tempfile::tempdir()?;
    let store = catalog().await;
    let embedder = Arc::new(HashingEmbedder::default());
    embedder.delay_ms.store(150, Ordering::SeqCst);
    let service = service(
        &store,
        &embedder,
        SemanticConfig {
            lazy_build_timeout_ms: 30,
            ..config(dir.path())
        },
    );

    for _ in 0..2 {
        let err = service
            .search_semantic("guitar", 5, None, None)
            .await
            .expect_err("index still building");
        assert!(matches!(err, EngineError::IndexNotReady(_)));
        assert!(!err.is_upstream());
    }

    tokio::time::sleep(Duration::from_millis(400)).await;
    assert!(matches!(service.index_stats().await, IndexStats::Ready { .. }));
    // one catalog embedding, shared by both waiting callers
    assert_eq!(embedder.batches.load(Ordering::SeqCst), 1);

    embedder.delay_ms.store(0, Ordering::SeqCst);
    let response = service.search_semantic("guitar", 5, None, None).await?;
    assert!(!response.results.is_empty());
    assert!(dir.path().join(SNAPSHOT_FILE).exists());
    Ok(())
}
