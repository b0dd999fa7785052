//! Semantic retrieval over video content
//!
//! Each active video is turned into one searchable text, embedded with a
//! pre-trained model and kept in an immutable [`EmbeddingIndex`] snapshot.
//! Queries are embedded with the same model and ranked by cosine similarity;
//! results can be re-ranked with a user's stored category preferences.
//!
//! The index is persisted to disk after every build and reloaded on start
//! when it was built by the configured model.

pub mod embedding;
pub mod index;
pub mod personalization;
pub mod search;

pub use embedding::{EmbeddingClient, TextEmbedder};
pub use index::{EmbeddingIndex, IndexSlot, IndexedVideo};
pub use personalization::PersonalizationOutcome;
pub use search::{SearchResult, SimilarVideo};

use chrono::{DateTime, Utc};
use serde::Serialize;
use std::collections::HashMap;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Instant;
use tracing::{info, instrument, warn};
use uuid::Uuid;
use vidrec_core::{
    CatalogSource, EngineError, PreferenceStore, Result, SemanticConfig, UserId, VideoId,
};

/// Ranked search hits, with the personalization path taken when a user was given
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SearchResponse {
    pub results: Vec<SearchResult>,
    pub personalization: Option<PersonalizationOutcome>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum IndexStats {
    NotBuilt,
    Ready {
        total_videos: usize,
        dimension: usize,
        model: String,
        version: Uuid,
        built_at: DateTime<Utc>,
        index_dir: PathBuf,
    },
}

pub struct SemanticSearchService {
    embedder: Arc<dyn TextEmbedder>,
    catalog: Arc<dyn CatalogSource>,
    preferences: Arc<dyn PreferenceStore>,
    config: SemanticConfig,
    index: Arc<IndexSlot>,
}

/// What an index build reads, owned so a lazy build can finish on its own task
struct IndexBuilder {
    embedder: Arc<dyn TextEmbedder>,
    catalog: Arc<dyn CatalogSource>,
    index_dir: PathBuf,
}

impl IndexBuilder {
    async fn load_snapshot(&self) -> Option<EmbeddingIndex> {
        match EmbeddingIndex::load(&self.index_dir).await {
            Ok(Some(index))
                if index.is_compatible(self.embedder.model_name(), self.embedder.dimension()) =>
            {
                Some(index)
            }
            Ok(Some(index)) => {
                info!(
                    snapshot_model = %index.model,
                    snapshot_videos = index.len(),
                    "Ignoring incompatible index snapshot"
                );
                None
            }
            Ok(None) => None,
            Err(e) => {
                warn!(error = %e, "Failed to load index snapshot, rebuilding");
                None
            }
        }
    }

    /// Unless `force` is set, a compatible snapshot on disk is used instead
    /// of re-embedding the catalog.
    async fn build(self, force: bool) -> Result<EmbeddingIndex> {
        if !force {
            if let Some(index) = self.load_snapshot().await {
                return Ok(index);
            }
        }

        let started = Instant::now();
        let now = Utc::now();
        let mut videos = self.catalog.fetch_active_videos().await?;
        videos.retain(|v| !v.title.trim().is_empty());
        videos.sort_by(|a, b| {
            b.view_count
                .cmp(&a.view_count)
                .then_with(|| b.published_at.cmp(&a.published_at))
                .then_with(|| a.id.cmp(&b.id))
        });

        let entries: Vec<IndexedVideo> = videos.iter().map(IndexedVideo::from_metadata).collect();
        let texts: Vec<String> = entries.iter().map(|e| e.searchable_text(now)).collect();
        let vectors = self.embedder.embed_batch(&texts).await?;
        let index = EmbeddingIndex::new(
            self.embedder.model_name(),
            self.embedder.dimension(),
            entries,
            vectors,
        )?;

        if index.is_empty() {
            warn!("No active videos to index");
        } else if let Err(e) = index.save(&self.index_dir).await {
            warn!(error = %e, "Failed to persist embedding index, keeping it in memory");
        }

        info!(
            version = %index.version,
            videos = index.len(),
            dimension = index.dimension,
            elapsed_ms = started.elapsed().as_millis() as u64,
            "Embedding index built"
        );
        Ok(index)
    }
}

impl SemanticSearchService {
    pub fn new(
        embedder: Arc<dyn TextEmbedder>,
        catalog: Arc<dyn CatalogSource>,
        preferences: Arc<dyn PreferenceStore>,
        config: SemanticConfig,
    ) -> Self {
        Self {
            embedder,
            catalog,
            preferences,
            config,
            index: Arc::new(IndexSlot::new()),
        }
    }

    pub async fn index_stats(&self) -> IndexStats {
        match self.index.current().await {
            None => IndexStats::NotBuilt,
            Some(index) => IndexStats::Ready {
                total_videos: index.len(),
                dimension: index.dimension,
                model: index.model.clone(),
                version: index.version,
                built_at: index.built_at,
                index_dir: self.config.index_dir.clone(),
            },
        }
    }

    fn index_builder(&self) -> IndexBuilder {
        IndexBuilder {
            embedder: Arc::clone(&self.embedder),
            catalog: Arc::clone(&self.catalog),
            index_dir: self.config.index_dir.clone(),
        }
    }

    /// Build the index and swap it in.
    ///
    /// Unless `force` is set, a compatible snapshot on disk is used instead
    /// of re-embedding the catalog.
    #[instrument(skip(self))]
    pub async fn rebuild_embedding_index(&self, force: bool) -> Result<IndexStats> {
        let _guard = self.index.lock_rebuild().await;
        let index = self.index_builder().build(force).await?;
        self.index.swap(index).await;
        Ok(self.index_stats().await)
    }

    /// The current index, loading or building one first when none exists.
    ///
    /// Gives up with `IndexNotReady` after the lazy build timeout; the build
    /// keeps running and serves later queries once it finishes.
    async fn ensure_index(&self) -> Result<Arc<EmbeddingIndex>> {
        self.index
            .get_or_build(self.config.lazy_build_timeout(), self.index_builder().build(false))
            .await?
            .ok_or_else(|| {
                warn!(
                    timeout_ms = self.config.lazy_build_timeout_ms,
                    "Embedding index not ready within lazy build timeout"
                );
                EngineError::IndexNotReady(format!(
                    "index not built within {}ms",
                    self.config.lazy_build_timeout_ms
                ))
            })
    }

    /// Rank indexed videos against `query`.
    ///
    /// `threshold` defaults to the configured similarity threshold. With a
    /// `user_id`, results are re-ranked by that user's preferences.
    #[instrument(skip(self))]
    pub async fn search_semantic(
        &self,
        query: &str,
        top_k: usize,
        threshold: Option<f32>,
        user_id: Option<UserId>,
    ) -> Result<SearchResponse> {
        let index = self.ensure_index().await?;
        if top_k == 0 || index.is_empty() {
            return Ok(SearchResponse {
                results: Vec::new(),
                personalization: None,
            });
        }

        let query_vector = self.embedder.embed(query).await?;
        if query_vector.len() != index.dimension {
            return Err(EngineError::Embedding(format!(
                "query vector has dimension {}, index has {}",
                query_vector.len(),
                index.dimension
            )));
        }

        let threshold = threshold.unwrap_or(self.config.similarity_threshold);
        let ranked = search::rank(&index, &query_vector, Some(threshold), top_k, None);

        let ids: Vec<VideoId> = ranked.iter().map(|(pos, _)| index.entries[*pos].video_id).collect();
        let live = match self.catalog.fetch_videos(&ids).await {
            Ok(live) => live,
            Err(e) => {
                warn!(error = %e, "Failed to load live video details");
                HashMap::new()
            }
        };
        let mut results = search::build_results(&index, &ranked, query, &live, Utc::now());

        let personalization = match user_id {
            Some(user_id) => Some(
                personalization::personalize(
                    self.preferences.as_ref(),
                    &mut results,
                    user_id,
                    self.config.personalization_boost,
                )
                .await,
            ),
            None => None,
        };

        info!(results = results.len(), "Semantic search complete");
        Ok(SearchResponse {
            results,
            personalization,
        })
    }

    /// Videos closest to `video_id` in embedding space, excluding itself.
    /// A video missing from the index has no neighbours.
    #[instrument(skip(self))]
    pub async fn search_similar_to_item(
        &self,
        video_id: VideoId,
        top_k: usize,
    ) -> Result<Vec<SimilarVideo>> {
        let index = self.ensure_index().await?;
        let Some(position) = index.position(video_id) else {
            return Ok(Vec::new());
        };
        let ranked = search::rank(&index, index.vector(position), None, top_k, Some(position));
        Ok(search::similar_videos(&index, &ranked))
    }
}
