//! Hybrid recommendation engine
//!
//! Builds a time-decayed user-item matrix and its item-item similarity
//! matrix from recent watch history, and serves collaborative, content-based
//! and popularity rankings fused into one cached list per user.
//!
//! The interaction model is an immutable snapshot: rebuilds construct a new
//! one and swap it in, so readers never observe a half-built model. A model
//! is built lazily on the first query when none exists yet.

pub mod cache;
pub mod collaborative;
pub mod content_based;
pub mod features;
pub mod hybrid;
pub mod insights;
pub mod matrix;
pub mod model;
pub mod popularity;
pub mod profiles;
pub mod realtime;
pub mod similarity;
pub mod types;

pub use cache::{build_cache_store, RedisRecommendationCache};
pub use features::{FeatureSet, InteractionFeatures};
pub use hybrid::BlendWeights;
pub use insights::{InsightReport, UserInsights};
pub use matrix::UserItemMatrix;
pub use model::{InteractionModel, ModelSlot, ModelStats};
pub use profiles::ProfileBuildReport;
pub use realtime::RealTimeFeatures;
pub use similarity::ItemSimilarityMatrix;
pub use types::{CollaborativeOutcome, FallbackReason, RecommendationSource, RecommendationSet};

use chrono::{DateTime, Utc};
use std::sync::Arc;
use std::time::Instant;
use tracing::{debug, info, instrument, warn};
use vidrec_core::{
    CatalogSource, EngineConfig, EngineError, InteractionSource, PreferenceStore, ProfileConfig,
    Recommendation, RecommendationCacheEntry, RecommendationCacheStore, RecommendationConfig,
    Result, UserId, VideoId,
};

/// Reason attached to recommendations served from the cache
const CACHED_REASON: &str = "Personalized recommendation";

/// The data store contracts the engine reads from and writes to
#[derive(Clone)]
pub struct EngineStores {
    pub interactions: Arc<dyn InteractionSource>,
    pub catalog: Arc<dyn CatalogSource>,
    pub preferences: Arc<dyn PreferenceStore>,
    pub cache: Arc<dyn RecommendationCacheStore>,
}

impl EngineStores {
    /// Use one store for every contract
    pub fn from_store<S>(store: Arc<S>) -> Self
    where
        S: InteractionSource + CatalogSource + PreferenceStore + RecommendationCacheStore + 'static,
    {
        Self {
            interactions: store.clone(),
            catalog: store.clone(),
            preferences: store.clone(),
            cache: store,
        }
    }

    pub fn with_cache(mut self, cache: Arc<dyn RecommendationCacheStore>) -> Self {
        self.cache = cache;
        self
    }
}

/// Recommendation engine instance
pub struct RecommendationEngine {
    stores: EngineStores,
    config: RecommendationConfig,
    profiles: ProfileConfig,
    cache_ttl: chrono::Duration,
    model: Arc<ModelSlot>,
}

/// What a model build reads, owned so a lazy build can finish on its own task
struct ModelBuilder {
    interactions: Arc<dyn InteractionSource>,
    window_days: u32,
    decay_days: f64,
}

impl ModelBuilder {
    async fn build(self) -> Result<InteractionModel> {
        let started = Instant::now();
        let records = self
            .interactions
            .fetch_interactions(self.window_days)
            .await?;
        let model = InteractionModel::build(&records, Utc::now(), self.window_days, self.decay_days);

        info!(
            version = %model.version,
            interactions = records.len(),
            users = model.matrix.num_users(),
            items = model.matrix.num_items(),
            elapsed_ms = started.elapsed().as_millis() as u64,
            "Interaction model built"
        );
        Ok(model)
    }
}

impl RecommendationEngine {
    pub fn new(stores: EngineStores, config: &EngineConfig) -> Self {
        Self {
            stores,
            config: config.recommendation.clone(),
            profiles: config.profiles.clone(),
            cache_ttl: chrono::Duration::seconds(config.cache.ttl_sec as i64),
            model: Arc::new(ModelSlot::new()),
        }
    }

    fn blend_weights(&self) -> BlendWeights {
        BlendWeights {
            collaborative: f64::from(self.config.collaborative_weight),
            content: f64::from(self.config.content_weight),
        }
    }

    fn check_limit(&self, n: usize) -> Result<()> {
        if n > self.config.max_recommendations {
            return Err(EngineError::InvalidArgument(format!(
                "requested {} recommendations, limit is {}",
                n, self.config.max_recommendations
            )));
        }
        Ok(())
    }

    /// Current model snapshot, if one has been built
    pub async fn model_stats(&self) -> Option<ModelStats> {
        self.model.current().await.map(|m| m.stats())
    }

    fn model_builder(&self) -> ModelBuilder {
        ModelBuilder {
            interactions: Arc::clone(&self.stores.interactions),
            window_days: self.config.window_days,
            decay_days: self.config.decay_days,
        }
    }

    /// Rebuild the interaction model over the configured window and swap it in.
    ///
    /// On failure the previous snapshot keeps serving.
    #[instrument(skip(self))]
    pub async fn rebuild_interaction_model(&self) -> Result<ModelStats> {
        let _guard = self.model.lock_rebuild().await;
        let model = self.model_builder().build().await?;
        Ok(self.model.swap(model).await.stats())
    }

    /// The current model, building one first when none exists.
    ///
    /// Waits for a lazy build up to the configured timeout; `None` means no
    /// model is available yet. The build carries on in the background and
    /// serves later queries once it finishes.
    async fn current_or_build(&self) -> Result<Option<Arc<InteractionModel>>> {
        let model = self
            .model
            .get_or_build(self.config.lazy_build_timeout(), self.model_builder().build())
            .await?;
        if model.is_none() {
            warn!(
                timeout_ms = self.config.lazy_build_timeout_ms,
                "Interaction model not ready within lazy build timeout"
            );
        }
        Ok(model)
    }

    async fn collaborative_outcome(&self, user_id: UserId, n: usize) -> Result<CollaborativeOutcome> {
        let Some(model) = self.current_or_build().await? else {
            return Ok(CollaborativeOutcome::NoPersonalization(
                FallbackReason::ModelNotReady,
            ));
        };
        Ok(collaborative::recommend(
            &model,
            user_id,
            n,
            f64::from(self.config.min_similarity),
        ))
    }

    /// Global popularity ranking
    #[instrument(skip(self))]
    pub async fn recommend_popular(&self, n: usize) -> Result<RecommendationSet> {
        self.check_limit(n)?;
        let recommendations = popularity::recommend(self.stores.catalog.as_ref(), n).await?;
        Ok(RecommendationSet::new(
            RecommendationSource::PopularityFallback,
            recommendations,
        ))
    }

    /// Collaborative ranking, falling back to popularity when the user
    /// cannot be personalized
    #[instrument(skip(self))]
    pub async fn recommend_collaborative(
        &self,
        user_id: UserId,
        n: usize,
    ) -> Result<RecommendationSet> {
        self.check_limit(n)?;
        match self.collaborative_outcome(user_id, n).await? {
            CollaborativeOutcome::Personalized(recs) => Ok(RecommendationSet::new(
                RecommendationSource::Collaborative,
                recs,
            )),
            CollaborativeOutcome::NoPersonalization(reason) => {
                let recs = popularity::recommend(self.stores.catalog.as_ref(), n).await?;
                Ok(
                    RecommendationSet::new(RecommendationSource::PopularityFallback, recs)
                        .with_fallback(reason),
                )
            }
        }
    }

    /// Category peers of `video_id`
    #[instrument(skip(self))]
    pub async fn recommend_content_based(
        &self,
        video_id: VideoId,
        n: usize,
    ) -> Result<Vec<Recommendation>> {
        self.check_limit(n)?;
        content_based::recommend(self.stores.catalog.as_ref(), video_id, n).await
    }

    /// Compute a hybrid list without touching the cache.
    ///
    /// Collaborative candidates (`2n`) are fused with content-based
    /// candidates (`n / 2`) for the context video. Without personalization
    /// data the popularity ranking takes the collaborative slot; with no
    /// context video either, the popularity ranking is returned as is.
    pub async fn compute_hybrid(
        &self,
        user_id: UserId,
        context_video: Option<VideoId>,
        n: usize,
    ) -> Result<RecommendationSet> {
        self.check_limit(n)?;
        if n == 0 {
            return Ok(RecommendationSet::new(RecommendationSource::Hybrid, Vec::new()));
        }

        let content = match context_video {
            Some(video_id) => {
                content_based::recommend(self.stores.catalog.as_ref(), video_id, n / 2).await?
            }
            None => Vec::new(),
        };

        let set = match self.collaborative_outcome(user_id, n * 2).await? {
            CollaborativeOutcome::Personalized(collab) => {
                let source = if context_video.is_some() {
                    RecommendationSource::Hybrid
                } else {
                    RecommendationSource::Collaborative
                };
                RecommendationSet::new(source, hybrid::merge(collab, content, self.blend_weights(), n))
            }
            CollaborativeOutcome::NoPersonalization(reason) if context_video.is_none() => {
                let popular = popularity::recommend(self.stores.catalog.as_ref(), n).await?;
                RecommendationSet::new(RecommendationSource::PopularityFallback, popular)
                    .with_fallback(reason)
            }
            CollaborativeOutcome::NoPersonalization(reason) => {
                let popular = popularity::recommend(self.stores.catalog.as_ref(), n * 2).await?;
                RecommendationSet::new(
                    RecommendationSource::Hybrid,
                    hybrid::merge(popular, content, self.blend_weights(), n),
                )
                .with_fallback(reason)
            }
        };

        debug!(
            user_id,
            source = ?set.source,
            fallback = ?set.fallback,
            results = set.recommendations.len(),
            "Computed hybrid recommendations"
        );
        Ok(set)
    }

    /// Write `recommendations` to the cache. Failures are logged, not returned.
    pub async fn cache_store(
        &self,
        user_id: UserId,
        recommendations: &[Recommendation],
        now: DateTime<Utc>,
    ) {
        if recommendations.is_empty() {
            return;
        }
        let expires_at = now + self.cache_ttl;
        let entries: Vec<RecommendationCacheEntry> = recommendations
            .iter()
            .map(|r| RecommendationCacheEntry {
                user_id,
                video_id: r.video_id,
                score: r.score,
                expires_at,
            })
            .collect();

        if let Err(e) = self.stores.cache.upsert_many(&entries).await {
            warn!(user_id, error = %e, "Failed to cache recommendations");
        }
    }

    /// Hybrid recommendations for `user_id`, served from the cache when
    /// unexpired entries exist. Only personalized results are cached.
    #[instrument(skip(self))]
    pub async fn recommend_hybrid(
        &self,
        user_id: UserId,
        context_video: Option<VideoId>,
        n: usize,
    ) -> Result<RecommendationSet> {
        self.check_limit(n)?;
        if n == 0 {
            return Ok(RecommendationSet::new(RecommendationSource::Hybrid, Vec::new()));
        }

        let now = Utc::now();
        let cached = match self.stores.cache.fetch_unexpired(user_id, n, now).await {
            Ok(entries) => entries,
            Err(e) => {
                warn!(user_id, error = %e, "Recommendation cache read failed, recomputing");
                Vec::new()
            }
        };
        if !cached.is_empty() {
            debug!(user_id, hits = cached.len(), "Serving cached recommendations");
            let recs = cached
                .into_iter()
                .map(|e| Recommendation::new(e.video_id, e.score, CACHED_REASON))
                .collect();
            return Ok(RecommendationSet::new(RecommendationSource::Cache, recs));
        }

        let set = self.compute_hybrid(user_id, context_video, n).await?;
        // fallback lists are not cached, so a cache hit is always personalized
        if set.is_personalized() {
            self.cache_store(user_id, &set.recommendations, now).await;
        }

        info!(
            user_id,
            results = set.recommendations.len(),
            source = ?set.source,
            "Generated hybrid recommendations"
        );
        Ok(set)
    }

    /// Rebuild every user's preference profile from the last `window_days`
    #[instrument(skip(self))]
    pub async fn build_user_profiles(&self, window_days: u32) -> Result<ProfileBuildReport> {
        let started = Instant::now();
        let records = self
            .stores
            .interactions
            .fetch_interactions(window_days)
            .await?;

        let features = FeatureSet::compute(&records);
        let built = profiles::build_profiles(&features, self.profiles.top_categories, Utc::now());
        let profiles_written = if built.is_empty() {
            0
        } else {
            self.stores.preferences.upsert_profiles(&built).await?
        };

        let report = ProfileBuildReport {
            window_days,
            total_interactions: records.len(),
            profiles_written,
            elapsed_ms: started.elapsed().as_millis(),
        };
        info!(
            window_days,
            interactions = report.total_interactions,
            profiles = report.profiles_written,
            elapsed_ms = report.elapsed_ms as u64,
            "User profiles rebuilt"
        );
        Ok(report)
    }

    /// Scoring inputs from the user's last week of activity for `video_id`
    #[instrument(skip(self))]
    pub async fn real_time_features(
        &self,
        user_id: UserId,
        video_id: VideoId,
    ) -> Result<RealTimeFeatures> {
        let records = self
            .stores
            .interactions
            .fetch_user_interactions(user_id, realtime::RECENT_WINDOW_DAYS)
            .await?;
        if records.is_empty() {
            return Ok(RealTimeFeatures::default());
        }

        let features = FeatureSet::compute(&records);
        let rows: Vec<&InteractionFeatures> = features.for_user(user_id).collect();
        let target = self.stores.catalog.fetch_video(video_id).await?;
        Ok(RealTimeFeatures::compute(
            &rows,
            target.as_ref(),
            Utc::now().date_naive(),
        ))
    }

    /// Behaviour summary over the user's last `days`, 30 when not given
    #[instrument(skip(self))]
    pub async fn user_insights(&self, user_id: UserId, days: Option<u32>) -> Result<UserInsights> {
        let days = days.unwrap_or(insights::DEFAULT_INSIGHT_DAYS);
        let records = self
            .stores
            .interactions
            .fetch_user_interactions(user_id, days)
            .await?;
        let features = FeatureSet::compute(&records);
        let rows: Vec<&InteractionFeatures> = features.for_user(user_id).collect();
        Ok(insights::summarize(&rows))
    }
}
