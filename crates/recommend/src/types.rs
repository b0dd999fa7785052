//! Tagged outcomes of the recommendation paths

use serde::Serialize;
use vidrec_core::Recommendation;

/// Which path produced a recommendation list
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum RecommendationSource {
    /// Served from unexpired cache rows
    Cache,
    /// Collaborative candidates only
    Collaborative,
    /// Collaborative and content-based candidates fused
    Hybrid,
    /// No personalization data; global popularity ranking
    PopularityFallback,
}

/// Why collaborative filtering could not personalize
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum FallbackReason {
    /// The interaction window holds no data
    EmptyModel,
    /// The user has no interactions in the window
    UnknownUser,
    /// The user has no positively scored items
    NoSeedItems,
    /// No model was available within the lazy build timeout
    ModelNotReady,
}

/// Result of the collaborative scorer before any fallback is applied
#[derive(Debug, Clone, PartialEq)]
pub enum CollaborativeOutcome {
    Personalized(Vec<Recommendation>),
    NoPersonalization(FallbackReason),
}

/// A ranked list tagged with the path that produced it
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RecommendationSet {
    pub source: RecommendationSource,
    pub fallback: Option<FallbackReason>,
    pub recommendations: Vec<Recommendation>,
}

impl RecommendationSet {
    pub fn new(source: RecommendationSource, recommendations: Vec<Recommendation>) -> Self {
        Self {
            source,
            fallback: None,
            recommendations,
        }
    }

    pub fn with_fallback(mut self, reason: FallbackReason) -> Self {
        self.fallback = Some(reason);
        self
    }

    /// False for popularity rankings and for any list built after a fallback
    pub fn is_personalized(&self) -> bool {
        self.fallback.is_none() && self.source != RecommendationSource::PopularityFallback
    }

    pub fn video_ids(&self) -> Vec<vidrec_core::VideoId> {
        self.recommendations.iter().map(|r| r.video_id).collect()
    }
}
