use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::cmp::Ordering;

use super::{UserId, VideoId};

/// A scored recommendation with a human readable reason
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Recommendation {
    pub video_id: VideoId,
    pub score: f64,
    pub reason: String,
}

impl Recommendation {
    pub fn new(video_id: VideoId, score: f64, reason: impl Into<String>) -> Self {
        Self {
            video_id,
            score,
            reason: reason.into(),
        }
    }
}

/// Score descending, then video id ascending
pub fn rank_order(a_score: f64, a_id: VideoId, b_score: f64, b_id: VideoId) -> Ordering {
    b_score
        .partial_cmp(&a_score)
        .unwrap_or(Ordering::Equal)
        .then_with(|| a_id.cmp(&b_id))
}

/// Sort recommendations into serving order
pub fn sort_recommendations(recommendations: &mut [Recommendation]) {
    recommendations.sort_by(|a, b| rank_order(a.score, a.video_id, b.score, b.video_id));
}

/// One cached recommendation row, keyed by `(user_id, video_id)`
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RecommendationCacheEntry {
    pub user_id: UserId,
    pub video_id: VideoId,
    pub score: f64,
    pub expires_at: DateTime<Utc>,
}

impl RecommendationCacheEntry {
    pub fn is_expired(&self, now: DateTime<Utc>) -> bool {
        self.expires_at <= now
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_sort_breaks_ties_by_id() {
        let mut recs = vec![
            Recommendation::new(9, 1.0, "a"),
            Recommendation::new(3, 2.0, "b"),
            Recommendation::new(4, 1.0, "c"),
        ];
        sort_recommendations(&mut recs);
        let ids: Vec<_> = recs.iter().map(|r| r.video_id).collect();
        assert_eq!(ids, vec![3, 4, 9]);
    }

    #[test]
    fn test_expiry_boundary() {
        let now = Utc::now();
        let entry = RecommendationCacheEntry {
            user_id: 1,
            video_id: 2,
            score: 0.5,
            expires_at: now,
        };
        assert!(entry.is_expired(now));
        assert!(!entry.is_expired(now - chrono::Duration::seconds(1)));
    }
}
