//! Weighted fusion of collaborative and content-based candidates

use std::collections::HashMap;
use vidrec_core::models::sort_recommendations;
use vidrec_core::{Recommendation, VideoId};

/// Blend weights applied at merge time
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct BlendWeights {
    pub collaborative: f64,
    pub content: f64,
}

impl Default for BlendWeights {
    fn default() -> Self {
        Self {
            collaborative: 0.7,
            content: 0.3,
        }
    }
}

/// Merge two candidate lists into one ranked list of at most `n` items.
///
/// Collaborative candidates are inserted first with their weight applied.
/// A content-based candidate is added only when its video is not present
/// yet, so a video found by both sources keeps its collaborative score.
pub fn merge(
    collaborative: Vec<Recommendation>,
    content_based: Vec<Recommendation>,
    weights: BlendWeights,
    n: usize,
) -> Vec<Recommendation> {
    let mut merged: HashMap<VideoId, Recommendation> = HashMap::new();

    for rec in collaborative {
        merged.entry(rec.video_id).or_insert(Recommendation {
            score: rec.score * weights.collaborative,
            ..rec
        });
    }
    for rec in content_based {
        merged.entry(rec.video_id).or_insert(Recommendation {
            score: rec.score * weights.content,
            ..rec
        });
    }

    let mut ranked: Vec<Recommendation> = merged.into_values().collect();
    sort_recommendations(&mut ranked);
    ranked.truncate(n);
    ranked
}
