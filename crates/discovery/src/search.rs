//! Vector ranking and relevance explanations

use chrono::{DateTime, Utc};
use serde::Serialize;
use std::cmp::Ordering;
use std::collections::HashMap;
use vidrec_core::{cosine_similarity, VideoId, VideoMetadata};

use crate::index::{EmbeddingIndex, IndexedVideo};

const DESCRIPTION_PREVIEW_CHARS: usize = 200;
const MAX_REASONS: usize = 3;
pub const SIMILAR_REASON: &str = "Similar content and theme";

/// One semantic search hit
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SearchResult {
    pub video_id: VideoId,
    pub title: String,
    pub description: String,
    pub channel_title: Option<String>,
    pub category_name: Option<String>,
    pub similarity_score: f32,
    pub relevance_reason: String,
    pub personalized: bool,

    /// Live values, read at query time
    pub thumbnail_url: Option<String>,
    pub duration: Option<i32>,
    pub view_count: Option<i64>,

    pub published_at: Option<DateTime<Utc>>,
    pub days_since_published: Option<i64>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SimilarVideo {
    pub video_id: VideoId,
    pub title: String,
    pub similarity_score: f32,
    pub reason: String,
}

/// Positions and scores of the best matches for `query`.
///
/// Only scores strictly above `threshold` are kept; ties go to the lower
/// video id. `exclude` drops one position from the candidates.
pub fn rank(
    index: &EmbeddingIndex,
    query: &[f32],
    threshold: Option<f32>,
    top_k: usize,
    exclude: Option<usize>,
) -> Vec<(usize, f32)> {
    let mut scored: Vec<(usize, f32)> = (0..index.len())
        .filter(|pos| Some(*pos) != exclude)
        .map(|pos| (pos, cosine_similarity(query, index.vector(pos))))
        .filter(|(_, score)| threshold.map_or(true, |t| *score > t))
        .collect();

    scored.sort_by(|a, b| {
        b.1.partial_cmp(&a.1)
            .unwrap_or(Ordering::Equal)
            .then_with(|| index.entries[a.0].video_id.cmp(&index.entries[b.0].video_id))
    });
    scored.truncate(top_k);
    scored
}

/// Up to three human-readable reasons why `video` matched `query`, joined
/// with " • ".
pub fn relevance_reason(query: &str, video: &IndexedVideo, score: f32, now: DateTime<Utc>) -> String {
    let query = query.to_lowercase();
    let contains = |field: Option<&str>| field.map_or(false, |f| f.to_lowercase().contains(&query));
    let mut reasons: Vec<String> = Vec::new();

    if contains(Some(video.title.as_str())) {
        reasons.push("Title matches your search".into());
    }
    if contains(video.description.as_deref()) {
        reasons.push("Description contains relevant content".into());
    }
    if let Some(category) = video.category_name.as_deref().filter(|c| contains(Some(*c))) {
        reasons.push(format!("From {} category", category));
    }
    if let Some(channel) = video.channel_title.as_deref().filter(|c| contains(Some(*c))) {
        reasons.push(format!("By {}", channel));
    }

    let matching_tags: Vec<&str> = video
        .tags
        .iter()
        .map(String::as_str)
        .filter(|t| contains(Some(*t)))
        .take(2)
        .collect();
    if !matching_tags.is_empty() {
        reasons.push(format!("Tags: {}", matching_tags.join(", ")));
    }

    match video.duration.filter(|d| *d > 0) {
        Some(d) if query.contains("short") && d < 300 => reasons.push("Short video format".into()),
        Some(d) if query.contains("long") && d > 1800 => reasons.push("Long-form content".into()),
        _ => {}
    }

    if let Some(days) = video.published_at.map(|p| (now - p).num_days().max(0)) {
        if query.contains("new") && days < 1 {
            reasons.push("Recently published".into());
        } else if query.contains("recent") && days < 7 {
            reasons.push("Published this week".into());
        }
    }

    reasons.push(
        if score > 0.8 {
            "Highly relevant content"
        } else if score > 0.6 {
            "Semantically similar"
        } else {
            "Related topic"
        }
        .into(),
    );

    reasons.truncate(MAX_REASONS);
    reasons.join(" • ")
}

fn preview(description: Option<&str>) -> String {
    description
        .unwrap_or_default()
        .chars()
        .take(DESCRIPTION_PREVIEW_CHARS)
        .collect()
}

/// Turn ranked positions into results, overlaying live catalog values
pub fn build_results(
    index: &EmbeddingIndex,
    ranked: &[(usize, f32)],
    query: &str,
    live: &HashMap<VideoId, VideoMetadata>,
    now: DateTime<Utc>,
) -> Vec<SearchResult> {
    ranked
        .iter()
        .map(|(pos, score)| {
            let entry = &index.entries[*pos];
            let current = live.get(&entry.video_id);
            SearchResult {
                video_id: entry.video_id,
                title: entry.title.clone(),
                description: preview(entry.description.as_deref()),
                channel_title: entry.channel_title.clone(),
                category_name: entry.category_name.clone(),
                similarity_score: *score,
                relevance_reason: relevance_reason(query, entry, *score, now),
                personalized: false,
                thumbnail_url: current.and_then(|v| v.thumbnail_url.clone()),
                duration: current.and_then(|v| v.duration),
                view_count: current.map(|v| v.view_count),
                published_at: entry.published_at,
                days_since_published: entry.published_at.map(|p| (now - p).num_days().max(0)),
            }
        })
        .collect()
}

pub fn similar_videos(index: &EmbeddingIndex, ranked: &[(usize, f32)]) -> Vec<SimilarVideo> {
    ranked
        .iter()
        .map(|(pos, score)| SimilarVideo {
            video_id: index.entries[*pos].video_id,
            title: index.entries[*pos].title.clone(),
            similarity_score: *score,
            reason: SIMILAR_REASON.to_string(),
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;

    fn indexed(id: VideoId, title: &str) -> IndexedVideo {
        IndexedVideo::from_metadata(&VideoMetadata::new(id, title))
    }

    fn index() -> EmbeddingIndex {
        EmbeddingIndex::new(
            "m",
            2,
            vec![indexed(1, "a"), indexed(2, "b"), indexed(3, "c"), indexed(4, "d")],
            vec![vec![1.0, 0.0], vec![0.0, 1.0], vec![1.0, 1.0], vec![1.0, 0.0]],
        )
        .unwrap()
    }

    #[test]
    fn test_rank_threshold_is_strict() {
        let index = index();
        let ranked = rank(&index, &[1.0, 0.0], Some(0.0), 10, None);
        let positions: Vec<_> = ranked.iter().map(|(p, _)| *p).collect();
        // Orthogonal vector scores exactly 0 and is dropped; ties by id
        assert_eq!(positions, vec![0, 3, 2]);

        assert!(rank(&index, &[1.0, 0.0], Some(1.0), 10, None).is_empty());
    }

    #[test]
    fn test_rank_excludes_and_truncates() {
        let index = index();
        let ranked = rank(&index, index.vector(0), None, 2, Some(0));
        assert_eq!(ranked[0].0, 3);
        assert_eq!(ranked.len(), 2);
    }

    #[test]
    fn test_reason_priority_and_limit() {
        let mut video = indexed(1, "Rust Tutorial");
        video.description = Some("A rust tutorial for everyone".into());
        video.category_name = Some("Rust Tutorial".into());
        let reason = relevance_reason("rust tutorial", &video, 0.9, Utc::now());
        assert_eq!(
            reason,
            "Title matches your search • Description contains relevant content • From Rust Tutorial category"
        );
    }

    #[test]
    fn test_short_format_reason() {
        let mut video = indexed(1, "Quick Tutorial");
        video.duration = Some(200);
        let reason = relevance_reason("short tutorial", &video, 0.5, Utc::now());
        assert_eq!(reason, "Short video format • Related topic");
    }

    #[test]
    fn test_freshness_and_tier_reasons() {
        let now = Utc::now();
        let mut video = indexed(1, "Weekly roundup");
        video.published_at = Some(now - Duration::days(3));
        video.tags = vec!["news".into(), "recent events".into()];
        let reason = relevance_reason("recent", &video, 0.7, now);
        assert_eq!(reason, "Tags: recent events • Published this week • Semantically similar");
    }

    #[test]
    fn test_results_overlay_live_values() {
        let index = index();
        let mut live = HashMap::new();
        let mut current = VideoMetadata::new(1, "a");
        current.view_count = 77;
        current.thumbnail_url = Some("thumb.jpg".into());
        live.insert(1, current);

        let results = build_results(&index, &[(0, 0.9), (1, 0.2)], "a", &live, Utc::now());
        assert_eq!(results[0].view_count, Some(77));
        assert_eq!(results[0].thumbnail_url.as_deref(), Some("thumb.jpg"));
        assert_eq!(results[1].view_count, None);
        assert!(!results[0].personalized);
    }

    #[test]
    fn test_description_preview_is_truncated() {
        let long = "x".repeat(500);
        assert_eq!(preview(Some(&long)).len(), 200);
        assert_eq!(preview(None), "");
    }
}
