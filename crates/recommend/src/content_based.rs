//! Category co-engagement recommendations for a context video

use std::cmp::Ordering;
use tracing::{debug, instrument};
use vidrec_core::{CatalogSource, Recommendation, Result, VideoEngagementStats, VideoId};

/// Blend used to order category peers. `None` when an input is unknown;
/// such videos sort after every scored one.
fn ranking_key(stats: &VideoEngagementStats) -> Option<f64> {
    Some(
        stats.avg_completion_rate? * 0.4
            + stats.engagement_rate? * 0.4
            + stats.total_views as f64 * 0.2,
    )
}

/// Order category peers and turn the best `n` into recommendations.
///
/// The returned score is the mean completion rate scaled to [0, 1].
pub fn rank_category_peers(
    mut peers: Vec<VideoEngagementStats>,
    category_name: &str,
    n: usize,
) -> Vec<Recommendation> {
    peers.retain(|p| p.total_views > 0);
    peers.sort_by(|a, b| {
        match (ranking_key(a), ranking_key(b)) {
            (Some(x), Some(y)) => y.partial_cmp(&x).unwrap_or(Ordering::Equal),
            (Some(_), None) => Ordering::Less,
            (None, Some(_)) => Ordering::Greater,
            (None, None) => Ordering::Equal,
        }
        .then_with(|| a.video_id.cmp(&b.video_id))
    });

    peers
        .into_iter()
        .take(n)
        .map(|p| {
            let score = (p.avg_completion_rate.unwrap_or(0.0) / 100.0).clamp(0.0, 1.0);
            Recommendation::new(
                p.video_id,
                score,
                format!("Popular in {} category", category_name),
            )
        })
        .collect()
}

/// Recommend videos from the category of `video_id`.
///
/// An unknown or inactive context video, or one without a category, yields
/// an empty list.
#[instrument(skip(catalog))]
pub async fn recommend(
    catalog: &dyn CatalogSource,
    video_id: VideoId,
    n: usize,
) -> Result<Vec<Recommendation>> {
    if n == 0 {
        return Ok(Vec::new());
    }

    let Some(video) = catalog.fetch_video(video_id).await? else {
        debug!(video_id, "Context video not found");
        return Ok(Vec::new());
    };
    let Some(category_id) = video.category_id else {
        return Ok(Vec::new());
    };

    let peers = catalog.category_engagement(category_id, video_id).await?;
    let category_name = video.category_name.as_deref().unwrap_or("this");
    Ok(rank_category_peers(peers, category_name, n))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn peer(id: VideoId, completion: Option<f64>, engagement: Option<f64>, views: i64) -> VideoEngagementStats {
        VideoEngagementStats {
            video_id: id,
            title: format!("Video {}", id),
            avg_completion_rate: completion,
            unique_viewers: views,
            total_views: views,
            engagement_rate: engagement,
        }
    }

    #[test]
    fn test_rank_by_blend_and_score_by_completion() {
        let peers = vec![
            peer(1, Some(50.0), Some(10.0), 2),
            peer(2, Some(90.0), Some(20.0), 1),
            peer(3, Some(95.0), None, 50),
        ];
        let recs = rank_category_peers(peers, "Music", 10);
        let ids: Vec<_> = recs.iter().map(|r| r.video_id).collect();
        assert_eq!(ids, vec![2, 1, 3]);
        assert!((recs[0].score - 0.9).abs() < 1e-9);
        assert_eq!(recs[0].reason, "Popular in Music category");
    }

    #[test]
    fn test_truncates_and_skips_unviewed() {
        let peers = vec![
            peer(1, Some(50.0), Some(10.0), 0),
            peer(2, Some(60.0), Some(10.0), 3),
            peer(3, Some(70.0), Some(10.0), 3),
        ];
        let recs = rank_category_peers(peers, "News", 1);
        assert_eq!(recs.len(), 1);
        assert_eq!(recs[0].video_id, 3);
    }

    #[tokio::test]
    async fn test_unknown_context_video_is_empty() {
        let store = vidrec_core::MemoryStore::new();
        let recs = recommend(&store, 404, 5).await.unwrap();
        assert!(recs.is_empty());
    }
}
