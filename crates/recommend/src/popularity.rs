//! Global popularity ranking, the fallback when nothing personal is known

use std::cmp::Ordering;
use tracing::instrument;
use vidrec_core::{CatalogSource, PopularityStats, Recommendation, Result};

const POPULARITY_SCALE: f64 = 1000.0;

fn raw_score(stats: &PopularityStats) -> f64 {
    stats.view_count as f64 * 0.4
        + stats.like_count as f64 * 0.4
        + stats.avg_watch_percentage.unwrap_or(0.0) * 0.2
}

/// Rank active videos by `0.4*views + 0.4*likes + 0.2*avg_watch_pct`,
/// scaled down by 1000.
///
/// Videos nobody has watched yet have no watch percentage and are ordered
/// after every watched video.
pub fn rank_popular(mut stats: Vec<PopularityStats>, n: usize) -> Vec<Recommendation> {
    stats.sort_by(|a, b| {
        match (a.avg_watch_percentage.is_some(), b.avg_watch_percentage.is_some()) {
            (true, false) => Ordering::Less,
            (false, true) => Ordering::Greater,
            _ => raw_score(b)
                .partial_cmp(&raw_score(a))
                .unwrap_or(Ordering::Equal),
        }
        .then_with(|| a.video_id.cmp(&b.video_id))
    });

    stats
        .iter()
        .take(n)
        .map(|s| {
            Recommendation::new(
                s.video_id,
                raw_score(s) / POPULARITY_SCALE,
                "Popular and highly rated",
            )
        })
        .collect()
}

#[instrument(skip(catalog))]
pub async fn recommend(catalog: &dyn CatalogSource, n: usize) -> Result<Vec<Recommendation>> {
    if n == 0 {
        return Ok(Vec::new());
    }
    let stats = catalog.popularity_stats().await?;
    Ok(rank_popular(stats, n))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn stats(id: i64, views: i64, likes: i64, pct: Option<f64>) -> PopularityStats {
        PopularityStats {
            video_id: id,
            title: format!("Video {}", id),
            view_count: views,
            like_count: likes,
            avg_watch_percentage: pct,
        }
    }

    #[test]
    fn test_popularity_score_formula() {
        let recs = rank_popular(vec![stats(1, 1000, 500, Some(80.0))], 5);
        assert_eq!(recs.len(), 1);
        assert!((recs[0].score - 0.616).abs() < 1e-9);
        assert_eq!(recs[0].reason, "Popular and highly rated");
    }

    #[test]
    fn test_ordering_and_truncation() {
        let recs = rank_popular(
            vec![
                stats(1, 10, 1, Some(50.0)),
                stats(2, 5000, 900, None),
                stats(3, 200, 20, Some(90.0)),
                stats(4, 10, 1, Some(50.0)),
            ],
            3,
        );
        let ids: Vec<_> = recs.iter().map(|r| r.video_id).collect();
        assert_eq!(ids, vec![3, 1, 4]);
    }
}
