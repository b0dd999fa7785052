//! Real-time scoring inputs from a user's recent activity

use chrono::{Duration, NaiveDate};
use serde::Serialize;
use std::collections::BTreeSet;

use crate::features::{mean, InteractionFeatures};
use vidrec_core::VideoMetadata;

/// Days of history considered recent
pub const RECENT_WINDOW_DAYS: u32 = 7;

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RealTimeFeatures {
    pub recent_avg_engagement: f64,
    pub recent_watch_count: usize,
    pub recent_completion_rate: f64,
    pub last_watch_hour: u32,
    pub current_streak: u32,
    /// Share of recent watches in the target video's category
    pub category_match: f64,
    /// 1 when the target length equals the recent mean length, falling to 0
    pub duration_match: f64,
}

impl Default for RealTimeFeatures {
    fn default() -> Self {
        Self {
            recent_avg_engagement: 0.5,
            recent_watch_count: 0,
            recent_completion_rate: 0.0,
            last_watch_hour: 12,
            current_streak: 0,
            category_match: 0.0,
            duration_match: 0.0,
        }
    }
}

/// Consecutive watch days ending today, or yesterday when nothing was
/// watched today yet.
pub fn watch_streak(dates: impl IntoIterator<Item = NaiveDate>, today: NaiveDate) -> u32 {
    let days: BTreeSet<NaiveDate> = dates.into_iter().collect();
    let mut cursor = if days.contains(&today) {
        today
    } else {
        today - Duration::days(1)
    };

    let mut streak = 0;
    while days.contains(&cursor) {
        streak += 1;
        cursor -= Duration::days(1);
    }
    streak
}

impl RealTimeFeatures {
    /// Compute from one user's recent interactions, in watch order.
    /// `target` is the candidate video, if it exists.
    pub fn compute(
        recent: &[&InteractionFeatures],
        target: Option<&VideoMetadata>,
        today: NaiveDate,
    ) -> Self {
        let Some(last) = recent.iter().max_by_key(|f| f.watched_at) else {
            return Self::default();
        };

        let n = recent.len() as f64;
        let category_match = target
            .and_then(|v| v.category_id)
            .map(|category_id| {
                recent
                    .iter()
                    .filter(|f| f.category_id == Some(category_id))
                    .count() as f64
                    / n
            })
            .unwrap_or(0.0);

        let duration_match = match (
            target.and_then(|v| v.duration).filter(|d| *d > 0),
            mean(recent.iter().filter_map(|f| f.video_duration).map(f64::from)),
        ) {
            (Some(duration), Some(avg)) => {
                let duration = f64::from(duration);
                let denom = avg.max(duration);
                (1.0 - (duration - avg).abs() / denom).max(0.0)
            }
            _ => 0.0,
        };

        Self {
            recent_avg_engagement: mean(recent.iter().map(|f| f.engagement_score)).unwrap_or(0.5),
            recent_watch_count: recent.len(),
            recent_completion_rate: mean(recent.iter().map(|f| f.completed as u8 as f64))
                .unwrap_or(0.0),
            last_watch_hour: last.hour_of_day,
            current_streak: watch_streak(recent.iter().map(|f| f.watch_date), today),
            category_match,
            duration_match,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::features::fixtures::{at, record};
    use crate::features::FeatureSet;

    fn date(day: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(2024, 1, day).unwrap()
    }

    #[test]
    fn test_streak_counts_back_from_today() {
        assert_eq!(watch_streak(vec![date(8), date(9), date(10)], date(10)), 3);
        assert_eq!(watch_streak(vec![date(8), date(10)], date(10)), 1);
    }

    #[test]
    fn test_streak_can_end_yesterday() {
        assert_eq!(watch_streak(vec![date(7), date(8), date(9)], date(10)), 3);
        assert_eq!(watch_streak(vec![date(7), date(8)], date(10)), 0);
        assert_eq!(watch_streak(Vec::new(), date(10)), 0);
    }

    #[test]
    fn test_defaults_without_recent_activity() {
        let features = RealTimeFeatures::compute(&[], None, date(10));
        assert_eq!(features, RealTimeFeatures::default());
    }

    #[test]
    fn test_category_and_duration_match() {
        let mut a = record(1, 1, Some((4, "Science")), at(9, 8));
        a.video_duration = Some(300);
        let mut b = record(1, 2, Some((5, "Music")), at(10, 19));
        b.video_duration = Some(500);
        let set = FeatureSet::compute(&[a, b]);
        let rows: Vec<_> = set.for_user(1).collect();

        let mut target = VideoMetadata::new(99, "Target");
        target.category_id = Some(4);
        target.duration = Some(200);

        let features = RealTimeFeatures::compute(&rows, Some(&target), date(10));
        assert_eq!(features.recent_watch_count, 2);
        assert_eq!(features.last_watch_hour, 19);
        assert_eq!(features.current_streak, 2);
        assert!((features.category_match - 0.5).abs() < 1e-9);
        // |200 - 400| / 400
        assert!((features.duration_match - 0.5).abs() < 1e-9);
    }

    #[test]
    fn test_missing_target_scores_zero_match() {
        let set = FeatureSet::compute(&[record(1, 1, Some((4, "Science")), at(10, 8))]);
        let rows: Vec<_> = set.for_user(1).collect();
        let features = RealTimeFeatures::compute(&rows, None, date(10));
        assert_eq!(features.category_match, 0.0);
        assert_eq!(features.duration_match, 0.0);
        assert_eq!(features.current_streak, 1);
    }
}
