//! Batch construction of user preference profiles

use chrono::{DateTime, Utc};
use serde::Serialize;
use std::cmp::Ordering;
use std::collections::BTreeMap;
use vidrec_core::{UserId, UserPreferenceProfile};

use crate::features::{mean, mode, FeatureSet, InteractionFeatures};

/// Outcome of a profile rebuild
#[derive(Debug, Clone, Serialize)]
pub struct ProfileBuildReport {
    pub window_days: u32,
    pub total_interactions: usize,
    pub profiles_written: usize,
    pub elapsed_ms: u128,
}

#[derive(Default)]
struct CategoryTally {
    engagement_sum: f64,
    count: usize,
}

/// Top categories by `0.7 * mean engagement + 0.3 * count / max count`.
/// Ties go to the alphabetically first name.
pub fn top_categories(rows: &[&InteractionFeatures], limit: usize) -> Vec<String> {
    let mut tallies: BTreeMap<&str, CategoryTally> = BTreeMap::new();
    for f in rows {
        if let Some(name) = f.category_name.as_deref() {
            let tally = tallies.entry(name).or_default();
            tally.engagement_sum += f.engagement_score;
            tally.count += 1;
        }
    }

    let max_count = tallies.values().map(|t| t.count).max().unwrap_or(1) as f64;
    let mut weighted: Vec<(&str, f64)> = tallies
        .into_iter()
        .map(|(name, t)| {
            let mean_engagement = t.engagement_sum / t.count as f64;
            (name, mean_engagement * 0.7 + t.count as f64 / max_count * 0.3)
        })
        .collect();

    weighted.sort_by(|a, b| {
        b.1.partial_cmp(&a.1)
            .unwrap_or(Ordering::Equal)
            .then_with(|| a.0.cmp(b.0))
    });
    weighted
        .into_iter()
        .take(limit)
        .map(|(name, _)| name.to_string())
        .collect()
}

/// One profile per user present in `features`
pub fn build_profiles(
    features: &FeatureSet,
    top_category_limit: usize,
    now: DateTime<Utc>,
) -> Vec<UserPreferenceProfile> {
    let mut grouped: BTreeMap<UserId, Vec<&InteractionFeatures>> = BTreeMap::new();
    for f in &features.interactions {
        grouped.entry(f.user_id).or_default().push(f);
    }

    grouped
        .into_iter()
        .map(|(user_id, rows)| {
            let defaults = UserPreferenceProfile::empty(user_id);
            UserPreferenceProfile {
                user_id,
                preferred_categories: top_categories(&rows, top_category_limit),
                preferred_hour: mode(rows.iter().map(|f| f.hour_of_day))
                    .unwrap_or(defaults.preferred_hour),
                preferred_day: mode(rows.iter().map(|f| f.day_of_week))
                    .unwrap_or(defaults.preferred_day),
                weekend_preference: mean(rows.iter().map(|f| f.is_weekend as u8 as f64))
                    .unwrap_or(defaults.weekend_preference),
                preferred_duration: mean(
                    rows.iter().filter_map(|f| f.video_duration).map(f64::from),
                )
                .map(|d| d.round() as i64)
                .unwrap_or(defaults.preferred_duration),
                freshness_preference: mean(
                    rows.iter()
                        .filter_map(|f| f.days_since_published)
                        .map(|d| d as f64),
                )
                .unwrap_or(defaults.freshness_preference),
                updated_at: Some(now),
            }
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::features::fixtures::{at, record};

    #[test]
    fn test_category_weighting_prefers_engagement_and_volume() {
        let mut music_a = record(1, 1, Some((1, "Music")), at(1, 20));
        music_a.completed = true;
        let mut music_b = record(1, 2, Some((1, "Music")), at(2, 20));
        music_b.completed = true;
        let news = record(1, 3, Some((2, "News")), at(3, 8));
        let uncategorized = record(1, 4, None, at(3, 9));

        let features = FeatureSet::compute(&[music_a, music_b, news, uncategorized]);
        let profiles = build_profiles(&features, 5, at(10, 0));
        assert_eq!(profiles.len(), 1);
        assert_eq!(profiles[0].preferred_categories, vec!["Music", "News"]);
    }

    #[test]
    fn test_category_limit_and_name_tiebreak() {
        let rows: Vec<_> = ["Drama", "Comedy", "Anime"]
            .iter()
            .enumerate()
            .map(|(i, name)| record(1, i as i64 + 1, Some((i as i64 + 1, name)), at(1, 10)))
            .collect();
        let features = FeatureSet::compute(&rows);
        let profiles = build_profiles(&features, 2, at(10, 0));
        assert_eq!(profiles[0].preferred_categories, vec!["Anime", "Comedy"]);
    }

    #[test]
    fn test_temporal_and_content_preferences() {
        // Jan 6 and 7 2024 are a weekend
        let mut a = record(7, 1, None, at(6, 21));
        a.video_duration = Some(200);
        a.published_at = Some(at(1, 21));
        let mut b = record(7, 2, None, at(7, 21));
        b.video_duration = Some(400);
        b.published_at = Some(at(6, 21));
        let mut c = record(7, 3, None, at(8, 9));
        c.video_duration = None;

        let features = FeatureSet::compute(&[a, b, c]);
        let profile = &build_profiles(&features, 5, at(10, 0))[0];
        assert_eq!(profile.preferred_hour, 21);
        assert_eq!(profile.preferred_day, 0);
        assert!((profile.weekend_preference - 2.0 / 3.0).abs() < 1e-9);
        assert_eq!(profile.preferred_duration, 300);
        assert!((profile.freshness_preference - 3.0).abs() < 1e-9);
        assert!(profile.preferred_categories.is_empty());
    }

    #[test]
    fn test_defaults_without_durations_or_publish_dates() {
        let mut r = record(3, 1, None, at(1, 5));
        r.video_duration = None;
        let features = FeatureSet::compute(&[r]);
        let profile = &build_profiles(&features, 5, at(10, 0))[0];
        assert_eq!(profile.preferred_duration, 600);
        assert!((profile.freshness_preference - 30.0).abs() < 1e-9);
        assert_eq!(profile.updated_at, Some(at(10, 0)));
    }
}
