//! Feature pipeline over raw interaction records.
//!
//! Temporal, engagement and content features are derived per interaction and
//! aggregated per user and per category. Profile building, real-time scoring
//! inputs and user insights are all computed from a [`FeatureSet`].

use chrono::{DateTime, Datelike, NaiveDate, Timelike, Utc};
use std::collections::{BTreeMap, HashMap};
use vidrec_core::{CategoryId, InteractionRecord, UserId, VideoId};

/// Features of one interaction
#[derive(Debug, Clone, PartialEq)]
pub struct InteractionFeatures {
    pub user_id: UserId,
    pub video_id: VideoId,
    pub category_id: Option<CategoryId>,
    pub category_name: Option<String>,
    pub watched_at: DateTime<Utc>,
    pub watch_date: NaiveDate,
    pub watch_percentage: f64,
    pub completed: bool,
    pub video_duration: Option<i32>,

    /// 0..=23, UTC
    pub hour_of_day: u32,
    /// Monday = 0
    pub day_of_week: u32,
    pub is_weekend: bool,
    /// Days between publication and the watch, clamped at 0
    pub days_since_published: Option<i64>,
    /// 1-based position inside the session, in watch order
    pub session_position: Option<usize>,

    pub engagement_score: f64,
    /// Engagement minus the user's mean engagement
    pub relative_engagement: f64,

    /// Average-rank percentile of the video's view count within its category
    pub popularity_percentile: Option<f64>,
    /// `1 / (1 + days_since_published / 30)`
    pub content_freshness: Option<f64>,
}

/// Per-user engagement aggregates
#[derive(Debug, Clone, PartialEq)]
pub struct UserStats {
    pub avg_watch_pct: f64,
    /// Sample standard deviation, `None` with fewer than two interactions
    pub std_watch_pct: Option<f64>,
    pub completion_rate: f64,
    pub avg_engagement: f64,
    pub total_videos: usize,
}

/// Per-category aggregates
#[derive(Debug, Clone, PartialEq)]
pub struct CategoryStats {
    /// Interactions in the category
    pub video_count: usize,
    pub avg_views: f64,
    pub avg_engagement: f64,
}

/// `0.4 * watch share + 0.3 * completed + 0.3 * like ratio`
pub fn engagement_score(record: &InteractionRecord) -> f64 {
    let like_ratio = (record.like_count as f64 / record.view_count.max(1) as f64).clamp(0.0, 1.0);
    record.watch_percentage() / 100.0 * 0.4
        + if record.completed { 0.3 } else { 0.0 }
        + like_ratio * 0.3
}

pub(crate) fn mean(values: impl IntoIterator<Item = f64>) -> Option<f64> {
    let (sum, count) = values
        .into_iter()
        .fold((0.0, 0usize), |(s, c), v| (s + v, c + 1));
    (count > 0).then(|| sum / count as f64)
}

fn sample_std(values: &[f64]) -> Option<f64> {
    if values.len() < 2 {
        return None;
    }
    let m = mean(values.iter().copied())?;
    let var = values.iter().map(|v| (v - m).powi(2)).sum::<f64>() / (values.len() - 1) as f64;
    Some(var.sqrt())
}

/// Most frequent value; the smallest wins a tie
pub(crate) fn mode<T: Ord + Copy>(values: impl IntoIterator<Item = T>) -> Option<T> {
    let mut counts: BTreeMap<T, usize> = BTreeMap::new();
    for v in values {
        *counts.entry(v).or_default() += 1;
    }
    let best = counts.values().copied().max()?;
    counts.into_iter().find(|(_, c)| *c == best).map(|(v, _)| v)
}

/// Average-rank percentiles of `values`, aligned with the input
fn rank_percentiles(values: &[i64]) -> Vec<f64> {
    let n = values.len();
    let mut order: Vec<usize> = (0..n).collect();
    order.sort_unstable_by_key(|&i| values[i]);

    let mut percentiles = vec![0.0; n];
    let mut start = 0;
    while start < n {
        let mut end = start + 1;
        while end < n && values[order[end]] == values[order[start]] {
            end += 1;
        }
        // positions start..end hold ranks start+1 ..= end
        let pct = (start + end + 1) as f64 / 2.0 / n as f64;
        for &i in &order[start..end] {
            percentiles[i] = pct;
        }
        start = end;
    }
    percentiles
}

/// Features for a batch of interactions
#[derive(Debug, Clone, Default)]
pub struct FeatureSet {
    pub interactions: Vec<InteractionFeatures>,
    pub users: BTreeMap<UserId, UserStats>,
    pub categories: BTreeMap<CategoryId, CategoryStats>,
}

impl FeatureSet {
    /// Derive every feature. Records are processed in watch order per user.
    pub fn compute(records: &[InteractionRecord]) -> Self {
        let mut ordered: Vec<&InteractionRecord> = records.iter().collect();
        ordered.sort_by(|a, b| {
            a.user_id
                .cmp(&b.user_id)
                .then_with(|| a.watched_at.cmp(&b.watched_at))
        });

        let mut session_counters: HashMap<&str, usize> = HashMap::new();
        let mut interactions: Vec<InteractionFeatures> = ordered
            .iter()
            .map(|r| {
                let session_position = r.session_id.as_deref().map(|s| {
                    let counter = session_counters.entry(s).or_default();
                    *counter += 1;
                    *counter
                });
                let day_of_week = r.watched_at.weekday().num_days_from_monday();
                let days_since_published = r
                    .published_at
                    .map(|p| (r.watched_at - p).num_days().max(0));

                InteractionFeatures {
                    user_id: r.user_id,
                    video_id: r.video_id,
                    category_id: r.category_id,
                    category_name: r.category_name.clone(),
                    watched_at: r.watched_at,
                    watch_date: r.watched_at.date_naive(),
                    watch_percentage: r.watch_percentage(),
                    completed: r.completed,
                    video_duration: r.video_duration,
                    hour_of_day: r.watched_at.hour(),
                    day_of_week,
                    is_weekend: day_of_week >= 5,
                    days_since_published,
                    session_position,
                    engagement_score: engagement_score(r),
                    relative_engagement: 0.0,
                    popularity_percentile: None,
                    content_freshness: days_since_published
                        .map(|d| 1.0 / (1.0 + d as f64 / 30.0)),
                }
            })
            .collect();

        let users = Self::user_stats(&interactions);
        for f in interactions.iter_mut() {
            if let Some(stats) = users.get(&f.user_id) {
                f.relative_engagement = f.engagement_score - stats.avg_engagement;
            }
        }

        let view_counts: HashMap<usize, i64> = ordered
            .iter()
            .enumerate()
            .map(|(i, r)| (i, r.view_count))
            .collect();
        let categories = Self::category_stats(&interactions, &view_counts);
        Self::assign_percentiles(&mut interactions, &view_counts);

        Self {
            interactions,
            users,
            categories,
        }
    }

    fn user_stats(interactions: &[InteractionFeatures]) -> BTreeMap<UserId, UserStats> {
        let mut grouped: BTreeMap<UserId, Vec<&InteractionFeatures>> = BTreeMap::new();
        for f in interactions {
            grouped.entry(f.user_id).or_default().push(f);
        }

        grouped
            .into_iter()
            .map(|(user_id, rows)| {
                let pcts: Vec<f64> = rows.iter().map(|f| f.watch_percentage).collect();
                let stats = UserStats {
                    avg_watch_pct: mean(pcts.iter().copied()).unwrap_or(0.0),
                    std_watch_pct: sample_std(&pcts),
                    completion_rate: mean(rows.iter().map(|f| f.completed as u8 as f64))
                        .unwrap_or(0.0),
                    avg_engagement: mean(rows.iter().map(|f| f.engagement_score)).unwrap_or(0.0),
                    total_videos: rows.len(),
                };
                (user_id, stats)
            })
            .collect()
    }

    fn category_stats(
        interactions: &[InteractionFeatures],
        view_counts: &HashMap<usize, i64>,
    ) -> BTreeMap<CategoryId, CategoryStats> {
        let mut grouped: BTreeMap<CategoryId, Vec<usize>> = BTreeMap::new();
        for (i, f) in interactions.iter().enumerate() {
            if let Some(category_id) = f.category_id {
                grouped.entry(category_id).or_default().push(i);
            }
        }

        grouped
            .into_iter()
            .map(|(category_id, rows)| {
                let stats = CategoryStats {
                    video_count: rows.len(),
                    avg_views: mean(rows.iter().map(|i| view_counts[i] as f64)).unwrap_or(0.0),
                    avg_engagement: mean(rows.iter().map(|i| interactions[*i].engagement_score))
                        .unwrap_or(0.0),
                };
                (category_id, stats)
            })
            .collect()
    }

    fn assign_percentiles(
        interactions: &mut [InteractionFeatures],
        view_counts: &HashMap<usize, i64>,
    ) {
        let mut grouped: HashMap<CategoryId, Vec<usize>> = HashMap::new();
        for (i, f) in interactions.iter().enumerate() {
            if let Some(category_id) = f.category_id {
                grouped.entry(category_id).or_default().push(i);
            }
        }

        for rows in grouped.values() {
            let values: Vec<i64> = rows.iter().map(|i| view_counts[i]).collect();
            for (row, pct) in rows.iter().zip(rank_percentiles(&values)) {
                interactions[*row].popularity_percentile = Some(pct);
            }
        }
    }

    pub fn is_empty(&self) -> bool {
        self.interactions.is_empty()
    }

    /// Interactions of one user, in watch order
    pub fn for_user(&self, user_id: UserId) -> impl Iterator<Item = &InteractionFeatures> {
        self.interactions.iter().filter(move |f| f.user_id == user_id)
    }
}

#[cfg(test)]
pub(crate) mod fixtures {
    use super::*;
    use chrono::TimeZone;

    pub fn record(
        user_id: UserId,
        video_id: VideoId,
        category: Option<(CategoryId, &str)>,
        watched_at: DateTime<Utc>,
    ) -> InteractionRecord {
        InteractionRecord {
            user_id,
            video_id,
            watch_duration: 50.0,
            total_duration: 100.0,
            completed: false,
            watched_at,
            session_id: None,
            category_id: category.map(|(id, _)| id),
            category_name: category.map(|(_, name)| name.to_string()),
            view_count: 100,
            like_count: 10,
            video_duration: Some(100),
            published_at: None,
        }
    }

    /// 2024-01-06 was a Saturday
    pub fn at(day: u32, hour: u32) -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 1, day, hour, 0, 0).unwrap()
    }
}
