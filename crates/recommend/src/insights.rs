//! Viewing-behaviour summaries for analytics

use chrono::NaiveDate;
use serde::Serialize;
use std::collections::{BTreeMap, BTreeSet};

use crate::features::{mean, mode, InteractionFeatures};

pub const DEFAULT_INSIGHT_DAYS: u32 = 30;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum CompletionLevel {
    High,
    Medium,
    Low,
}

impl CompletionLevel {
    pub fn from_watch_percentage(avg_pct: f64) -> Self {
        if avg_pct > 75.0 {
            Self::High
        } else if avg_pct > 50.0 {
            Self::Medium
        } else {
            Self::Low
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CategoryCount {
    pub category: String,
    pub count: usize,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct WatchPatterns {
    pub most_active_day: NaiveDate,
    pub avg_daily_videos: f64,
    pub preferred_completion_level: CompletionLevel,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct InsightReport {
    pub total_videos_watched: usize,
    pub avg_watch_percentage: f64,
    pub favorite_categories: Vec<CategoryCount>,
    pub watch_patterns: WatchPatterns,
    /// 0..=1
    pub engagement_score: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum UserInsights {
    LimitedData,
    Available(InsightReport),
}

fn favorite_categories(rows: &[&InteractionFeatures], limit: usize) -> Vec<CategoryCount> {
    let mut counts: BTreeMap<&str, usize> = BTreeMap::new();
    for f in rows {
        if let Some(name) = f.category_name.as_deref() {
            *counts.entry(name).or_default() += 1;
        }
    }
    let mut ranked: Vec<(&str, usize)> = counts.into_iter().collect();
    ranked.sort_by(|a, b| b.1.cmp(&a.1).then_with(|| a.0.cmp(b.0)));
    ranked
        .into_iter()
        .take(limit)
        .map(|(category, count)| CategoryCount {
            category: category.to_string(),
            count,
        })
        .collect()
}

/// Summarise one user's interactions over the insight window
pub fn summarize(rows: &[&InteractionFeatures]) -> UserInsights {
    let Some(most_active_day) = mode(rows.iter().map(|f| f.watch_date)) else {
        return UserInsights::LimitedData;
    };

    let total = rows.len();
    let avg_pct = mean(rows.iter().map(|f| f.watch_percentage)).unwrap_or(0.0);
    let completed_ratio = rows.iter().filter(|f| f.completed).count() as f64 / total as f64;
    let active_days = rows
        .iter()
        .map(|f| f.watch_date)
        .collect::<BTreeSet<_>>()
        .len()
        .max(1);

    UserInsights::Available(InsightReport {
        total_videos_watched: total,
        avg_watch_percentage: avg_pct,
        favorite_categories: favorite_categories(rows, 3),
        watch_patterns: WatchPatterns {
            most_active_day,
            avg_daily_videos: total as f64 / active_days as f64,
            preferred_completion_level: CompletionLevel::from_watch_percentage(avg_pct),
        },
        engagement_score: (avg_pct / 100.0).min(1.0) * 0.4
            + (total as f64 / 30.0).min(1.0) * 0.3
            + completed_ratio * 0.3,
    })
}
