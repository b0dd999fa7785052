use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::UserId;

/// Batch-built viewing preferences for one user.
///
/// Rebuilt wholesale by the profile job; a write replaces every field.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct UserPreferenceProfile {
    pub user_id: UserId,

    /// Most engaged categories, best first, at most five
    pub preferred_categories: Vec<String>,

    /// Most frequent watch hour, 0..=23
    pub preferred_hour: u32,

    /// Most frequent watch weekday, Monday = 0
    pub preferred_day: u32,

    /// Share of watches on Saturday or Sunday
    pub weekend_preference: f64,

    /// Mean length of watched videos, seconds
    pub preferred_duration: i64,

    /// Mean age of watched videos at watch time, days
    pub freshness_preference: f64,

    pub updated_at: Option<DateTime<Utc>>,
}

impl UserPreferenceProfile {
    /// Profile with neutral defaults and no categories
    pub fn empty(user_id: UserId) -> Self {
        Self {
            user_id,
            preferred_categories: Vec::new(),
            preferred_hour: 12,
            preferred_day: 0,
            weekend_preference: 0.5,
            preferred_duration: 600,
            freshness_preference: 30.0,
            updated_at: None,
        }
    }

    /// Stored `time_preferences` document
    pub fn time_preferences(&self) -> serde_json::Value {
        serde_json::json!({
            "preferred_hour": self.preferred_hour,
            "preferred_day": self.preferred_day,
            "weekend_preference": self.weekend_preference,
        })
    }

    /// Stored `content_preferences` document
    pub fn content_preferences(&self) -> serde_json::Value {
        serde_json::json!({
            "preferred_duration": self.preferred_duration,
            "freshness_preference": self.freshness_preference,
        })
    }

    /// Rebuild a profile from its stored documents, filling gaps with defaults
    pub fn from_documents(
        user_id: UserId,
        categories: &serde_json::Value,
        time: &serde_json::Value,
        content: &serde_json::Value,
        updated_at: Option<DateTime<Utc>>,
    ) -> Self {
        let defaults = Self::empty(user_id);
        let preferred_categories = categories
            .as_array()
            .map(|items| {
                items
                    .iter()
                    .filter_map(|c| c.as_str().map(str::to_string))
                    .collect()
            })
            .unwrap_or_default();

        Self {
            user_id,
            preferred_categories,
            preferred_hour: time["preferred_hour"]
                .as_u64()
                .map(|h| h as u32)
                .unwrap_or(defaults.preferred_hour),
            preferred_day: time["preferred_day"]
                .as_u64()
                .map(|d| d as u32)
                .unwrap_or(defaults.preferred_day),
            weekend_preference: time["weekend_preference"]
                .as_f64()
                .unwrap_or(defaults.weekend_preference),
            preferred_duration: content["preferred_duration"]
                .as_i64()
                .unwrap_or(defaults.preferred_duration),
            freshness_preference: content["freshness_preference"]
                .as_f64()
                .unwrap_or(defaults.freshness_preference),
            updated_at,
        }
    }
}
