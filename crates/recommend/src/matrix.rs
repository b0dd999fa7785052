//! Interaction aggregation into a decayed user x item score matrix

use chrono::{DateTime, Utc};
use ndarray::Array2;
use std::collections::{BTreeMap, BTreeSet, HashMap};
use tracing::info;
use vidrec_core::{InteractionRecord, UserId, VideoId};

/// Recency weight `exp(-days / decay_days)`
pub fn recency_weight(days_since: i64, decay_days: f64) -> f64 {
    (-(days_since as f64) / decay_days).exp()
}

/// Engagement tier times recency weight, in (0, 5]
pub fn weighted_score(record: &InteractionRecord, now: DateTime<Utc>, decay_days: f64) -> f64 {
    record.engagement_tier() * recency_weight(record.days_since_watch(now), decay_days)
}

/// Dense user x item score matrix.
///
/// Users and items are kept in ascending id order. A zero entry means no
/// interaction in the window.
#[derive(Debug, Clone)]
pub struct UserItemMatrix {
    users: Vec<UserId>,
    items: Vec<VideoId>,
    user_index: HashMap<UserId, usize>,
    item_index: HashMap<VideoId, usize>,
    scores: Array2<f64>,
}

impl UserItemMatrix {
    pub fn empty() -> Self {
        Self::from_scores(std::iter::empty())
    }

    /// Aggregate interaction records, keeping the highest weighted score per
    /// `(user, item)` pair
    pub fn from_interactions(
        records: &[InteractionRecord],
        now: DateTime<Utc>,
        decay_days: f64,
    ) -> Self {
        let matrix = Self::from_scores(
            records
                .iter()
                .map(|r| (r.user_id, r.video_id, weighted_score(r, now, decay_days))),
        );
        info!(
            records = records.len(),
            users = matrix.num_users(),
            items = matrix.num_items(),
            "Built user-item matrix"
        );
        matrix
    }

    /// Build from raw `(user, item, score)` triples; repeated pairs keep the max
    pub fn from_scores(entries: impl IntoIterator<Item = (UserId, VideoId, f64)>) -> Self {
        let mut best: BTreeMap<(UserId, VideoId), f64> = BTreeMap::new();
        for (user_id, video_id, score) in entries {
            best.entry((user_id, video_id))
                .and_modify(|existing| *existing = existing.max(score))
                .or_insert(score);
        }

        let users: Vec<UserId> = best
            .keys()
            .map(|(u, _)| *u)
            .collect::<BTreeSet<_>>()
            .into_iter()
            .collect();
        let items: Vec<VideoId> = best
            .keys()
            .map(|(_, i)| *i)
            .collect::<BTreeSet<_>>()
            .into_iter()
            .collect();
        let user_index: HashMap<UserId, usize> =
            users.iter().enumerate().map(|(i, u)| (*u, i)).collect();
        let item_index: HashMap<VideoId, usize> =
            items.iter().enumerate().map(|(i, v)| (*v, i)).collect();

        let mut scores = Array2::<f64>::zeros((users.len(), items.len()));
        for ((user_id, video_id), score) in best {
            scores[[user_index[&user_id], item_index[&video_id]]] = score;
        }

        Self {
            users,
            items,
            user_index,
            item_index,
            scores,
        }
    }

    pub fn is_empty(&self) -> bool {
        self.users.is_empty() || self.items.is_empty()
    }

    pub fn num_users(&self) -> usize {
        self.users.len()
    }

    pub fn num_items(&self) -> usize {
        self.items.len()
    }

    pub fn users(&self) -> &[UserId] {
        &self.users
    }

    /// Column order shared with the similarity matrix
    pub fn items(&self) -> &[VideoId] {
        &self.items
    }

    pub fn scores(&self) -> &Array2<f64> {
        &self.scores
    }

    pub fn contains_user(&self, user_id: UserId) -> bool {
        self.user_index.contains_key(&user_id)
    }

    pub fn item_position(&self, video_id: VideoId) -> Option<usize> {
        self.item_index.get(&video_id).copied()
    }

    /// Score of one pair, 0.0 when absent
    pub fn score(&self, user_id: UserId, video_id: VideoId) -> f64 {
        match (self.user_index.get(&user_id), self.item_index.get(&video_id)) {
            (Some(&u), Some(&i)) => self.scores[[u, i]],
            _ => 0.0,
        }
    }

    /// Items the user rated above zero, in column order
    pub fn user_ratings(&self, user_id: UserId) -> Vec<(VideoId, f64)> {
        let Some(&row) = self.user_index.get(&user_id) else {
            return Vec::new();
        };
        self.scores
            .row(row)
            .iter()
            .enumerate()
            .filter(|(_, score)| **score > 0.0)
            .map(|(col, score)| (self.items[col], *score))
            .collect()
    }
}
