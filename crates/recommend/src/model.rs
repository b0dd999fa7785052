//! Versioned interaction model snapshot and its build-then-swap slot

use crate::matrix::UserItemMatrix;
use crate::similarity::ItemSimilarityMatrix;
use chrono::{DateTime, Utc};
use serde::Serialize;
use uuid::Uuid;
use vidrec_core::{InteractionRecord, SnapshotSlot};

/// A user-item matrix together with the similarity matrix derived from it.
///
/// Never mutated after construction; a rebuild produces a new snapshot.
#[derive(Debug)]
pub struct InteractionModel {
    pub version: Uuid,
    pub built_at: DateTime<Utc>,
    pub window_days: u32,
    pub matrix: UserItemMatrix,
    pub similarity: ItemSimilarityMatrix,
}

impl InteractionModel {
    pub fn build(
        records: &[InteractionRecord],
        now: DateTime<Utc>,
        window_days: u32,
        decay_days: f64,
    ) -> Self {
        let matrix = UserItemMatrix::from_interactions(records, now, decay_days);
        let similarity = ItemSimilarityMatrix::from_user_item(&matrix);
        Self::from_parts(matrix, similarity, window_days)
    }

    pub fn from_parts(
        matrix: UserItemMatrix,
        similarity: ItemSimilarityMatrix,
        window_days: u32,
    ) -> Self {
        Self {
            version: Uuid::new_v4(),
            built_at: Utc::now(),
            window_days,
            matrix,
            similarity,
        }
    }

    pub fn is_empty(&self) -> bool {
        self.matrix.is_empty()
    }

    pub fn stats(&self) -> ModelStats {
        ModelStats {
            version: self.version,
            built_at: self.built_at,
            window_days: self.window_days,
            users: self.matrix.num_users(),
            items: self.matrix.num_items(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ModelStats {
    pub version: Uuid,
    pub built_at: DateTime<Utc>,
    pub window_days: u32,
    pub users: usize,
    pub items: usize,
}

/// Holds the current model. Readers clone the `Arc`; writers swap it.
pub type ModelSlot = SnapshotSlot<InteractionModel>;
