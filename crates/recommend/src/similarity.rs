//! Item-item cosine similarity derived from the user-item matrix

use crate::matrix::UserItemMatrix;
use ndarray::{Array2, ArrayView1, Axis};
use std::collections::HashMap;
use tracing::info;
use vidrec_core::{EngineError, Result, VideoId};

/// Symmetric item x item cosine similarity matrix, in the item order of the
/// user-item matrix it was built from
#[derive(Debug, Clone)]
pub struct ItemSimilarityMatrix {
    items: Vec<VideoId>,
    item_index: HashMap<VideoId, usize>,
    values: Array2<f64>,
}

impl ItemSimilarityMatrix {
    /// Cosine similarity between every pair of item columns
    pub fn from_user_item(matrix: &UserItemMatrix) -> Self {
        let scores = matrix.scores();

        // Unit-length item columns; all-zero columns stay zero
        let norms = scores.map_axis(Axis(0), |col| col.dot(&col).sqrt());
        let mut normalized = scores.clone();
        for (mut col, norm) in normalized.axis_iter_mut(Axis(1)).zip(norms.iter()) {
            if *norm > 0.0 {
                col.mapv_inplace(|v| v / norm);
            }
        }

        let mut values = normalized.t().dot(&normalized);
        values.mapv_inplace(|v| v.clamp(-1.0, 1.0));
        values.diag_mut().fill(1.0);

        info!(items = matrix.num_items(), "Calculated item similarity matrix");
        Self::with_items(matrix.items().to_vec(), values)
    }

    /// Assemble from explicit values. `values` must be square and match `items`.
    pub fn from_parts(items: Vec<VideoId>, values: Array2<f64>) -> Result<Self> {
        if values.nrows() != items.len() || values.ncols() != items.len() {
            return Err(EngineError::InvalidArgument(format!(
                "similarity matrix is {}x{} for {} items",
                values.nrows(),
                values.ncols(),
                items.len()
            )));
        }
        Ok(Self::with_items(items, values))
    }

    fn with_items(items: Vec<VideoId>, values: Array2<f64>) -> Self {
        let item_index = items.iter().enumerate().map(|(i, v)| (*v, i)).collect();
        Self {
            items,
            item_index,
            values,
        }
    }

    pub fn len(&self) -> usize {
        self.items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    pub fn items(&self) -> &[VideoId] {
        &self.items
    }

    pub fn get(&self, a: VideoId, b: VideoId) -> Option<f64> {
        let i = *self.item_index.get(&a)?;
        let j = *self.item_index.get(&b)?;
        Some(self.values[[i, j]])
    }

    /// Similarities of `video_id` to every item, in item order
    pub fn row(&self, video_id: VideoId) -> Option<ArrayView1<'_, f64>> {
        self.item_index
            .get(&video_id)
            .map(|&i| self.values.row(i))
    }
}
