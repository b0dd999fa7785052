//! Semantic embedding index: searchable text, vectors and on-disk snapshots

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use tracing::{debug, info};
use uuid::Uuid;
use vidrec_core::{EngineError, Result, SnapshotSlot, VideoId, VideoMetadata};

pub const SNAPSHOT_FILE: &str = "content_index.bin";

/// Length bucket token: under 5 minutes, under 30 minutes, longer
pub fn duration_bucket(duration_secs: Option<i32>) -> Option<&'static str> {
    match duration_secs? {
        d if d <= 0 => None,
        d if d < 300 => Some("short video"),
        d if d < 1800 => Some("medium video"),
        _ => Some("long video"),
    }
}

/// Age bucket token at `now`
pub fn freshness_bucket(
    published_at: Option<DateTime<Utc>>,
    now: DateTime<Utc>,
) -> Option<&'static str> {
    let days = (now - published_at?).num_days().max(0);
    Some(match days {
        0 => "new video",
        1..=6 => "recent video",
        7..=29 => "this month",
        _ => "older video",
    })
}

/// Metadata captured when the index is built
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct IndexedVideo {
    pub video_id: VideoId,
    pub title: String,
    pub description: Option<String>,
    pub channel_title: Option<String>,
    pub category_name: Option<String>,
    pub tags: Vec<String>,
    pub duration: Option<i32>,
    pub published_at: Option<DateTime<Utc>>,
}

impl IndexedVideo {
    pub fn from_metadata(video: &VideoMetadata) -> Self {
        Self {
            video_id: video.id,
            title: video.title.clone(),
            description: video.description.clone(),
            channel_title: video.channel_title.clone(),
            category_name: video.category_name.clone(),
            tags: video.tag_list(),
            duration: video.duration,
            published_at: video.published_at,
        }
    }

    /// The text embedded for this video. The title is repeated three times
    /// to weight it over the rest.
    pub fn searchable_text(&self, now: DateTime<Utc>) -> String {
        let mut parts: Vec<String> = Vec::new();
        if !self.title.trim().is_empty() {
            parts.extend(std::iter::repeat(self.title.clone()).take(3));
        }
        if let Some(description) = self.description.as_deref().filter(|d| !d.is_empty()) {
            parts.push(description.to_string());
        }
        parts.extend(self.tags.iter().cloned());
        if let Some(channel) = self.channel_title.as_deref().filter(|c| !c.is_empty()) {
            parts.push(format!("by {}", channel));
        }
        if let Some(category) = self.category_name.as_deref().filter(|c| !c.is_empty()) {
            parts.push(format!("category {}", category));
        }
        parts.extend(duration_bucket(self.duration).map(str::to_string));
        parts.extend(freshness_bucket(self.published_at, now).map(str::to_string));
        parts.join(" ")
    }
}

/// Immutable index snapshot. `vectors` holds one row of `dimension` values
/// per entry, in entry order.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EmbeddingIndex {
    pub version: Uuid,
    pub model: String,
    pub dimension: usize,
    pub built_at: DateTime<Utc>,
    pub entries: Vec<IndexedVideo>,
    vectors: Vec<f32>,
}

impl EmbeddingIndex {
    pub fn new(
        model: impl Into<String>,
        dimension: usize,
        entries: Vec<IndexedVideo>,
        vectors: Vec<Vec<f32>>,
    ) -> Result<Self> {
        if entries.len() != vectors.len() {
            return Err(EngineError::Embedding(format!(
                "{} videos but {} vectors",
                entries.len(),
                vectors.len()
            )));
        }
        if let Some(bad) = vectors.iter().find(|v| v.len() != dimension) {
            return Err(EngineError::Embedding(format!(
                "expected dimension {}, got {}",
                dimension,
                bad.len()
            )));
        }

        Ok(Self {
            version: Uuid::new_v4(),
            model: model.into(),
            dimension,
            built_at: Utc::now(),
            entries,
            vectors: vectors.into_iter().flatten().collect(),
        })
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn vector(&self, position: usize) -> &[f32] {
        let start = position * self.dimension;
        &self.vectors[start..start + self.dimension]
    }

    pub fn position(&self, video_id: VideoId) -> Option<usize> {
        self.entries.iter().position(|e| e.video_id == video_id)
    }

    pub fn snapshot_path(dir: &Path) -> PathBuf {
        dir.join(SNAPSHOT_FILE)
    }

    /// Write the snapshot to `dir`, replacing any previous one atomically
    pub async fn save(&self, dir: &Path) -> Result<PathBuf> {
        tokio::fs::create_dir_all(dir).await?;
        let path = Self::snapshot_path(dir);
        let tmp = path.with_extension("bin.tmp");

        let bytes = bincode::serialize(self)?;
        tokio::fs::write(&tmp, &bytes).await?;
        tokio::fs::rename(&tmp, &path).await?;

        debug!(path = %path.display(), bytes = bytes.len(), "Saved embedding index");
        Ok(path)
    }

    /// Read the snapshot from `dir`. A missing file is `Ok(None)`.
    pub async fn load(dir: &Path) -> Result<Option<Self>> {
        let path = Self::snapshot_path(dir);
        let bytes = match tokio::fs::read(&path).await {
            Ok(bytes) => bytes,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(None),
            Err(e) => return Err(e.into()),
        };
        let index: Self = bincode::deserialize(&bytes)?;
        if index.vectors.len() != index.entries.len() * index.dimension {
            return Err(EngineError::Persistence(format!(
                "corrupt snapshot at {}",
                path.display()
            )));
        }
        info!(path = %path.display(), videos = index.len(), "Loaded embedding index");
        Ok(Some(index))
    }

    /// Whether a loaded snapshot can serve queries embedded by `model`
    pub fn is_compatible(&self, model: &str, dimension: usize) -> bool {
        !self.is_empty() && self.model == model && self.dimension == dimension
    }
}

/// Current index, swapped wholesale on rebuild
pub type IndexSlot = SnapshotSlot<EmbeddingIndex>;
