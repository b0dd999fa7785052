use anyhow::{bail, Context, Result};
use clap::ValueEnum;
use serde::Serialize;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Instant;
use tracing::{info, warn};
use vidrec_core::ProfileConfig;
use vidrec_discovery::{IndexStats, SemanticSearchService};
use vidrec_recommend::{ModelStats, ProfileBuildReport, RecommendationEngine};

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum JobKind {
    /// Rebuild preference profiles over the daily window
    Profiles,
    /// Rebuild the interaction model of the serving engine
    Model,
    /// Re-embed the catalog and persist the index snapshot
    Index,
    /// Profiles over the full window, then the model and the index
    Full,
}

#[derive(Debug, Serialize)]
#[serde(tag = "job", rename_all = "snake_case")]
pub enum JobReport {
    Profiles(ProfileBuildReport),
    Model(ModelStats),
    Index(IndexStats),
    Full {
        profiles: ProfileBuildReport,
        /// `None` when running offline
        model: Option<ModelStats>,
        index: IndexStats,
    },
}

/// Clears the running flag when the job ends, however it ends
struct RunningGuard<'a>(&'a AtomicBool);

impl Drop for RunningGuard<'_> {
    fn drop(&mut self) {
        self.0.store(false, Ordering::SeqCst);
    }
}

/// Rebuild jobs over an engine and a search service.
///
/// Built with [`Jobs::new`] inside the process that serves queries, a job
/// swaps its results into the live instances. Built with [`Jobs::offline`]
/// in a standalone worker, only persisted results matter: profiles land in
/// the preference store and the index snapshot on disk, and the in-memory
/// model is not rebuilt since nothing would read it.
pub struct Jobs {
    engine: Arc<RecommendationEngine>,
    search: Arc<SemanticSearchService>,
    profiles: ProfileConfig,
    serves_queries: bool,
    running: AtomicBool,
}

impl Jobs {
    pub fn new(
        engine: Arc<RecommendationEngine>,
        search: Arc<SemanticSearchService>,
        profiles: ProfileConfig,
    ) -> Self {
        Self {
            engine,
            search,
            profiles,
            serves_queries: true,
            running: AtomicBool::new(false),
        }
    }

    pub fn offline(
        engine: Arc<RecommendationEngine>,
        search: Arc<SemanticSearchService>,
        profiles: ProfileConfig,
    ) -> Self {
        Self {
            serves_queries: false,
            ..Self::new(engine, search, profiles)
        }
    }

    pub fn is_running(&self) -> bool {
        self.running.load(Ordering::SeqCst)
    }

    /// Run `kind` unless another job is in progress, in which case `None`
    pub async fn run(&self, kind: JobKind) -> Result<Option<JobReport>> {
        if kind == JobKind::Model && !self.serves_queries {
            bail!("The interaction model only lives in the serving process; run the model job there");
        }
        if self
            .running
            .compare_exchange(false, true, Ordering::SeqCst, Ordering::SeqCst)
            .is_err()
        {
            warn!(job = ?kind, "Another job is still running, skipping");
            return Ok(None);
        }
        let _guard = RunningGuard(&self.running);

        let started = Instant::now();
        info!(job = ?kind, "Job started");
        let report = match kind {
            JobKind::Profiles => JobReport::Profiles(
                self.build_profiles(self.profiles.daily_window_days).await?,
            ),
            JobKind::Model => JobReport::Model(self.rebuild_model().await?),
            JobKind::Index => JobReport::Index(self.rebuild_index().await?),
            JobKind::Full => {
                let profiles = self.build_profiles(self.profiles.full_window_days).await?;
                let model = if self.serves_queries {
                    Some(self.rebuild_model().await?)
                } else {
                    None
                };
                JobReport::Full {
                    profiles,
                    model,
                    index: self.rebuild_index().await?,
                }
            }
        };
        info!(
            job = ?kind,
            elapsed_ms = started.elapsed().as_millis() as u64,
            "Job finished"
        );
        Ok(Some(report))
    }

    async fn build_profiles(&self, window_days: u32) -> Result<ProfileBuildReport> {
        self.engine
            .build_user_profiles(window_days)
            .await
            .with_context(|| format!("Failed to build user profiles over {} days", window_days))
    }

    async fn rebuild_model(&self) -> Result<ModelStats> {
        self.engine
            .rebuild_interaction_model()
            .await
            .context("Failed to rebuild interaction model")
    }

    async fn rebuild_index(&self) -> Result<IndexStats> {
        self.search
            .rebuild_embedding_index(true)
            .await
            .context("Failed to rebuild embedding index")
    }
}
