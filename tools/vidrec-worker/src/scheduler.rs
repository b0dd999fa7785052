use anyhow::Result;
use chrono::{DateTime, Datelike, NaiveDate, Timelike, Utc};
use std::future::Future;
use std::sync::Arc;
use std::time::Duration;
use tracing::{error, info};
use vidrec_core::SchedulerConfig;

use crate::jobs::{JobKind, Jobs};

/// Dates on which each recurring job last fired
#[derive(Debug, Default, Clone, PartialEq)]
pub struct ScheduleState {
    last_daily: Option<NaiveDate>,
    last_weekly: Option<NaiveDate>,
}

impl ScheduleState {
    /// Jobs due at `now`, marking them as fired. Each fires at most once per
    /// day, during its configured UTC hour.
    pub fn due(&mut self, now: DateTime<Utc>, config: &SchedulerConfig) -> Vec<JobKind> {
        let today = now.date_naive();
        let mut due = Vec::new();

        if now.hour() == config.daily_profile_hour && self.last_daily != Some(today) {
            self.last_daily = Some(today);
            due.push(JobKind::Profiles);
        }
        if now.weekday() == config.weekly_refresh_weekday
            && now.hour() == config.weekly_refresh_hour
            && self.last_weekly != Some(today)
        {
            self.last_weekly = Some(today);
            due.push(JobKind::Full);
        }
        due
    }
}

/// Fire recurring jobs until `shutdown` completes.
///
/// Run it inside the serving process, next to the query handlers that share
/// `jobs`' engine and search service, so refreshes reach live queries.
pub async fn run<F>(jobs: Arc<Jobs>, config: SchedulerConfig, shutdown: F) -> Result<()>
where
    F: Future<Output = ()>,
{
    info!(
        daily_profile_hour = config.daily_profile_hour,
        weekly_refresh_weekday = %config.weekly_refresh_weekday,
        weekly_refresh_hour = config.weekly_refresh_hour,
        "Scheduler started"
    );

    let mut state = ScheduleState::default();
    let mut ticker = tokio::time::interval(Duration::from_secs(config.tick_secs));
    tokio::pin!(shutdown);

    loop {
        tokio::select! {
            _ = ticker.tick() => {
                for kind in state.due(Utc::now(), &config) {
                    let jobs = Arc::clone(&jobs);
                    tokio::spawn(async move {
                        if let Err(e) = jobs.run(kind).await {
                            error!(job = ?kind, error = %format!("{:#}", e), "Scheduled job failed");
                        }
                    });
                }
            }
            _ = &mut shutdown => {
                info!("Shutdown requested, stopping scheduler");
                return Ok(());
            }
        }
    }
}
