//! Daily timers for the batch jobs.

use std::fmt;

use chrono::{DateTime, NaiveTime, TimeDelta, Utc};
use tokio::task::JoinHandle;
use tracing::{error, info};

use crate::flows::{expiry, recipes};
use crate::{AppContext, HostError};

/// A wall-clock time of day in UTC.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DailySchedule {
    pub hour: u32,
    pub minute: u32,
}

impl DailySchedule {
    pub const fn new(hour: u32, minute: u32) -> Self {
        Self { hour, minute }
    }

    /// The first occurrence strictly after `now`. Out-of-range times mean midnight.
    pub fn next_after(&self, now: DateTime<Utc>) -> DateTime<Utc> {
        let time = NaiveTime::from_hms_opt(self.hour, self.minute, 0).unwrap_or(NaiveTime::MIN);
        let today = now.date_naive().and_time(time).and_utc();
        if today > now {
            today
        } else {
            today + TimeDelta::days(1)
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Job {
    ExpiryScan,
    DailyRecipes,
}

impl Job {
    pub const ALL: [Job; 2] = [Job::ExpiryScan, Job::DailyRecipes];

    pub fn schedule(self) -> DailySchedule {
        match self {
            Job::ExpiryScan => DailySchedule::new(7, 0),
            Job::DailyRecipes => DailySchedule::new(1, 0),
        }
    }

    pub fn name(self) -> &'static str {
        match self {
            Job::ExpiryScan => "expiry-scan",
            Job::DailyRecipes => "daily-recipes",
        }
    }

    pub async fn run(self, ctx: &AppContext) -> Result<(), HostError> {
        match self {
            Job::ExpiryScan => {
                expiry::run_expiry_scan(ctx, Utc::now().date_naive()).await?;
            }
            Job::DailyRecipes => {
                recipes::run_daily_recipes(ctx).await?;
            }
        }
        Ok(())
    }
}

impl fmt::Display for Job {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Start one background loop per job. The loops run until aborted.
pub fn spawn(ctx: AppContext) -> Vec<JoinHandle<()>> {
    Job::ALL
        .into_iter()
        .map(|job| {
            let ctx = ctx.clone();
            tokio::spawn(async move {
                loop {
                    let now = Utc::now();
                    let next = job.schedule().next_after(now);
                    info!(job = %job, next = %next, "next run scheduled");
                    tokio::time::sleep((next - now).to_std().unwrap_or_default()).await;

                    info!(job = %job, "job starting");
                    if let Err(e) = job.run(&ctx).await {
                        error!(error = %e, job = %job, "job failed");
                    }
                }
            })
        })
        .collect()
}
