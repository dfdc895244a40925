//! Recurring trigger set: one cron schedule per job, one task per schedule.
//!
//! A trigger never overlaps itself: each firing is awaited before the next
//! fire time is computed. Different triggers run concurrently. A failing or
//! panicking firing is logged and the trigger keeps going.

use std::fmt;
use std::future::Future;

use chrono::Local;
use cron::Schedule;
use sqlx::PgPool;
use tokio::task::JoinHandle;
use tracing::Instrument;

use crate::aggregate::{self, AggregateOutcome};
use crate::config::Config;
use crate::ingest;
use crate::window::Granularity;

// ---

/// Work performed by a trigger firing.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Job {
    Ingest,
    Aggregate(Granularity),
}

impl fmt::Display for Job {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Job::Ingest => f.write_str("ingest"),
            Job::Aggregate(g) => write!(f, "aggregate-{g}"),
        }
    }
}

/// Trigger definitions from configuration.
pub fn triggers(config: &Config) -> Vec<(Job, Schedule)> {
    // ---
    let s = &config.schedules;
    vec![
        (Job::Ingest, s.ingest.clone()),
        (Job::Aggregate(Granularity::Day), s.daily.clone()),
        (Job::Aggregate(Granularity::Week), s.weekly.clone()),
        (Job::Aggregate(Granularity::Month), s.monthly.clone()),
    ]
}

/// Run one job to completion, logging its outcome.
///
/// Returns `true` on success or no-op, `false` on failure.
pub async fn run_job(pool: &PgPool, weather_source: &str, job: Job) -> bool {
    // ---
    match job {
        Job::Ingest => {
            tracing::info!("Starting scheduled weather data processing...");
            match ingest::run(pool, weather_source).await {
                Ok(report) => {
                    tracing::info!(id = report.id, "Weather data processed successfully");
                    true
                }
                Err(e) => {
                    tracing::error!("Error processing weather data: {}", e);
                    false
                }
            }
        }
        Job::Aggregate(granularity) => {
            tracing::info!("Starting {} statistics calculation...", granularity);
            let now = Local::now().naive_local();
            match aggregate::aggregate_at(pool, granularity, now).await {
                Ok(AggregateOutcome::Written { window, .. }) => {
                    tracing::info!(%window, "Statistics calculated successfully");
                    true
                }
                Ok(AggregateOutcome::Empty { .. }) => true,
                Err(e) => {
                    tracing::error!("Error calculating {} statistics: {}", granularity, e);
                    false
                }
            }
        }
    }
}

/// Spawn one task per trigger. The handles run until the process exits.
pub fn spawn_all(pool: PgPool, config: &Config) -> Vec<JoinHandle<()>> {
    // ---
    triggers(config)
        .into_iter()
        .map(|(job, schedule)| {
            let pool = pool.clone();
            let source = config.weather_source.clone();
            tracing::info!(%job, %schedule, "Scheduling trigger");
            tokio::spawn(trigger_loop(pool, source, job, schedule))
        })
        .collect()
}

async fn trigger_loop(pool: PgPool, weather_source: String, job: Job, schedule: Schedule) {
    // ---
    run_trigger(job, schedule, move || {
        let pool = pool.clone();
        let source = weather_source.clone();
        async move { run_job(&pool, &source, job).await }
    })
    .await
}

/// Fire `make_firing` at every upcoming time of `schedule`, one at a time.
///
/// Returns only when the schedule has no further fire time.
pub async fn run_trigger<F, Fut>(job: Job, schedule: Schedule, make_firing: F)
where
    F: Fn() -> Fut,
    Fut: Future<Output = bool> + Send + 'static,
{
    // ---
    loop {
        let Some(next) = schedule.upcoming(Local).next() else {
            tracing::warn!(%job, "Schedule has no upcoming fire time, stopping trigger");
            return;
        };
        let wait = (next - Local::now()).to_std().unwrap_or_default();
        tracing::debug!(%job, next = %next, "Waiting for next firing");
        tokio::time::sleep(wait).await;

        fire(job, make_firing()).await;
    }
}

/// Run one firing in its own task and wait for it.
///
/// A panic surfaces as a `JoinError` and is logged; `None` means the firing
/// did not complete.
pub async fn fire<Fut>(job: Job, firing: Fut) -> Option<bool>
where
    Fut: Future<Output = bool> + Send + 'static,
{
    // ---
    let span = tracing::info_span!("trigger", %job);
    match tokio::spawn(firing.instrument(span)).await {
        Ok(succeeded) => Some(succeeded),
        Err(e) => {
            tracing::error!(%job, "Trigger firing aborted: {}", e);
            None
        }
    }
}
