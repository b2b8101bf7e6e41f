// Scheduler engine implementation

use crate::config::SchedulerConfig;
use crate::models::ScheduledJob;
use crate::schedule::Calendar;
use crate::telemetry;
use anyhow::Result;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::sync::watch;
use tokio::time::interval;
use tracing::{debug, error, info, instrument, warn};

/// A job run at a concrete instant
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ScheduledRun {
    pub job_name: String,
    /// Epoch seconds
    pub fire_time: i64,
}

/// Hands due job runs to whatever executes the backups
#[async_trait]
pub trait JobDispatcher: Send + Sync {
    async fn dispatch(&self, run: &ScheduledRun) -> Result<()>;
}

/// Dispatcher that only logs the run
pub struct LogDispatcher;

#[async_trait]
impl JobDispatcher for LogDispatcher {
    #[instrument(skip(self))]
    async fn dispatch(&self, run: &ScheduledRun) -> Result<()> {
        info!(
            job_name = %run.job_name,
            fire_time = %format_epoch(run.fire_time),
            "Backup job due"
        );
        Ok(())
    }
}

/// Scheduler trait for job scheduling operations
#[async_trait]
pub trait Scheduler: Send + Sync {
    /// Start the scheduler polling loop
    async fn start(&self) -> Result<()>;

    /// Stop the scheduler gracefully
    async fn stop(&self) -> Result<()>;

    /// Dispatch every run with a fire time in `(after, until]`
    async fn process_due_jobs(&self, after: i64, until: i64) -> Result<usize>;
}

/// Main scheduler engine implementation
pub struct SchedulerEngine {
    config: SchedulerConfig,
    jobs: Vec<ScheduledJob>,
    calendar: Arc<dyn Calendar>,
    dispatcher: Arc<dyn JobDispatcher>,
    // Holds the latest state, so a stop issued before `start` is not lost
    shutdown_tx: watch::Sender<bool>,
}

impl SchedulerEngine {
    /// Create a new scheduler engine
    pub fn new(
        config: SchedulerConfig,
        jobs: Vec<ScheduledJob>,
        calendar: Arc<dyn Calendar>,
        dispatcher: Arc<dyn JobDispatcher>,
    ) -> Self {
        let (shutdown_tx, _shutdown_rx) = watch::channel(false);

        Self {
            config,
            jobs,
            calendar,
            dispatcher,
            shutdown_tx,
        }
    }

    pub fn jobs(&self) -> &[ScheduledJob] {
        &self.jobs
    }

    /// Get a shutdown signal receiver; the value is `true` once stopped
    pub fn shutdown_receiver(&self) -> watch::Receiver<bool> {
        self.shutdown_tx.subscribe()
    }

    pub fn is_stopped(&self) -> bool {
        *self.shutdown_tx.borrow()
    }

    /// Runs of all jobs with a fire time in `(after, until]`, ordered by
    /// time and then by job name
    pub fn due_runs(&self, after: i64, until: i64) -> Vec<ScheduledRun> {
        let from = after.saturating_add(1);
        let mut runs: Vec<ScheduledRun> = self
            .jobs
            .iter()
            .flat_map(|job| {
                job.rule
                    .enumerate_fire_times(self.calendar.as_ref(), from, until)
                    .into_iter()
                    .map(move |fire_time| ScheduledRun {
                        job_name: job.name.clone(),
                        fire_time,
                    })
            })
            .collect();

        runs.sort_by(|a, b| {
            a.fire_time
                .cmp(&b.fire_time)
                .then_with(|| a.job_name.cmp(&b.job_name))
        });
        runs
    }

    /// Runs within the configured lookahead window after `now`
    pub fn upcoming(&self, now: i64) -> Vec<ScheduledRun> {
        let horizon = i64::from(self.config.lookahead_hours) * 3600;
        self.due_runs(now, now.saturating_add(horizon))
    }
}

#[async_trait]
impl Scheduler for SchedulerEngine {
    #[instrument(skip(self))]
    async fn start(&self) -> Result<()> {
        info!(
            poll_interval_seconds = self.config.poll_interval_seconds,
            job_count = self.jobs.len(),
            "Starting scheduler engine"
        );

        let mut poll_interval = interval(Duration::from_secs(self.config.poll_interval_seconds));
        let mut shutdown_rx = self.shutdown_receiver();
        let mut last_poll = Utc::now().timestamp();

        loop {
            if *shutdown_rx.borrow_and_update() {
                info!("Shutdown signal received, stopping scheduler");
                break;
            }

            tokio::select! {
                _ = poll_interval.tick() => {
                    let now = Utc::now().timestamp();
                    if now < last_poll {
                        warn!(last_poll, now, "Clock moved backwards, skipping poll");
                        continue;
                    }
                    if now == last_poll {
                        continue;
                    }

                    let started = Instant::now();
                    match self.process_due_jobs(last_poll, now).await {
                        Ok(count) => {
                            if count > 0 {
                                info!(jobs_dispatched = count, "Dispatched due jobs");
                            } else {
                                debug!("No jobs due");
                            }
                        }
                        Err(e) => {
                            error!(error = %e, "Error processing due jobs");
                        }
                    }
                    telemetry::record_poll_duration(started.elapsed().as_secs_f64());
                    last_poll = now;
                }
                changed = shutdown_rx.changed() => {
                    if changed.is_err() {
                        break;
                    }
                }
            }
        }

        info!("Scheduler engine stopped");
        Ok(())
    }

    #[instrument(skip(self))]
    async fn stop(&self) -> Result<()> {
        info!("Stopping scheduler engine");
        self.shutdown_tx.send_replace(true);
        Ok(())
    }

    #[instrument(skip(self))]
    async fn process_due_jobs(&self, after: i64, until: i64) -> Result<usize> {
        let runs = self.due_runs(after, until);
        debug!(run_count = runs.len(), "Found runs to dispatch");

        let mut dispatched = 0;
        for run in &runs {
            match self.dispatcher.dispatch(run).await {
                Ok(()) => {
                    telemetry::record_job_dispatched(&run.job_name);
                    dispatched += 1;
                }
                Err(e) => {
                    // Continue with the remaining runs
                    error!(
                        job_name = %run.job_name,
                        fire_time = run.fire_time,
                        error = %e,
                        "Failed to dispatch job"
                    );
                    telemetry::record_dispatch_failure(&run.job_name, &e.to_string());
                }
            }
        }

        Ok(dispatched)
    }
}

/// RFC 3339 rendering of an epoch for logs
pub fn format_epoch(epoch: i64) -> String {
    DateTime::from_timestamp(epoch, 0)
        .map(|dt| dt.to_rfc3339())
        .unwrap_or_else(|| epoch.to_string())
}
