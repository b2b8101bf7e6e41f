// Scheduler binary entry point

use anyhow::Context;
use common::config::Settings;
use common::scheduler::engine::format_epoch;
use common::scheduler::{LogDispatcher, Scheduler, SchedulerEngine};
use common::schedule::ZonedCalendar;
use common::telemetry;
use std::sync::Arc;
use tracing::{error, info};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Load configuration
    let settings = Settings::load().context("Failed to load configuration")?;

    telemetry::init_logging(
        &settings.observability.log_level,
        settings.observability.json_logs,
    )?;

    info!("Starting backup scheduler");

    settings.validate().map_err(|e| {
        error!(error = %e, "Invalid configuration");
        e
    })?;

    if let Some(port) = settings.observability.metrics_port {
        telemetry::init_metrics(port)?;
    }

    let tz = settings.timezone()?;
    let jobs = settings.scheduled_jobs()?;
    info!(timezone = %tz, job_count = jobs.len(), "Configuration loaded");

    let scheduler = Arc::new(SchedulerEngine::new(
        settings.scheduler.clone(),
        jobs,
        Arc::new(ZonedCalendar::new(tz)),
        Arc::new(LogDispatcher),
    ));

    for run in scheduler.upcoming(chrono::Utc::now().timestamp()) {
        info!(
            job_name = %run.job_name,
            fire_time = %format_epoch(run.fire_time),
            "Upcoming run"
        );
    }

    // Set up graceful shutdown
    let scheduler_for_shutdown = scheduler.clone();
    tokio::spawn(async move {
        if let Err(e) = tokio::signal::ctrl_c().await {
            error!(error = %e, "Failed to listen for Ctrl+C");
            return;
        }
        info!("Received Ctrl+C signal, initiating graceful shutdown");
        if let Err(e) = scheduler_for_shutdown.stop().await {
            error!(error = %e, "Error during scheduler shutdown");
        }
    });

    info!("Starting scheduler polling loop");
    if let Err(e) = scheduler.start().await {
        error!(error = %e, "Scheduler error");
        return Err(e);
    }

    info!("Scheduler stopped");
    Ok(())
}
