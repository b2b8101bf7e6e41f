// Telemetry module for structured logging and metrics

use anyhow::Result;
use metrics::{counter, describe_counter, describe_histogram, histogram};
use metrics_exporter_prometheus::PrometheusBuilder;
use std::net::SocketAddr;
use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

/// Initialize structured logging
///
/// Log levels come from `RUST_LOG` when set, otherwise from `log_level`.
/// With `json` the output is one JSON object per event including the
/// current span; otherwise the human readable format is used.
#[tracing::instrument(skip_all)]
pub fn init_logging(log_level: &str, json: bool) -> Result<()> {
    let env_filter = match EnvFilter::try_from_default_env() {
        Ok(filter) => filter,
        Err(_) => level_filter(log_level)?,
    };

    let json_layer = json.then(|| {
        fmt::layer()
            .json()
            .with_current_span(true)
            .with_span_list(true)
            .with_target(true)
            .with_thread_names(true)
            .with_file(true)
            .with_line_number(true)
    });
    let text_layer = (!json).then(|| fmt::layer().with_target(true));

    tracing_subscriber::registry()
        .with(env_filter)
        .with(json_layer)
        .with(text_layer)
        .try_init()
        .map_err(|e| anyhow::anyhow!("Failed to initialize tracing subscriber: {}", e))?;

    tracing::info!(log_level = log_level, json = json, "Logging initialized");

    Ok(())
}

/// Filter built from a configured level or directive list such as
/// `info,common::scheduler=debug`
fn level_filter(log_level: &str) -> Result<EnvFilter> {
    EnvFilter::try_new(log_level)
        .map_err(|e| anyhow::anyhow!("Failed to create env filter: {}", e))
}

/// Initialize Prometheus metrics exporter
///
/// Registers:
/// - backup_job_dispatched_total: Counter of fire times handed to the dispatcher
/// - backup_job_dispatch_failed_total: Counter of dispatch failures
/// - scheduler_poll_duration_seconds: Histogram of poll durations
#[tracing::instrument(skip_all)]
pub fn init_metrics(metrics_port: u16) -> Result<()> {
    let addr: SocketAddr = format!("0.0.0.0:{}", metrics_port)
        .parse()
        .map_err(|e| anyhow::anyhow!("Invalid metrics port: {}", e))?;

    PrometheusBuilder::new()
        .with_http_listener(addr)
        .install()
        .map_err(|e| anyhow::anyhow!("Failed to install Prometheus exporter: {}", e))?;

    describe_counter!(
        "backup_job_dispatched_total",
        "Total number of backup job runs dispatched"
    );
    describe_counter!(
        "backup_job_dispatch_failed_total",
        "Total number of backup job runs that failed to dispatch"
    );
    describe_histogram!(
        "scheduler_poll_duration_seconds",
        "Duration of scheduler polls in seconds"
    );

    tracing::info!(
        metrics_port = metrics_port,
        metrics_endpoint = format!("http://0.0.0.0:{}/metrics", metrics_port),
        "Prometheus metrics exporter initialized"
    );

    Ok(())
}

/// Record a dispatched job run
#[inline]
pub fn record_job_dispatched(job_name: &str) {
    counter!("backup_job_dispatched_total", "job_name" => job_name.to_string()).increment(1);
}

/// Record a job run that could not be dispatched
#[inline]
pub fn record_dispatch_failure(job_name: &str, reason: &str) {
    counter!(
        "backup_job_dispatch_failed_total",
        "job_name" => job_name.to_string(),
        "reason" => reason.to_string()
    )
    .increment(1);
}

/// Record how long one scheduler poll took
#[inline]
pub fn record_poll_duration(duration_seconds: f64) {
    histogram!("scheduler_poll_duration_seconds").record(duration_seconds);
}
