// Configuration management with layered configuration (file, env)

use crate::errors::{ScheduleError, ValidationError};
use crate::models::{JobDefinition, ScheduledJob};
use crate::schedule::parse_timezone;
use chrono_tz::Tz;
use config::{Config, ConfigError, Environment, File};
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::path::Path;
use tracing::{debug, info};

/// Main settings structure containing all configuration options
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Settings {
    #[serde(default)]
    pub scheduler: SchedulerConfig,
    #[serde(default)]
    pub observability: ObservabilityConfig,
    /// IANA zone the job schedules are evaluated in
    #[serde(default = "default_timezone_name")]
    pub timezone: String,
    #[serde(default)]
    pub jobs: Vec<JobDefinition>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SchedulerConfig {
    /// How often to look for due jobs (in seconds)
    pub poll_interval_seconds: u64,
    /// How far ahead upcoming runs are listed (in hours)
    pub lookahead_hours: u32,
}

impl Default for SchedulerConfig {
    fn default() -> Self {
        Self {
            poll_interval_seconds: 30,
            lookahead_hours: 24,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ObservabilityConfig {
    pub log_level: String,
    #[serde(default)]
    pub json_logs: bool,
    #[serde(default)]
    pub metrics_port: Option<u16>,
}

impl Default for ObservabilityConfig {
    fn default() -> Self {
        Self {
            log_level: "info".to_string(),
            json_logs: false,
            metrics_port: None,
        }
    }
}

fn default_timezone_name() -> String {
    "UTC".to_string()
}

impl Settings {
    /// Load configuration with layered precedence: defaults → file → env
    pub fn load() -> Result<Self, ConfigError> {
        Self::load_from_path("config")
    }

    /// Load configuration from a specific path
    pub fn load_from_path<P: AsRef<Path>>(config_dir: P) -> Result<Self, ConfigError> {
        let config_dir = config_dir.as_ref();

        let builder = Config::builder()
            // Start with default configuration
            .add_source(File::from(config_dir.join("default.toml")).required(false))
            // Add local configuration (not committed to git)
            .add_source(File::from(config_dir.join("local.toml")).required(false))
            // Add environment-specific configuration
            .add_source(
                Environment::with_prefix("APP")
                    .separator("__")
                    .try_parsing(true),
            );

        let config = builder.build()?;
        let settings: Settings = config.try_deserialize()?;

        debug!(
            config_dir = %config_dir.display(),
            job_count = settings.jobs.len(),
            "Configuration loaded"
        );

        Ok(settings)
    }

    /// Time zone the schedules are evaluated in
    pub fn timezone(&self) -> Result<Tz, ScheduleError> {
        parse_timezone(&self.timezone)
    }

    /// Compile the schedules of all enabled jobs
    pub fn scheduled_jobs(&self) -> Result<Vec<ScheduledJob>, ValidationError> {
        let mut jobs = Vec::new();
        for definition in &self.jobs {
            if !definition.enabled {
                info!(job_name = %definition.name, "Job is disabled, not scheduling");
                continue;
            }
            let job = ScheduledJob::try_from(definition).map_err(|source| {
                ValidationError::InvalidSchedule {
                    job: definition.name.clone(),
                    source,
                }
            })?;
            jobs.push(job);
        }
        Ok(jobs)
    }

    /// Validate configuration settings
    pub fn validate(&self) -> Result<(), ValidationError> {
        if self.scheduler.poll_interval_seconds == 0 {
            return Err(invalid_field(
                "scheduler.poll_interval_seconds",
                "must be greater than 0",
            ));
        }
        if self.scheduler.lookahead_hours == 0 {
            return Err(invalid_field(
                "scheduler.lookahead_hours",
                "must be greater than 0",
            ));
        }

        if let Err(e) = self.timezone() {
            return Err(invalid_field("timezone", &e.to_string()));
        }

        let mut names = HashSet::new();
        for job in &self.jobs {
            if job.name.trim().is_empty() {
                return Err(invalid_field("jobs.name", "cannot be empty"));
            }
            if !names.insert(job.name.as_str()) {
                return Err(ValidationError::DuplicateJob(job.name.clone()));
            }
        }

        // Disabled jobs must still carry a well-formed schedule
        for job in &self.jobs {
            ScheduledJob::try_from(job).map_err(|source| ValidationError::InvalidSchedule {
                job: job.name.clone(),
                source,
            })?;
        }

        Ok(())
    }
}

fn invalid_field(field: &str, reason: &str) -> ValidationError {
    ValidationError::InvalidFieldValue {
        field: field.to_string(),
        reason: reason.to_string(),
    }
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            scheduler: SchedulerConfig::default(),
            observability: ObservabilityConfig::default(),
            timezone: default_timezone_name(),
            jobs: Vec::new(),
        }
    }
}
