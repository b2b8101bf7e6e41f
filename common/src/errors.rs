// Error handling framework

use thiserror::Error;

/// Schedule-related errors
///
/// All of these are raised while a rule is being built from configuration.
/// Evaluating an already-built rule never fails.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ScheduleError {
    #[error("Invalid {dimension} constraint: {reason}")]
    InvalidConstraint {
        dimension: &'static str,
        reason: String,
    },

    #[error("Invalid fire time: {0}")]
    InvalidFireTime(String),

    #[error("Invalid {dimension} token '{token}'")]
    InvalidToken {
        dimension: &'static str,
        token: String,
    },

    #[error("Invalid timezone: {0}")]
    InvalidTimezone(String),
}

impl ScheduleError {
    pub(crate) fn constraint(dimension: &'static str, reason: impl Into<String>) -> Self {
        ScheduleError::InvalidConstraint {
            dimension,
            reason: reason.into(),
        }
    }

    pub(crate) fn token(dimension: &'static str, token: impl Into<String>) -> Self {
        ScheduleError::InvalidToken {
            dimension,
            token: token.into(),
        }
    }
}

/// Settings validation errors
#[derive(Error, Debug)]
pub enum ValidationError {
    #[error("Invalid field value for {field}: {reason}")]
    InvalidFieldValue { field: String, reason: String },

    #[error("Duplicate job name: {0}")]
    DuplicateJob(String),

    #[error("Invalid schedule for job '{job}': {source}")]
    InvalidSchedule {
        job: String,
        #[source]
        source: ScheduleError,
    },
}
