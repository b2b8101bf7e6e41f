// Backup job models

use crate::errors::ScheduleError;
use crate::schedule::{RecurrenceRule, ScheduleDirective};
use serde::{Deserialize, Serialize};

/// A backup job as written in configuration
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct JobDefinition {
    pub name: String,
    #[serde(default = "default_enabled")]
    pub enabled: bool,
    pub schedule: ScheduleDirective,
}

fn default_enabled() -> bool {
    true
}

/// A job with its schedule compiled into a recurrence rule
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ScheduledJob {
    pub name: String,
    pub rule: RecurrenceRule,
}

impl TryFrom<&JobDefinition> for ScheduledJob {
    type Error = ScheduleError;

    fn try_from(definition: &JobDefinition) -> Result<Self, Self::Error> {
        Ok(Self {
            name: definition.name.clone(),
            rule: RecurrenceRule::try_from(&definition.schedule)?,
        })
    }
}
