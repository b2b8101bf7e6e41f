// Recurrence matching for job schedules
//
// A job's schedule is a `RecurrenceRule`: one filter per calendar dimension
// (month, week of year, week of month, day of month, day of week) plus the
// times of day it fires. Rules answer two questions: does a given day
// trigger, and which instants in a range are fire times.

pub mod calendar;
pub mod constraint;
pub mod parse;
pub mod rule;

pub use calendar::{Calendar, CalendarPoint, ZonedCalendar};
pub use constraint::{
    Constraint, DayOfMonth, DayOfWeek, Dimension, DimensionFilter, MonthOfYear, WeekOfMonth,
    WeekOfYear,
};
pub use parse::ScheduleDirective;
pub use rule::{FireTimeSpec, RecurrenceRule, RecurrenceRuleBuilder, TimeOfDay, SECONDS_PER_DAY};

use crate::errors::ScheduleError;
use chrono_tz::Tz;

/// Parse an IANA time zone name
pub fn parse_timezone(name: &str) -> Result<Tz, ScheduleError> {
    name.parse::<Tz>()
        .map_err(|_| ScheduleError::InvalidTimezone(name.to_string()))
}

/// Time zone used when none is configured
pub fn default_timezone() -> Tz {
    chrono_tz::UTC
}
